use std::path::Path;

use anyhow::Result;
use cirrus_core::{DeliveryContext, MediaConfig};
use cirrus_upload::{
    preset_or_default, AssetRef, ExportPreset, FfmpegExportSession, UploadCoordinator,
    UploadResult, VideoExporter,
};
use tokio::sync::oneshot;
use tracing::{info, warn};

/// Coordinator, exporter and the thread their callbacks run on
pub struct UploaderApp {
    context: DeliveryContext,
    uploads: UploadCoordinator,
    exporter: VideoExporter,
}

impl UploaderApp {
    pub fn from_env() -> Result<Self> {
        Self::new(MediaConfig::from_env()?)
    }

    pub fn new(config: MediaConfig) -> Result<Self> {
        let context = DeliveryContext::spawn("uploader")?;
        let preset = preset_or_default(&config.export_preset);
        let uploads = UploadCoordinator::new(config, context.clone())?;
        let exporter =
            VideoExporter::new(FfmpegExportSession::new(), context.clone())?.with_preset(preset);

        uploads.on_all_completed(|event| info!(?event, "all uploads finished"));

        Ok(Self {
            context,
            uploads,
            exporter,
        })
    }

    pub async fn upload_image(&self, path: &Path) -> Result<UploadResult> {
        let bytes = tokio::fs::read(path).await?;
        let (tx, rx) = oneshot::channel();

        let uploads = self.uploads.clone();
        let started = self
            .context
            .run(move || {
                uploads.upload_image(bytes, report_progress, move |result| {
                    let _ = tx.send(result);
                })
            })
            .await??;

        if !started {
            warn!("image upload was not dispatched");
        }
        Ok(rx.await?)
    }

    /// Export to a temporary MP4, upload it, then delete the export
    pub async fn upload_video(&self, path: &Path, preset: Option<ExportPreset>) -> Result<UploadResult> {
        let exported = self
            .exporter
            .export(&AssetRef::File(path.to_path_buf()), preset)
            .await?;
        let (tx, rx) = oneshot::channel();

        let uploads = self.uploads.clone();
        let file = exported.clone();
        let started = self
            .context
            .run(move || {
                uploads.upload_video(file, report_progress, move |result| {
                    let _ = tx.send(result);
                })
            })
            .await??;

        if !started {
            warn!("video upload was not dispatched");
        }
        let result = rx.await;

        if let Err(e) = tokio::fs::remove_file(&exported).await {
            warn!(error = %e, file = %exported.display(), "could not delete exported video");
        }
        Ok(result?)
    }

    /// Destroy the asset and wait for the API to confirm
    pub async fn remove(&self, url: &str) -> Result<()> {
        self.uploads.destroy_asset(url).await?;
        Ok(())
    }
}

impl Drop for UploaderApp {
    fn drop(&mut self) {
        self.uploads.shutdown();
    }
}

fn report_progress(fraction: f64) {
    info!(percent = (fraction * 100.0).round(), "uploading");
}
