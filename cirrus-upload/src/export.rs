//! # Video export
//!
//! Re-encodes a source video into a temporary MP4 sized for upload. The
//! encoder itself sits behind [`ExportSession`]; [`FfmpegExportSession`]
//! drives a two-pass H.264 encode through the `ffmpeg` binary.
//!
//! Results are always delivered on the exporter's [`DeliveryContext`]. The
//! caller owns the returned file and should delete it once the upload has
//! finished. Partial output from a failed export is removed here.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use cirrus_core::config::DEFAULT_EXPORT_PRESET;
use cirrus_core::{DeliveryContext, MediaError, MediaResult};
use tokio::process::Command;
use tokio::runtime::Handle;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Reference to the video to export
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetRef {
    File(PathBuf),
    /// Only `file://` URLs resolve to a local asset
    Url(String),
}

impl AssetRef {
    /// Local path of an existing file
    pub async fn resolve(&self) -> MediaResult<PathBuf> {
        let path = match self {
            AssetRef::File(path) => path.clone(),
            AssetRef::Url(raw) => {
                let url = url::Url::parse(raw).map_err(|_| MediaError::asset_unavailable(raw.as_str()))?;
                if url.scheme() != "file" {
                    return Err(MediaError::asset_unavailable(raw.as_str()));
                }
                url.to_file_path()
                    .map_err(|_| MediaError::asset_unavailable(raw.as_str()))?
            }
        };

        if is_file(&path).await {
            Ok(path)
        } else {
            Err(MediaError::asset_unavailable(path.display().to_string()))
        }
    }
}

impl fmt::Display for AssetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetRef::File(path) => write!(f, "{}", path.display()),
            AssetRef::Url(url) => write!(f, "{url}"),
        }
    }
}

/// Output bounding box, written `WIDTHxHEIGHT`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportPreset {
    pub width: u32,
    pub height: u32,
}

impl ExportPreset {
    /// Target video bitrate, roughly 2.5 bits per pixel per second
    pub fn bitrate_kbps(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height) * 25 / 10_000
    }
}

impl Default for ExportPreset {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

impl FromStr for ExportPreset {
    type Err = MediaError;

    fn from_str(s: &str) -> MediaResult<Self> {
        let (w, h) = s
            .trim()
            .split_once(|c: char| c == 'x' || c == 'X')
            .ok_or_else(|| MediaError::invalid(format!("export preset '{s}' is not WIDTHxHEIGHT")))?;

        let parse = |v: &str| {
            v.parse::<u32>()
                .ok()
                .filter(|n| *n > 0 && n % 2 == 0)
                .ok_or_else(|| MediaError::invalid(format!("bad dimension '{v}' in preset '{s}'")))
        };

        Ok(Self {
            width: parse(w)?,
            height: parse(h)?,
        })
    }
}

impl fmt::Display for ExportPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Encoding capability used by the exporter
#[async_trait]
pub trait ExportSession: Send + Sync {
    /// Encode `source` into an MP4 at `output`, fitting within `preset`
    async fn export(&self, source: &Path, preset: &ExportPreset, output: &Path) -> MediaResult<()>;
}

/// Two-pass H.264/AAC encode through the `ffmpeg` command line tool
#[derive(Debug, Clone)]
pub struct FfmpegExportSession {
    binary: PathBuf,
}

impl Default for FfmpegExportSession {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("ffmpeg"),
        }
    }
}

impl FfmpegExportSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_binary<P: Into<PathBuf>>(binary: P) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn pass_args(
        source: &Path,
        preset: &ExportPreset,
        pass: u8,
        passlog: &Path,
        output: &Path,
    ) -> Vec<String> {
        let scale = format!(
            "scale=w={}:h={}:force_original_aspect_ratio=decrease:force_divisible_by=2",
            preset.width, preset.height
        );

        let mut args = vec![
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-i".to_string(),
            source.display().to_string(),
            "-vf".to_string(),
            scale,
            "-c:v".to_string(),
            "libx264".to_string(),
            "-b:v".to_string(),
            format!("{}k", preset.bitrate_kbps()),
            "-pass".to_string(),
            pass.to_string(),
            "-passlogfile".to_string(),
            passlog.display().to_string(),
        ];

        if pass == 1 {
            args.extend(["-an", "-f", "mp4"].map(String::from));
        } else {
            args.extend(["-c:a", "aac", "-b:a", "128k", "-movflags", "+faststart", "-f", "mp4"].map(String::from));
        }
        args.push(output.display().to_string());
        args
    }

    async fn run_pass(&self, args: Vec<String>) -> MediaResult<()> {
        let result = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await;

        let output = result.map_err(|e| {
            MediaError::export_unavailable(format!("cannot start {}: {e}", self.binary.display()))
        })?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
        Err(MediaError::video_encode_failed(format!(
            "{}: {}",
            output.status,
            tail.into_iter().rev().collect::<Vec<_>>().join(" | ")
        )))
    }
}

#[cfg(windows)]
const NULL_DEVICE: &str = "NUL";
#[cfg(not(windows))]
const NULL_DEVICE: &str = "/dev/null";

#[async_trait]
impl ExportSession for FfmpegExportSession {
    async fn export(&self, source: &Path, preset: &ExportPreset, output: &Path) -> MediaResult<()> {
        let passlog = output.with_extension("passlog");

        let first = Self::pass_args(source, preset, 1, &passlog, Path::new(NULL_DEVICE));
        let result = match self.run_pass(first).await {
            Ok(()) => {
                let second = Self::pass_args(source, preset, 2, &passlog, output);
                self.run_pass(second).await
            }
            Err(e) => Err(e),
        };

        // x264 writes `<prefix>-0.log` and `<prefix>-0.log.mbtree`
        for suffix in ["-0.log", "-0.log.mbtree"] {
            let mut log = passlog.clone().into_os_string();
            log.push(suffix);
            let _ = tokio::fs::remove_file(PathBuf::from(log)).await;
        }

        result
    }
}

/// Exports videos to temporary files, reporting on a delivery context
#[derive(Clone)]
pub struct VideoExporter {
    session: Arc<dyn ExportSession>,
    context: DeliveryContext,
    runtime: Handle,
    temp_dir: PathBuf,
    preset: ExportPreset,
}

impl VideoExporter {
    /// Requires a Tokio runtime; exports run on it.
    pub fn new<S>(session: S, context: DeliveryContext) -> MediaResult<Self>
    where
        S: ExportSession + 'static,
    {
        let runtime = Handle::try_current()
            .map_err(|_| MediaError::precondition("VideoExporter::new", "no Tokio runtime"))?;

        Ok(Self {
            session: Arc::new(session),
            context,
            runtime,
            temp_dir: std::env::temp_dir(),
            preset: ExportPreset::default(),
        })
    }

    pub fn with_temp_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.temp_dir = dir.into();
        self
    }

    /// Default preset used when a call does not name one
    pub fn with_preset(mut self, preset: ExportPreset) -> Self {
        self.preset = preset;
        self
    }

    /// Export in the background; `completion` runs on the delivery context
    pub fn export_video<F>(&self, source: AssetRef, preset: Option<ExportPreset>, completion: F)
    where
        F: FnOnce(MediaResult<PathBuf>) + Send + 'static,
    {
        let exporter = self.clone();
        self.runtime.spawn(async move {
            let result = exporter.export(&source, preset).await;
            exporter.context.dispatch(move || completion(result));
        });
    }

    /// Export and return the temporary output path
    #[instrument(skip(self, source, preset), fields(source = %source))]
    pub async fn export(&self, source: &AssetRef, preset: Option<ExportPreset>) -> MediaResult<PathBuf> {
        let input = source.resolve().await?;
        let preset = preset.unwrap_or(self.preset);
        let output = self
            .temp_dir
            .join(format!("cirrus-export-{}.mp4", Uuid::new_v4().simple()));

        debug!(output = %output.display(), %preset, "starting export");

        match self.session.export(&input, &preset, &output).await {
            Ok(()) => {
                if !is_file(&output).await {
                    return Err(MediaError::video_encode_failed("encoder produced no output"));
                }
                info!(output = %output.display(), "export finished");
                Ok(output)
            }
            Err(e) => {
                warn!(error = %e, "export failed");
                if let Err(rm) = tokio::fs::remove_file(&output).await {
                    if rm.kind() != std::io::ErrorKind::NotFound {
                        warn!(error = %rm, output = %output.display(), "could not remove partial export");
                    }
                }
                Err(e)
            }
        }
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

/// Preset named by a config value, falling back to the default on error
pub fn preset_or_default(value: &str) -> ExportPreset {
    value.parse().unwrap_or_else(|e| {
        warn!(error = %e, fallback = DEFAULT_EXPORT_PRESET, "invalid export preset");
        ExportPreset::default()
    })
}
