use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use cirrus_core::{CloudCredentials, MediaConfig, MediaError, MediaResult};
use futures_util::{Stream, StreamExt};
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio_util::io::ReaderStream;
use tracing::{debug, instrument, warn};

use crate::transport::{MediaTransport, ProgressFn};
use crate::types::{DestroyOptions, ResourceKind, TransferProgress, UploadOptions, UploadRequest};

/// Signed REST transport for a Cloudinary-compatible upload API
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    credentials: CloudCredentials,
    api_base_url: String,
    chunk_size: usize,
}

impl HttpTransport {
    /// Build one pooled HTTP client for the coordinator's lifetime
    pub fn new(config: &MediaConfig) -> MediaResult<Self> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(MediaError::http)?;

        Ok(Self {
            client,
            credentials: config.credentials.clone(),
            api_base_url: config.api_base_url.clone(),
            chunk_size: config.chunk_size,
        })
    }

    /// `{base}/v1_1/{cloud}/{kind}/{action}`
    pub fn endpoint(&self, kind: ResourceKind, action: &str) -> String {
        format!(
            "{}/v1_1/{}/{}/{}",
            self.api_base_url,
            self.credentials.cloud_name,
            kind.as_str(),
            action
        )
    }

    /// Add timestamp, api key and signature to request parameters
    fn signed(&self, mut params: BTreeMap<&'static str, String>) -> BTreeMap<&'static str, String> {
        params.insert("timestamp", chrono::Utc::now().timestamp().to_string());
        let signature = sign_params(&params, &self.credentials.api_secret);
        params.insert("api_key", self.credentials.api_key.clone());
        params.insert("signature", signature);
        params
    }

    async fn file_part(&self, request: UploadRequest, progress: ProgressFn) -> MediaResult<Part> {
        match request {
            UploadRequest::Image(bytes) => {
                let total = bytes.len() as u64;
                let mime = image::guess_format(&bytes)
                    .map(|f| f.to_mime_type())
                    .unwrap_or("application/octet-stream");
                let pieces = chunked(&bytes, self.chunk_size);
                let stream = futures_util::stream::iter(pieces.into_iter().map(Ok::<_, std::io::Error>));
                let body = reqwest::Body::wrap_stream(counting(stream, total, progress));

                Part::stream_with_length(body, total)
                    .file_name("upload")
                    .mime_str(mime)
                    .map_err(MediaError::http)
            }
            UploadRequest::Video(path) => {
                let file = tokio::fs::File::open(&path).await?;
                let total = file.metadata().await?.len();
                let stream = ReaderStream::with_capacity(file, self.chunk_size);
                let body = reqwest::Body::wrap_stream(counting(stream, total, progress));

                Part::stream_with_length(body, total)
                    .file_name(file_name(&path))
                    .mime_str("video/mp4")
                    .map_err(MediaError::http)
            }
        }
    }
}

#[async_trait]
impl MediaTransport for HttpTransport {
    #[instrument(skip(self, request, progress), fields(kind = options.resource_type.as_str()))]
    async fn upload(
        &self,
        request: UploadRequest,
        options: &UploadOptions,
        progress: ProgressFn,
    ) -> MediaResult<Value> {
        let params = self.signed(options.params().into_iter().collect());
        let part = self.file_part(request, progress).await?;

        let form = params
            .into_iter()
            .fold(Form::new(), |form, (k, v)| form.text(k, v))
            .part("file", part);

        let url = self.endpoint(options.resource_type, "upload");
        debug!(%url, "sending upload");

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(MediaError::http)?;

        read_json(response).await
    }

    #[instrument(skip(self), fields(kind = options.resource_type.as_str()))]
    async fn destroy(&self, public_id: &str, options: &DestroyOptions) -> MediaResult<()> {
        let mut params = BTreeMap::new();
        params.insert("public_id", public_id.to_string());
        if options.invalidate {
            params.insert("invalidate", "true".to_string());
        }
        let params = self.signed(params);

        let response = self
            .client
            .post(self.endpoint(options.resource_type, "destroy"))
            .form(&params)
            .send()
            .await
            .map_err(MediaError::http)?;

        let body = read_json(response).await?;
        match body.get("result").and_then(|v| v.as_str()) {
            Some("ok") => Ok(()),
            other => {
                warn!(public_id, result = ?other, "destroy not acknowledged");
                Err(MediaError::transport(format!(
                    "destroy of '{public_id}' returned {}",
                    other.unwrap_or("no result")
                )))
            }
        }
    }
}

/// Hex SHA-256 over `k=v&k=v...` (sorted, empty values skipped) + secret
pub fn sign_params(params: &BTreeMap<&str, String>, secret: &str) -> String {
    let joined = params
        .iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

async fn read_json(response: reqwest::Response) -> MediaResult<Value> {
    let status = response.status();
    let text = response.text().await.map_err(MediaError::http)?;

    let body: Value = serde_json::from_str(&text)
        .map_err(|_| MediaError::transport(format!("{status}: non-JSON response body")))?;

    if !status.is_success() {
        let message = body
            .pointer("/error/message")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown error");
        return Err(MediaError::transport(format!("{status}: {message}")));
    }

    Ok(body)
}

fn chunked(bytes: &Bytes, chunk_size: usize) -> Vec<Bytes> {
    let size = chunk_size.max(1);
    (0..bytes.len())
        .step_by(size)
        .map(|start| bytes.slice(start..(start + size).min(bytes.len())))
        .collect()
}

fn counting<S>(
    stream: S,
    total: u64,
    progress: ProgressFn,
) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Send + 'static
where
    S: Stream<Item = Result<Bytes, std::io::Error>> + Send + 'static,
{
    let mut sent = 0u64;
    stream.map(move |chunk| {
        if let Ok(bytes) = &chunk {
            sent += bytes.len() as u64;
            progress(TransferProgress::new(sent, Some(total)));
        }
        chunk
    })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload.mp4".to_string())
}
