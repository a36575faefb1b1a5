use std::path::PathBuf;

use bytes::Bytes;
use cirrus_core::{MediaError, MediaResult};
use serde::Serialize;
use uuid::Uuid;

/// Unique identifier for one upload call, used for tracing
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct UploadId(pub String);

impl UploadId {
    pub fn new() -> Self {
        Self(format!("upl_{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for UploadId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UploadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Remote resource kind, as used in API paths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Image,
    Video,
}

pub(crate) const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "heic", "bmp", "tiff"];
pub(crate) const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "m4v", "webm", "avi"];

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Image => "image",
            ResourceKind::Video => "video",
        }
    }

    /// True for extensions of either kind, case-insensitive
    pub fn is_known_extension(ext: &str) -> bool {
        let ext = ext.to_ascii_lowercase();
        IMAGE_EXTENSIONS
            .iter()
            .chain(VIDEO_EXTENSIONS)
            .any(|known| *known == ext)
    }

    /// Guess the kind from a file extension; anything unknown is an image
    pub fn from_extension(ext: &str) -> Self {
        let ext = ext.to_ascii_lowercase();
        if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            ResourceKind::Video
        } else {
            ResourceKind::Image
        }
    }
}

/// What gets sent to the media API
#[derive(Debug, Clone)]
pub enum UploadRequest {
    /// Encoded image bytes
    Image(Bytes),
    /// Path to an encoded local video file
    Video(PathBuf),
}

impl UploadRequest {
    pub fn kind(&self) -> ResourceKind {
        match self {
            UploadRequest::Image(_) => ResourceKind::Image,
            UploadRequest::Video(_) => ResourceKind::Video,
        }
    }

    /// Fixed option set for this request kind
    pub fn options(&self, origin_tag: &str) -> UploadOptions {
        match self {
            UploadRequest::Image(_) => UploadOptions {
                tags: origin_tag.to_string(),
                resource_type: ResourceKind::Image,
                format: None,
            },
            UploadRequest::Video(_) => UploadOptions {
                tags: origin_tag.to_string(),
                resource_type: ResourceKind::Video,
                format: Some("mp4".to_string()),
            },
        }
    }
}

/// Options recognised by the upload endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOptions {
    pub tags: String,
    pub resource_type: ResourceKind,
    pub format: Option<String>,
}

impl UploadOptions {
    /// Signed form parameters (resource type travels in the path)
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("tags", self.tags.clone())];
        if let Some(format) = &self.format {
            params.push(("format", format.clone()));
        }
        params
    }
}

/// Options for removing an asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestroyOptions {
    pub resource_type: ResourceKind,
    /// Purge cached derived variants from the CDN as well
    pub invalidate: bool,
}

impl DestroyOptions {
    pub fn new(resource_type: ResourceKind) -> Self {
        Self {
            resource_type,
            invalidate: true,
        }
    }
}

/// Outcome handed to a completion callback, exactly once per upload.
///
/// Either all of url/width/height are present (success) or none are.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadResult {
    success: bool,
    url: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

impl UploadResult {
    pub fn success<S: Into<String>>(url: S, width: u32, height: u32) -> Self {
        Self {
            success: true,
            url: Some(url.into()),
            width: Some(width),
            height: Some(height),
        }
    }

    pub fn failure() -> Self {
        Self {
            success: false,
            url: None,
            width: None,
            height: None,
        }
    }

    /// Build from an upload response body; `secure_url` wins over `url`
    pub fn from_response(body: &serde_json::Value) -> MediaResult<Self> {
        let url = body
            .get("secure_url")
            .and_then(|v| v.as_str())
            .or_else(|| body.get("url").and_then(|v| v.as_str()));
        let width = body.get("width").and_then(|v| v.as_u64());
        let height = body.get("height").and_then(|v| v.as_u64());

        match (url, width, height) {
            (Some(url), Some(w), Some(h)) => {
                let w = u32::try_from(w).map_err(|_| MediaError::transport("width out of range"))?;
                let h = u32::try_from(h).map_err(|_| MediaError::transport("height out of range"))?;
                Ok(Self::success(url, w, h))
            }
            _ => Err(MediaError::transport(format!(
                "response missing url/width/height: {body}"
            ))),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn width(&self) -> Option<u32> {
        self.width
    }

    pub fn height(&self) -> Option<u32> {
        self.height
    }
}

/// Bytes handed to the transport so far
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    pub sent: u64,
    pub total: Option<u64>,
}

impl TransferProgress {
    pub fn new(sent: u64, total: Option<u64>) -> Self {
        Self { sent, total }
    }

    /// `sent / total` in [0, 1], or None when the total is unknown or zero
    pub fn fraction(&self) -> Option<f64> {
        match self.total {
            Some(total) if total > 0 => Some((self.sent as f64 / total as f64).clamp(0.0, 1.0)),
            _ => None,
        }
    }
}

/// Bounding box for delivery scaling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}
