use thiserror::Error;

/// Result type for cirrus operations
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while uploading, exporting or addressing media
#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Invalid request: {message}")]
    Invalid { message: String },

    #[error("Malformed delivery URL '{url}': {reason}")]
    MalformedUrl { url: String, reason: String },

    #[error("Precondition violated in {operation}: {message}")]
    PreconditionViolation {
        operation: &'static str,
        message: String,
    },

    #[error("Image encoding failed: {reason}")]
    EncodeFailed { reason: String },

    #[error("Export session unavailable: {reason}")]
    ExportSessionUnavailable { reason: String },

    #[error("Asset URL unavailable: {asset}")]
    AssetUrlUnavailable { asset: String },

    #[error("Video encoding failed: {reason}")]
    VideoEncodeFailed { reason: String },

    #[error("Transport failure: {reason}")]
    TransportFailure { reason: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Delivery context '{name}' is closed")]
    ContextClosed { name: String },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },

    #[error("HTTP error: {source}")]
    Http {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl MediaError {
    /// Create an invalid configuration error
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an invalid request error
    pub fn invalid<S: Into<String>>(message: S) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Create a malformed URL error
    pub fn malformed_url<U: Into<String>, R: Into<String>>(url: U, reason: R) -> Self {
        Self::MalformedUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Create a precondition violation for the named operation
    pub fn precondition<S: Into<String>>(operation: &'static str, message: S) -> Self {
        Self::PreconditionViolation {
            operation,
            message: message.into(),
        }
    }

    pub fn encode_failed<S: Into<String>>(reason: S) -> Self {
        Self::EncodeFailed {
            reason: reason.into(),
        }
    }

    pub fn export_unavailable<S: Into<String>>(reason: S) -> Self {
        Self::ExportSessionUnavailable {
            reason: reason.into(),
        }
    }

    pub fn asset_unavailable<S: Into<String>>(asset: S) -> Self {
        Self::AssetUrlUnavailable {
            asset: asset.into(),
        }
    }

    pub fn video_encode_failed<S: Into<String>>(reason: S) -> Self {
        Self::VideoEncodeFailed {
            reason: reason.into(),
        }
    }

    /// Create a transport failure (upstream error or unexpected response shape)
    pub fn transport<S: Into<String>>(reason: S) -> Self {
        Self::TransportFailure {
            reason: reason.into(),
        }
    }

    /// Wrap an HTTP client error
    pub fn http<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Http {
            source: Box::new(error),
        }
    }

    /// True for the error kinds produced by the video export pipeline
    pub fn is_export_error(&self) -> bool {
        matches!(
            self,
            Self::ExportSessionUnavailable { .. }
                | Self::AssetUrlUnavailable { .. }
                | Self::VideoEncodeFailed { .. }
        )
    }
}
