use std::sync::Arc;

use async_trait::async_trait;
use cirrus_core::MediaResult;

use crate::types::{DestroyOptions, TransferProgress, UploadOptions, UploadRequest};

/// Progress sink handed to a transport. May be called from any thread.
pub type ProgressFn = Arc<dyn Fn(TransferProgress) + Send + Sync>;

/// Remote media API operations the coordinator relies on.
///
/// Implementations own authentication and wire format; the coordinator
/// only sees the JSON body of a successful upload.
#[async_trait]
pub trait MediaTransport: Send + Sync {
    /// Upload one asset, reporting bytes sent through `progress`
    async fn upload(
        &self,
        request: UploadRequest,
        options: &UploadOptions,
        progress: ProgressFn,
    ) -> MediaResult<serde_json::Value>;

    /// Remove an asset (and, with `invalidate`, its cached derivatives)
    async fn destroy(&self, public_id: &str, options: &DestroyOptions) -> MediaResult<()>;
}
