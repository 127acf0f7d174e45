// Storage providers
//
// - LocalStorage: copy into a public directory served by the HTTP server
// - RemoteStorage: upload to an S3-compatible object store behind a CDN
//
// The backend is chosen once at startup from configuration. Callers drive a
// provider through its hooks in encoder output order:
//
//   setup -> (segment_written -> variant_playlist_written)* -> shutdown
//
// with master_playlist_written whenever the master playlist changes.

pub mod local;
pub mod remote;

use crate::error::{Result, StorageError};
use crate::layout::ArtifactPath;
use async_trait::async_trait;
use hlsrelay_core::{StorageBackendKind, StorageConfig};
use std::path::Path;
use std::sync::Arc;

/// Contract every storage backend implements
///
/// Paths passed to the hooks are relative to the configured working root.
/// A variant playlist never becomes visible before every segment it
/// references is fetchable at its rewritten URL.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &'static str;

    /// Acquire backend resources.
    ///
    /// A `StorageError::Config` from here is fatal and must stop the process.
    async fn setup(&self) -> Result<()>;

    /// A segment was finalized in the working directory
    async fn segment_written(&self, path: &Path) -> Result<()>;

    /// A variant playlist was rewritten to include the newest segment
    async fn variant_playlist_written(&self, path: &Path) -> Result<()>;

    /// The master playlist changed; copied verbatim, never rewritten
    async fn master_playlist_written(&self, path: &Path) -> Result<()>;

    /// Write the staged file for `artifact` to its serving location.
    ///
    /// `attempt` is the number of the first attempt to make; backends with a
    /// retry budget continue counting from there.
    async fn save(&self, artifact: &ArtifactPath, attempt: u32) -> Result<String>;

    /// Stop background work and release resources
    async fn shutdown(&self);
}

/// Build the provider selected by configuration (not yet set up)
pub fn provider_from_config(config: &StorageConfig) -> Result<Arc<dyn StorageProvider>> {
    let provider: Arc<dyn StorageProvider> = match config.backend {
        StorageBackendKind::Local => {
            if config.public_hls_dir.as_os_str().is_empty() {
                return Err(StorageError::Config("public_hls_dir is empty".to_string()));
            }
            Arc::new(LocalStorage::new(config))
        }
        StorageBackendKind::S3 => {
            if config.s3.bucket.is_empty() {
                return Err(StorageError::Config("s3.bucket is empty".to_string()));
            }
            Arc::new(RemoteStorage::new(config))
        }
    };

    tracing::info!("Selected storage provider: {}", provider.name());
    Ok(provider)
}

pub use local::LocalStorage;
pub use remote::RemoteStorage;
