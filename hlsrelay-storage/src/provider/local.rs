// Local filesystem provider
//
// Artifacts are copied from the encoder's working directory into the public
// HLS directory that the HTTP server serves verbatim. Playlists are written
// to a hidden temp file and renamed into place so readers never see a
// half-written playlist. Filesystem errors are reported, not retried.

use super::StorageProvider;
use crate::error::{Result, StorageError};
use crate::gate::PublishGate;
use crate::layout::ArtifactPath;
use crate::lifecycle::{self, read_staged, ArtifactBody, Destination};
use crate::sweeper::{Sweeper, SweeperHandle};
use async_trait::async_trait;
use hlsrelay_core::{RetentionPolicy, StorageConfig};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use tokio::fs;

pub struct LocalStorage {
    working_root: PathBuf,
    public_root: PathBuf,
    serving_host: String,
    retention: RetentionPolicy,
    gate: PublishGate,
    sweeper: Mutex<Option<SweeperHandle>>,
}

impl LocalStorage {
    #[must_use]
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            working_root: config.working_dir.clone(),
            public_root: config.public_hls_dir.clone(),
            serving_host: config.local_serving_host(),
            retention: config.retention.policy(),
            gate: PublishGate::new(),
            sweeper: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn gate(&self) -> &PublishGate {
        &self.gate
    }

    #[must_use]
    pub fn is_sweeping(&self) -> bool {
        self.sweeper.lock().as_ref().is_some_and(|h| !h.is_finished())
    }

    async fn ensure_parent(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::io(parent, e))?;
        }
        Ok(())
    }

    async fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("playlist");
        let temp_path = path.with_file_name(format!(".{file_name}.tmp"));

        fs::write(&temp_path, data)
            .await
            .map_err(|e| StorageError::io(&temp_path, e))?;
        fs::rename(&temp_path, path)
            .await
            .map_err(|e| StorageError::io(path, e))
    }
}

#[async_trait]
impl Destination for LocalStorage {
    fn working_root(&self) -> &Path {
        &self.working_root
    }

    fn serving_host(&self) -> &str {
        &self.serving_host
    }

    fn gate(&self) -> &PublishGate {
        &self.gate
    }

    async fn persist(&self, artifact: &ArtifactPath, body: ArtifactBody, attempt: u32) -> Result<String> {
        let destination = artifact.public_path(&self.public_root);
        Self::ensure_parent(&destination).await?;

        match body {
            ArtifactBody::Staged if !artifact.is_playlist() => {
                let staged = artifact.staged_path(&self.working_root);
                fs::copy(&staged, &destination)
                    .await
                    .map_err(|e| StorageError::io(&staged, e))?;
            }
            ArtifactBody::Staged => {
                let data = read_staged(&self.working_root, artifact).await?;
                Self::write_atomic(&destination, &data).await?;
            }
            ArtifactBody::Bytes(data) => Self::write_atomic(&destination, &data).await?,
        }

        tracing::trace!(
            path = %artifact.relative().display(),
            attempt,
            "Copied to {:?}",
            destination
        );

        Ok(destination.display().to_string())
    }
}

#[async_trait]
impl StorageProvider for LocalStorage {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn setup(&self) -> Result<()> {
        fs::create_dir_all(&self.public_root)
            .await
            .map_err(|e| StorageError::Config(format!("cannot create {:?}: {e}", self.public_root)))?;

        match self.retention {
            RetentionPolicy::Sweep { interval, max_age } => {
                let handle = Sweeper::new(&self.public_root, interval, max_age).start();
                let previous = self.sweeper.lock().replace(handle);
                if let Some(previous) = previous {
                    // setup called twice; keep one sweeper
                    tokio::spawn(previous.shutdown());
                }
            }
            RetentionPolicy::KeepFullHistory => {
                tracing::info!("Recording enabled, segment sweeper disabled");
            }
        }

        tracing::info!("Local storage ready: public_root={:?}", self.public_root);
        Ok(())
    }

    async fn segment_written(&self, path: &Path) -> Result<()> {
        lifecycle::segment_written(self, path).await
    }

    async fn variant_playlist_written(&self, path: &Path) -> Result<()> {
        lifecycle::variant_playlist_written(self, path).await
    }

    async fn master_playlist_written(&self, path: &Path) -> Result<()> {
        lifecycle::master_playlist_written(self, path).await
    }

    async fn save(&self, artifact: &ArtifactPath, attempt: u32) -> Result<String> {
        self.persist(artifact, ArtifactBody::Staged, attempt).await
    }

    async fn shutdown(&self) {
        let handle = self.sweeper.lock().take();
        if let Some(handle) = handle {
            handle.shutdown().await;
        }
        lifecycle::report_abandoned(&self.gate);
    }
}
