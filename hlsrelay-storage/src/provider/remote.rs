// Object store provider
//
// Uploads artifacts under "hls/<track>/<name>" keys and rewrites variant
// playlists against the public serving host (CDN override, or the bucket
// URL). Uploads carry cache hints and go through the bounded retry; a
// playlist is only uploaded once every segment it references exists in the
// store.

use super::StorageProvider;
use crate::cache::{cache_control_header, content_type};
use crate::error::{Result, StorageError};
use crate::gate::PublishGate;
use crate::layout::ArtifactPath;
use crate::lifecycle::{self, read_staged, ArtifactBody, Destination};
use crate::retry::{with_retry, RetryPolicy};
use crate::store::{ObjectStore, PutOptions, S3ObjectStore};
use async_trait::async_trait;
use hlsrelay_core::{S3Config, StorageConfig};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use url::Url;

pub struct RemoteStorage {
    s3: S3Config,
    working_root: PathBuf,
    serving_host: String,
    retry: RetryPolicy,
    gate: PublishGate,
    store: OnceLock<Arc<dyn ObjectStore>>,
}

impl RemoteStorage {
    #[must_use]
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            s3: config.s3.clone(),
            working_root: config.working_dir.clone(),
            serving_host: config.remote_serving_host(),
            retry: RetryPolicy::from_config(&config.retry),
            gate: PublishGate::new(),
            store: OnceLock::new(),
        }
    }

    /// Use an already constructed store; `setup` then skips building the S3 client
    #[must_use]
    pub fn with_store(config: &StorageConfig, store: Arc<dyn ObjectStore>) -> Self {
        let provider = Self::new(config);
        // Freshly created lock, cannot already be set
        let _ = provider.store.set(store);
        provider
    }

    #[must_use]
    pub fn serving_host(&self) -> &str {
        &self.serving_host
    }

    #[must_use]
    pub fn gate(&self) -> &PublishGate {
        &self.gate
    }

    fn store(&self) -> Result<&Arc<dyn ObjectStore>> {
        self.store.get().ok_or(StorageError::NotInitialized)
    }

    fn validate(&self) -> Result<()> {
        let s3 = &self.s3;
        let missing: Vec<&str> = [
            ("endpoint", &s3.endpoint),
            ("bucket", &s3.bucket),
            ("access_key", &s3.access_key),
            ("secret", &s3.secret),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect();

        if !missing.is_empty() {
            return Err(StorageError::Config(format!(
                "missing s3 settings: {}",
                missing.join(", ")
            )));
        }

        let endpoint = Url::parse(&s3.endpoint)
            .map_err(|e| StorageError::Config(format!("invalid s3 endpoint {:?}: {e}", s3.endpoint)))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(StorageError::Config(format!(
                "s3 endpoint must be http or https, got {:?}",
                endpoint.scheme()
            )));
        }

        Ok(())
    }

    fn put_options(&self, artifact: &ArtifactPath) -> PutOptions {
        PutOptions {
            cache_control: cache_control_header(artifact.relative()),
            content_type: content_type(artifact.relative()).to_string(),
            acl: self.s3.acl_or_default().to_string(),
        }
    }
}

#[async_trait]
impl Destination for RemoteStorage {
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
        let store: &dyn ObjectStore = &**self.store()?;
        let data = match body {
            ArtifactBody::Staged => read_staged(&self.working_root, artifact).await?,
            ArtifactBody::Bytes(data) => data,
        };

        let key = artifact.object_key();
        let options = self.put_options(artifact);
        let (key_ref, options_ref) = (key.as_str(), &options);

        with_retry(&self.retry, artifact.relative(), attempt, |n| {
            let data = data.clone();
            async move {
                tracing::trace!(key = key_ref, attempt = n, "Uploading");
                store.put(key_ref, data, options_ref).await
            }
        })
        .await?;

        Ok(format!("{}/{key}", self.serving_host))
    }
}

#[async_trait]
impl StorageProvider for RemoteStorage {
    fn name(&self) -> &'static str {
        "s3"
    }

    async fn setup(&self) -> Result<()> {
        if self.store.get().is_none() {
            self.validate()?;
            let store = S3ObjectStore::new(&self.s3)
                .map_err(|e| StorageError::Config(format!("cannot build s3 client: {e}")))?;
            let _ = self.store.set(Arc::new(store));
        }

        tracing::info!(
            "Object storage ready: bucket={}, serving_host={}",
            self.s3.bucket,
            self.serving_host
        );
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
        lifecycle::report_abandoned(&self.gate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::ArtifactKind;
    use crate::store::MockObjectStore;
    use hlsrelay_core::RetryConfig;
    use std::io;
    use tempfile::tempdir;

    fn config(root: &Path) -> StorageConfig {
        let mut config = StorageConfig {
            working_dir: root.to_path_buf(),
            retry: RetryConfig {
                max_attempts: 4,
                min_delay_ms: 1,
                max_delay_ms: 2,
            },
            ..StorageConfig::default()
        };
        config.s3.endpoint = "https://s3.example.com".to_string();
        config.s3.bucket = "live".to_string();
        config.s3.serving_endpoint = "https://cdn.example.com".to_string();
        config
    }

    fn stage(root: &Path, relative: &str, data: &[u8]) -> ArtifactPath {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, data).unwrap();
        ArtifactPath::new(ArtifactKind::Segment, relative).unwrap()
    }

    #[tokio::test]
    async fn test_upload_gives_up_after_four_attempts() {
        let temp_dir = tempdir().unwrap();
        let artifact = stage(temp_dir.path(), "hls/0/seg1.ts", b"segment");

        let mut store = MockObjectStore::new();
        store
            .expect_put()
            .times(4)
            .returning(|_, _, _| Err(io::Error::new(io::ErrorKind::TimedOut, "timeout")));

        let provider = RemoteStorage::with_store(&config(temp_dir.path()), Arc::new(store));
        let err = provider.save(&artifact, 1).await.unwrap_err();

        match err {
            StorageError::GivingUp { attempts, path, .. } => {
                assert_eq!(attempts, 4);
                assert_eq!(path, PathBuf::from("hls/0/seg1.ts"));
            }
            other => panic!("expected GivingUp, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_upload_carries_cache_hints() {
        let temp_dir = tempdir().unwrap();
        let artifact = stage(temp_dir.path(), "hls/0/seg1.ts", b"segment");

        let mut store = MockObjectStore::new();
        store
            .expect_put()
            .withf(|key, data, options| {
                key == "hls/0/seg1.ts"
                    && data.as_ref() == b"segment"
                    && options.cache_control == "max-age=600"
                    && options.content_type == "video/mp2t"
                    && options.acl == "public-read"
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let provider = RemoteStorage::with_store(&config(temp_dir.path()), Arc::new(store));
        let location = provider.save(&artifact, 1).await.unwrap();
        assert_eq!(location, "https://cdn.example.com/hls/0/seg1.ts");
    }

    #[tokio::test]
    async fn test_save_before_setup() {
        let temp_dir = tempdir().unwrap();
        let artifact = stage(temp_dir.path(), "hls/0/seg1.ts", b"segment");

        let provider = RemoteStorage::new(&config(temp_dir.path()));
        let err = provider.save(&artifact, 1).await.unwrap_err();
        assert!(matches!(err, StorageError::NotInitialized));
    }

    #[tokio::test]
    async fn test_setup_rejects_missing_credentials() {
        let temp_dir = tempdir().unwrap();
        let provider = RemoteStorage::new(&config(temp_dir.path()));

        let err = provider.setup().await.unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("access_key"));
    }

    #[tokio::test]
    async fn test_setup_rejects_bad_endpoint() {
        let temp_dir = tempdir().unwrap();
        let mut config = config(temp_dir.path());
        config.s3.access_key = "key".to_string();
        config.s3.secret = "secret".to_string();
        config.s3.endpoint = "ftp://s3.example.com".to_string();

        let err = RemoteStorage::new(&config).setup().await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_setup_builds_s3_client() {
        let temp_dir = tempdir().unwrap();
        let mut config = config(temp_dir.path());
        config.s3.access_key = "key".to_string();
        config.s3.secret = "secret".to_string();

        let provider = RemoteStorage::new(&config);
        provider.setup().await.unwrap();
        assert!(provider.store().is_ok());
    }
}
