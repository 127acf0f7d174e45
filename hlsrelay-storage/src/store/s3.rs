// S3-compatible object store backend
//
// Supports AWS S3, MinIO and anything else that speaks the S3 API, through
// OpenDAL. Per-object ACLs are not exposed by OpenDAL's S3 service; public
// access has to come from the bucket policy, the configured ACL is only
// reported.

use super::{ObjectStore, PutOptions};
use async_trait::async_trait;
use bytes::Bytes;
use hlsrelay_core::S3Config;
use opendal::{services::S3, Operator};
use std::io::{Error, ErrorKind, Result};

/// Region used when none is configured; S3-compatible services ignore it
const FALLBACK_REGION: &str = "us-east-1";

pub struct S3ObjectStore {
    operator: Operator,
    bucket: String,
}

impl S3ObjectStore {
    pub fn new(config: &S3Config) -> Result<Self> {
        tracing::info!(
            "Initializing S3 object store: bucket={}, endpoint={}, acl={}",
            config.bucket,
            config.endpoint,
            config.acl_or_default()
        );

        let region = if config.region.is_empty() {
            FALLBACK_REGION
        } else {
            config.region.as_str()
        };

        let builder = S3::default()
            .endpoint(&config.endpoint)
            .access_key_id(&config.access_key)
            .secret_access_key(&config.secret)
            .bucket(&config.bucket)
            .region(region);

        let operator = Operator::new(builder).map_err(into_io_error)?.finish();

        Ok(Self {
            operator,
            bucket: config.bucket.clone(),
        })
    }
}

/// Map OpenDAL errors onto I/O kinds the retry layer understands
fn into_io_error(err: opendal::Error) -> Error {
    let kind = match err.kind() {
        opendal::ErrorKind::NotFound => ErrorKind::NotFound,
        opendal::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
        opendal::ErrorKind::ConfigInvalid => ErrorKind::InvalidInput,
        opendal::ErrorKind::Unsupported => ErrorKind::Unsupported,
        _ if err.is_temporary() => ErrorKind::TimedOut,
        _ => ErrorKind::Other,
    };
    Error::new(kind, err)
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(&self, key: &str, data: Bytes, options: &PutOptions) -> Result<()> {
        let size = data.len();

        self.operator
            .write_with(key, data)
            .cache_control(&options.cache_control)
            .content_type(&options.content_type)
            .await
            .map_err(into_io_error)?;

        tracing::trace!("Uploaded to {}: {} ({} bytes)", self.bucket, key, size);

        Ok(())
    }
}
