// Object store seam for the remote provider
//
// - S3ObjectStore: any S3-compatible service through OpenDAL
// - MemoryObjectStore: in-process map, used by tests
//
// Stores are plain key-value sinks. They do not know about playlists,
// ordering or retries; the provider layers those on top.

pub mod memory;
pub mod s3;

use async_trait::async_trait;
use bytes::Bytes;
use std::io::Result;

/// Per-object metadata attached to an upload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutOptions {
    /// e.g. "max-age=600"
    pub cache_control: String,
    pub content_type: String,
    /// Canned access policy, e.g. "public-read"
    pub acl: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write an object, replacing any existing one under `key`
    async fn put(&self, key: &str, data: Bytes, options: &PutOptions) -> Result<()>;
}

pub use memory::MemoryObjectStore;
pub use s3::S3ObjectStore;
