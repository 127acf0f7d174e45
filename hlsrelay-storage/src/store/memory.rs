// In-memory object store
//
// Keeps every object with the options it was uploaded with, so tests can
// assert on cache headers as well as content. Data is lost on restart.

use super::{ObjectStore, PutOptions};
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use std::io::Result;

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Bytes,
    pub options: PutOptions,
}

#[derive(Default)]
pub struct MemoryObjectStore {
    objects: DashMap<String, StoredObject>,
}

impl MemoryObjectStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.get(key).map(|entry| entry.value().clone())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, key: &str, data: Bytes, options: &PutOptions) -> Result<()> {
        tracing::trace!("Stored in memory: {} ({} bytes)", key, data.len());
        self.objects.insert(
            key.to_string(),
            StoredObject {
                data,
                options: options.clone(),
            },
        );
        Ok(())
    }
}
