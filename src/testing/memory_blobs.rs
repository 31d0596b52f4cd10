use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::services::storage::{join_public_url, BlobStore, StorageError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub content_type: String,
}

/// In-memory implementation of [`BlobStore`].
#[derive(Debug)]
pub struct MemoryBlobStore {
    base_url: String,
    objects: Arc<RwLock<BTreeMap<String, StoredObject>>>,
    fail_puts: Arc<RwLock<bool>>,
}

impl MemoryBlobStore {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            objects: Arc::new(RwLock::new(BTreeMap::new())),
            fail_puts: Arc::new(RwLock::new(false)),
        }
    }

    pub async fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.read().await.get(key).cloned()
    }

    pub async fn keys(&self) -> Vec<String> {
        self.objects.read().await.keys().cloned().collect()
    }

    /// Make every subsequent upload fail.
    pub async fn set_fail_puts(&self, fail: bool) {
        *self.fail_puts.write().await = fail;
    }

    /// Object key for a URL this store handed out.
    pub fn key_for_url<'a>(&self, url: &'a str) -> Option<&'a str> {
        url.strip_prefix(self.base_url.trim_end_matches('/'))
            .map(|rest| rest.trim_start_matches('/'))
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> Result<(), StorageError> {
        if *self.fail_puts.read().await {
            return Err(StorageError::Unavailable(format!("refusing to store {key}")));
        }
        self.objects.write().await.insert(
            key.to_string(),
            StoredObject {
                data: data.to_vec(),
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        join_public_url(&self.base_url, key)
    }
}
