//! In-process object storage for development and tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use super::ObjectStorage;

#[derive(Debug, Clone)]
struct StoredObject {
    bytes: Bytes,
    content_type: String,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    bucket: String,
    objects: Arc<Mutex<HashMap<String, StoredObject>>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: Arc::default(),
        }
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.objects.lock().contains_key(path)
    }

    /// Stored bytes and content type.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<(Bytes, String)> {
        self.objects
            .lock()
            .get(path)
            .map(|o| (o.bytes.clone(), o.content_type.clone()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn upload(&self, path: &str, bytes: Bytes, content_type: &str) -> anyhow::Result<()> {
        let mut objects = self.objects.lock();
        if objects.contains_key(path) {
            anyhow::bail!("Object already exists: {path}");
        }
        objects.insert(
            path.to_string(),
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn sign(&self, path: &str, ttl: Duration) -> anyhow::Result<String> {
        if !self.contains(path) {
            anyhow::bail!("Object not found: {path}");
        }
        Ok(format!("memory://{}/{path}?expiresIn={}", self.bucket, ttl.as_secs()))
    }

    async fn delete(&self, path: &str) -> anyhow::Result<()> {
        self.objects.lock().remove(path);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
