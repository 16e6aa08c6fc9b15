use super::{ObjectStore, StoreError};
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct PutRecord {
    pub bucket: String,
    pub key: String,
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// 仅用于测试：记录每次写入，可配置为始终失败。
#[derive(Debug, Default)]
pub struct MemoryStore {
    puts: Mutex<Vec<PutRecord>>,
    fail_with: Option<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(message: &str) -> Self {
        Self {
            puts: Mutex::new(Vec::new()),
            fail_with: Some(message.to_string()),
        }
    }

    pub fn puts(&self) -> Vec<PutRecord> {
        self.puts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StoreError> {
        if let Some(message) = &self.fail_with {
            return Err(StoreError(message.clone()));
        }
        self.puts.lock().unwrap().push(PutRecord {
            bucket: bucket.to_string(),
            key: key.to_string(),
            bytes,
            content_type: content_type.to_string(),
        });
        Ok(())
    }

    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        ttl: Duration,
    ) -> Result<String, StoreError> {
        Ok(format!(
            "memory://{bucket}/{key}?expires_in={}",
            ttl.as_secs()
        ))
    }
}
