use super::KvStore;
use crate::error::{ApiError, Result};
use async_trait::async_trait;
use worker::send::{SendFuture, SendWrapper};

pub const USER_DATA_BINDING: &str = "USER_DATA_KV";

/// Workers KV namespace bound as `USER_DATA_KV`
pub struct CloudflareKv {
    kv: SendWrapper<worker::kv::KvStore>,
}

impl CloudflareKv {
    pub fn new(kv: worker::kv::KvStore) -> Self {
        CloudflareKv {
            kv: SendWrapper::new(kv),
        }
    }
}

#[async_trait]
impl KvStore for CloudflareKv {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        SendFuture::new(async {
            self.kv
                .get(key)
                .text()
                .await
                .map_err(|e| ApiError::StorageError(format!("Failed to get {}: {}", key, e)))
        })
        .await
    }

    async fn put(&self, key: &str, value: String, ttl_secs: Option<u64>) -> Result<()> {
        SendFuture::new(async {
            let mut put = self
                .kv
                .put(key, value)
                .map_err(|e| ApiError::StorageError(format!("Failed to prepare put: {}", e)))?;

            if let Some(ttl) = ttl_secs {
                put = put.expiration_ttl(ttl);
            }

            put.execute()
                .await
                .map_err(|e| ApiError::StorageError(format!("Failed to execute KV put: {}", e)))
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        SendFuture::new(async {
            self.kv
                .delete(key)
                .await
                .map_err(|e| ApiError::StorageError(format!("Failed to delete {}: {}", key, e)))
        })
        .await
    }
}
