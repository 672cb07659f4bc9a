pub mod cloudflare;
pub mod memory;

use crate::error::Result;
use async_trait::async_trait;

/// Minimal key-value contract shared by Workers KV and the in-memory store.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores `value`; `ttl_secs` makes the entry expire.
    async fn put(&self, key: &str, value: String, ttl_secs: Option<u64>) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;
}

pub fn user_key(user_id: &str) -> String {
    format!("user:{}", user_id)
}
