use super::KvStore;
use crate::error::{ApiError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

struct Entry {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Default)]
pub struct MemoryStorage {
    storage: Arc<Mutex<HashMap<String, Entry>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.storage.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Entry>>> {
        self.storage
            .lock()
            .map_err(|e| ApiError::StorageError(format!("Failed to acquire lock: {}", e)))
    }
}

#[async_trait]
impl KvStore for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut storage = self.lock()?;
        let expired = match storage.get(key) {
            None => return Ok(None),
            Some(entry) => entry.expires_at.is_some_and(|at| at <= Utc::now()),
        };

        if expired {
            storage.remove(key);
            return Ok(None);
        }
        Ok(storage.get(key).map(|entry| entry.value.clone()))
    }

    async fn put(&self, key: &str, value: String, ttl_secs: Option<u64>) -> Result<()> {
        let expires_at = ttl_secs.map(|ttl| Utc::now() + Duration::seconds(ttl as i64));
        self.lock()?
            .insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_delete() {
        let store = MemoryStorage::new();
        store.put("user:1", "{}".into(), None).await.unwrap();
        assert_eq!(store.get("user:1").await.unwrap().as_deref(), Some("{}"));

        store.delete("user:1").await.unwrap();
        assert!(store.get("user:1").await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_zero_ttl_expires_immediately() {
        let store = MemoryStorage::new();
        store
            .put("uber_state:1", "abc".into(), Some(0))
            .await
            .unwrap();
        assert!(store.get("uber_state:1").await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_ttl_keeps_fresh_entries() {
        let store = MemoryStorage::new();
        store
            .put("ola_state:1", "xyz".into(), Some(600))
            .await
            .unwrap();
        assert_eq!(
            store.get("ola_state:1").await.unwrap().as_deref(),
            Some("xyz")
        );
    }
}
