use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::db::PageStore;
use crate::error::AppResult;

/// Expiry instant; `None` when the TTL reaches past what `Instant` can hold
type Expiry = Option<Instant>;

fn is_live(expires_at: &Expiry, now: Instant) -> bool {
    expires_at.map_or(true, |at| now < at)
}

/// In-process page store with per-entry expiry
///
/// Used by tests and by local runs without Redis. Expired entries are swept
/// on every write.
#[derive(Default)]
pub struct MemoryPageStore {
    entries: RwLock<HashMap<String, (String, Expiry)>>,
}

impl MemoryPageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently held, expired or not
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait::async_trait]
impl PageStore for MemoryPageStore {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let entries = self.entries.read().await;
        let now = Instant::now();
        Ok(entries
            .get(key)
            .filter(|(_, expires_at)| is_live(expires_at, now))
            .map(|(value, _)| value.clone()))
    }

    async fn set(&self, key: &str, value: String, ttl_secs: u64) -> AppResult<()> {
        let now = Instant::now();
        let expires_at = now.checked_add(Duration::from_secs(ttl_secs));

        let mut entries = self.entries.write().await;
        entries.retain(|_, (_, at)| is_live(at, now));
        entries.insert(key.to_string(), (value, expires_at));
        Ok(())
    }

    async fn invalidate_prefix(&self, prefix: &str) -> AppResult<u64> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        Ok((before - entries.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_then_get() {
        let store = MemoryPageStore::new();
        store.set("catalog:u1:a", "page".to_string(), 60).await.unwrap();
        assert_eq!(store.get("catalog:u1:a").await.unwrap(), Some("page".to_string()));
        assert_eq!(store.get("catalog:u1:b").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_zero_ttl_is_already_expired() {
        let store = MemoryPageStore::new();
        store.set("k", "v".to_string(), 0).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expired_entries_are_swept_on_write() {
        let store = MemoryPageStore::new();
        store.set("catalog:u1:a", "old".to_string(), 0).await.unwrap();
        store.set("catalog:u1:b", "old".to_string(), 0).await.unwrap();
        assert_eq!(store.len().await, 1);

        store.set("catalog:u1:c", "new".to_string(), 60).await.unwrap();
        assert_eq!(store.len().await, 1);
        assert_eq!(store.get("catalog:u1:c").await.unwrap(), Some("new".to_string()));
    }

    #[tokio::test]
    async fn test_huge_ttl_does_not_overflow() {
        let store = MemoryPageStore::new();
        store.set("k", "v".to_string(), u64::MAX).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));
    }

    #[tokio::test]
    async fn test_invalidate_prefix_only_touches_prefix() {
        let store = MemoryPageStore::new();
        store.set("catalog:u1:a", "1".to_string(), 60).await.unwrap();
        store.set("catalog:u1:b", "2".to_string(), 60).await.unwrap();
        store.set("catalog:u12:a", "3".to_string(), 60).await.unwrap();

        let removed = store.invalidate_prefix("catalog:u1:").await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.len().await, 1);
        assert!(store.get("catalog:u12:a").await.unwrap().is_some());
    }
}
