use redis::AsyncCommands;
use redis::Client;
use tokio::sync::{mpsc, oneshot};

use crate::db::PageStore;
use crate::error::AppResult;

/// Keys examined per SCAN round during prefix invalidation
const SCAN_BATCH: usize = 500;

/// Creates a Redis client for caching
///
/// Establishes a connection to Redis for fast data caching.
/// Uses connection pooling via the connection-manager feature.
pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    let client = Client::open(redis_url)?;
    Ok(client)
}

/// Escapes glob metacharacters so a literal prefix can be used with MATCH
fn glob_escape(prefix: &str) -> String {
    let mut out = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('*');
    out
}

/// Message for asynchronous cache writes
struct CacheWriteMessage {
    key: String,
    value: String,
    ttl: u64,
}

enum WriterCommand {
    Write(CacheWriteMessage),
    /// Acknowledged once every write queued before it has been applied
    Flush(oneshot::Sender<()>),
}

/// Page store backed by Redis
///
/// Reads go straight to Redis; writes are handed to a background task so a
/// catalog response never waits on the cache write. Prefix invalidation
/// first waits for the writes already queued, so none of them can land
/// after the keys are deleted.
#[derive(Clone)]
pub struct RedisPageStore {
    redis_client: Client,
    write_tx: mpsc::UnboundedSender<WriterCommand>,
}

/// Handle for gracefully shutting down the cache writer
pub struct CacheWriterHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl CacheWriterHandle {
    /// Signals the writer task to flush pending writes and stop
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        tracing::info!("Cache writer shutdown signal sent");
    }
}

impl RedisPageStore {
    /// Creates the store and spawns its background writer task
    pub fn new(redis_client: Client) -> (Self, CacheWriterHandle) {
        let (write_tx, write_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let client = redis_client.clone();
        tokio::spawn(async move {
            Self::cache_writer_task(client, write_rx, shutdown_rx).await;
        });

        let store = Self {
            redis_client,
            write_tx,
        };

        (store, CacheWriterHandle { shutdown_tx })
    }

    /// Drains write messages into Redis until shutdown, then flushes the rest
    async fn cache_writer_task(
        client: Client,
        mut write_rx: mpsc::UnboundedReceiver<WriterCommand>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        tracing::info!("Cache writer task started");

        loop {
            tokio::select! {
                Some(command) = write_rx.recv() => {
                    Self::apply(&client, command).await;
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("Cache writer shutting down, flushing remaining writes");

                    write_rx.close();
                    while let Some(command) = write_rx.recv().await {
                        Self::apply(&client, command).await;
                    }

                    tracing::info!("Cache writer task stopped");
                    break;
                }
            }
        }
    }

    async fn apply(client: &Client, command: WriterCommand) {
        match command {
            WriterCommand::Write(msg) => {
                if let Err(e) = Self::write_to_redis(client, msg).await {
                    tracing::warn!(error = %e, "Failed to write catalog page to Redis");
                }
            }
            WriterCommand::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }

    /// Waits until the writer has applied everything queued so far
    ///
    /// Returns immediately when the writer has already stopped.
    pub async fn flush_pending(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.write_tx.send(WriterCommand::Flush(ack_tx)).is_err() {
            return;
        }
        let _ = ack_rx.await;
    }

    async fn write_to_redis(client: &Client, msg: CacheWriteMessage) -> AppResult<()> {
        let mut conn = client.get_multiplexed_async_connection().await?;
        let _: () = conn.set_ex(msg.key, msg.value, msg.ttl).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl PageStore for RedisPageStore {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let cached: Option<String> = conn.get(key).await?;
        Ok(cached)
    }

    async fn set(&self, key: &str, value: String, ttl_secs: u64) -> AppResult<()> {
        let msg = CacheWriteMessage {
            key: key.to_string(),
            value,
            ttl: ttl_secs.max(1),
        };

        if let Err(e) = self.write_tx.send(WriterCommand::Write(msg)) {
            tracing::error!(error = %e, "Failed to send cache write message");
        }
        Ok(())
    }

    async fn invalidate_prefix(&self, prefix: &str) -> AppResult<u64> {
        self.flush_pending().await;

        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let pattern = glob_escape(prefix);
        let mut cursor: u64 = 0;
        let mut removed: u64 = 0;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;

            if !keys.is_empty() {
                let deleted: u64 = conn.del(&keys).await?;
                removed += deleted;
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        tracing::debug!(prefix = %prefix, removed = removed, "Invalidated cached pages");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_escape_plain_prefix() {
        assert_eq!(glob_escape("catalog:u1:"), "catalog:u1:*");
    }

    #[test]
    fn test_glob_escape_metacharacters() {
        assert_eq!(glob_escape("catalog:a*b?:"), "catalog:a\\*b\\?:*");
        assert_eq!(glob_escape("catalog:[x]:"), "catalog:\\[x\\]:*");
    }

    #[test]
    fn test_create_redis_client_rejects_bad_url() {
        assert!(create_redis_client("not a url").is_err());
    }

    #[tokio::test]
    async fn test_flush_waits_for_queued_writes_without_redis() {
        let client = create_redis_client("redis://127.0.0.1:1").unwrap();
        let (store, handle) = RedisPageStore::new(client);

        store.set("catalog:u1:a", "page".to_string(), 60).await.unwrap();
        let flushed = tokio::time::timeout(
            tokio::time::Duration::from_secs(10),
            store.flush_pending(),
        )
        .await;
        assert!(flushed.is_ok());

        handle.shutdown().await;
    }

    #[tokio::test]
    #[ignore = "requires a running Redis at REDIS_URL"]
    async fn test_queued_write_cannot_outlive_invalidation() {
        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
        let client = create_redis_client(&redis_url).unwrap();
        let (store, handle) = RedisPageStore::new(client);

        store
            .set("catalog:race-test:a", "page".to_string(), 60)
            .await
            .unwrap();
        store.invalidate_prefix("catalog:race-test:").await.unwrap();
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        assert_eq!(store.get("catalog:race-test:a").await.unwrap(), None);
        handle.shutdown().await;
    }

    #[tokio::test]
    #[ignore = "requires a running Redis at REDIS_URL"]
    async fn test_set_then_invalidate_against_live_redis() {
        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
        let client = create_redis_client(&redis_url).unwrap();
        let (store, handle) = RedisPageStore::new(client);

        store
            .set("catalog:live-test:a", "page".to_string(), 60)
            .await
            .unwrap();
        handle.shutdown().await;
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        assert_eq!(
            store.get("catalog:live-test:a").await.unwrap(),
            Some("page".to_string())
        );
        assert_eq!(store.invalidate_prefix("catalog:live-test:").await.unwrap(), 1);
        assert_eq!(store.get("catalog:live-test:a").await.unwrap(), None);
    }
}
