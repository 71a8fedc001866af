use crate::error::AppResult;

/// Key-value store for synthesized catalog pages
///
/// Values are opaque serialized strings. Implementations must tolerate
/// concurrent access from many in-flight requests.
#[async_trait::async_trait]
pub trait PageStore: Send + Sync {
    /// Returns the live value under `key`, if any
    async fn get(&self, key: &str) -> AppResult<Option<String>>;

    /// Stores `value` under `key` for `ttl_secs` seconds
    ///
    /// A page synthesized before a purge and stored after it survives the
    /// purge and stays until its TTL runs out.
    async fn set(&self, key: &str, value: String, ttl_secs: u64) -> AppResult<()>;

    /// Removes every key starting with `prefix`, returning how many went
    async fn invalidate_prefix(&self, prefix: &str) -> AppResult<u64>;
}
