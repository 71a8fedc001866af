//! Upstream list source abstraction
//!
//! The catalog engine pulls raw list items page by page through this trait.
//! Retry, backoff and timeouts belong to the implementation, never to the
//! engine; the engine treats any error as an empty page.

use crate::{
    error::AppResult,
    models::{MediaKind, RawListItem},
};

pub mod mdblist;

pub use mdblist::MdbListSource;

/// Trait for upstream list services
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait UpstreamListSource: Send + Sync {
    /// Fetch one page of raw items
    ///
    /// `page` is 1-based. An empty vector signals the end of the list.
    async fn fetch_page(
        &self,
        user_id: &str,
        source: &str,
        kind: MediaKind,
        page_size: usize,
        page: usize,
    ) -> AppResult<Vec<RawListItem>>;

    /// Provider name for logging and debugging
    fn name(&self) -> &'static str;
}
