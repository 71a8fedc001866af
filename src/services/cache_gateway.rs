use chrono::Utc;
use std::fmt::Display;
use std::sync::Arc;

use crate::db::PageStore;
use crate::models::{CachedPage, CatalogEntry};
use crate::services::filter::FilterSpec;
use crate::services::pagination::{PageRequest, PaginationSynthesizer};

const KEY_NAMESPACE: &str = "catalog";

/// Escapes the separator so an id can never spill into the next key segment
fn escape_segment(raw: &str) -> String {
    raw.replace('%', "%25").replace(':', "%3A")
}

/// Cache key of one synthesized page
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CatalogKey {
    pub user_id: String,
    pub catalog_id: String,
    pub offset: usize,
    pub spec_fragment: String,
}

impl CatalogKey {
    pub fn new(user_id: &str, catalog_id: &str, offset: usize, spec: &FilterSpec) -> Self {
        Self {
            user_id: user_id.to_string(),
            catalog_id: catalog_id.to_string(),
            offset,
            spec_fragment: spec.cache_fragment(),
        }
    }

    /// Prefix shared by every key of one user
    pub fn user_prefix(user_id: &str) -> String {
        format!("{}:{}:", KEY_NAMESPACE, escape_segment(user_id))
    }
}

impl Display for CatalogKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{}:{}:{}",
            Self::user_prefix(&self.user_id),
            escape_segment(&self.catalog_id),
            self.offset,
            self.spec_fragment
        )
    }
}

/// A page as served, tagged with where it came from
#[derive(Debug, Clone, PartialEq)]
pub struct ServedPage {
    pub page: CachedPage,
    pub from_cache: bool,
}

impl ServedPage {
    pub fn metas(&self) -> &[CatalogEntry] {
        &self.page.metas
    }
}

/// Read-through cache in front of the pagination synthesizer
///
/// Store failures degrade to a miss (on read) or an uncached response (on
/// write). Concurrent misses for the same key may each synthesize the page.
#[derive(Clone)]
pub struct CacheGateway {
    store: Arc<dyn PageStore>,
    synthesizer: PaginationSynthesizer,
    ttl_secs: u64,
}

impl CacheGateway {
    pub fn new(store: Arc<dyn PageStore>, synthesizer: PaginationSynthesizer, ttl_secs: u64) -> Self {
        Self {
            store,
            synthesizer,
            ttl_secs,
        }
    }

    async fn lookup(&self, key: &str) -> Option<CachedPage> {
        match self.store.get(key).await {
            Ok(Some(json)) => match serde_json::from_str(&json) {
                Ok(page) => Some(page),
                Err(e) => {
                    tracing::warn!(error = %e, key = %key, "Discarding undecodable cached page");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, key = %key, "Cache read failed, treating as miss");
                None
            }
        }
    }

    async fn store(&self, key: &str, page: &CachedPage) {
        let json = match serde_json::to_string(page) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, "Cache serialization error");
                return;
            }
        };

        if let Err(e) = self.store.set(key, json, self.ttl_secs).await {
            tracing::warn!(error = %e, key = %key, "Cache write failed");
        }
    }

    /// Returns the cached page for the request or synthesizes and stores it.
    pub async fn get_page(&self, request: &PageRequest<'_>) -> ServedPage {
        let key = CatalogKey::new(
            request.user_id,
            &request.list.catalog_id(),
            request.offset,
            request.spec,
        )
        .to_string();

        if let Some(page) = self.lookup(&key).await {
            tracing::debug!(key = %key, cache = "hit", "Catalog page served");
            return ServedPage {
                page,
                from_cache: true,
            };
        }

        let metas = self.synthesizer.synthesize(request).await;
        let page = CachedPage {
            metas,
            cached_at: Utc::now(),
        };
        self.store(&key, &page).await;

        tracing::debug!(key = %key, cache = "miss", entries = page.metas.len(), "Catalog page served");
        ServedPage {
            page,
            from_cache: false,
        }
    }

    /// Drops every cached page of the user.
    pub async fn purge_user(&self, user_id: &str) {
        let prefix = CatalogKey::user_prefix(user_id);
        match self.store.invalidate_prefix(&prefix).await {
            Ok(removed) => {
                tracing::info!(user_id = %user_id, removed = removed, "Purged cached catalog pages")
            }
            Err(e) => {
                tracing::warn!(error = %e, user_id = %user_id, "Cache purge failed")
            }
        }
    }
}
