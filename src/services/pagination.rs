//! Turns a logical offset into upstream page fetches.
//!
//! Two strategies sit behind [`PaginationSynthesizer::synthesize`]:
//!
//! - [`Strategy::DirectWindow`] maps the offset straight onto upstream
//!   positions and reads only the 100-item window it covers. Sorting is
//!   applied within that window only, so a sort over a list longer than one
//!   window is locally, not globally, ordered.
//! - [`Strategy::NarrowedAccumulate`] walks upstream from the first page,
//!   filtering as it goes, until the filtered pool covers the requested window
//!   or the page cap is reached. The whole pool is sorted before slicing.

use chrono::NaiveDate;
use std::sync::Arc;

use crate::models::{CatalogEntry, ListConfig, RawListItem};
use crate::services::filter::FilterSpec;
use crate::services::meta;
use crate::services::providers::UpstreamListSource;

/// Entries per catalog page served to the client
pub const PAGE_SIZE: usize = 100;
/// Items requested per upstream page
pub const UPSTREAM_PAGE_SIZE: usize = 100;
/// Upstream pages a narrowed request may read
pub const MAX_UPSTREAM_PAGES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    DirectWindow,
    NarrowedAccumulate,
}

impl Strategy {
    pub fn for_spec(spec: &FilterSpec) -> Self {
        if spec.is_narrowing() {
            Strategy::NarrowedAccumulate
        } else {
            Strategy::DirectWindow
        }
    }
}

/// One page to synthesize
#[derive(Debug, Clone, Copy)]
pub struct PageRequest<'a> {
    pub user_id: &'a str,
    pub list: &'a ListConfig,
    pub offset: usize,
    pub spec: &'a FilterSpec,
    pub today: NaiveDate,
}

#[derive(Clone)]
pub struct PaginationSynthesizer {
    source: Arc<dyn UpstreamListSource>,
}

impl PaginationSynthesizer {
    pub fn new(source: Arc<dyn UpstreamListSource>) -> Self {
        Self { source }
    }

    /// Produces up to [`PAGE_SIZE`] entries for the request.
    ///
    /// Never fails: upstream errors read as end of data, so a short or empty
    /// page is returned instead.
    pub async fn synthesize(&self, request: &PageRequest<'_>) -> Vec<CatalogEntry> {
        match Strategy::for_spec(request.spec) {
            Strategy::DirectWindow => self.direct_window(request).await,
            Strategy::NarrowedAccumulate => self.narrowed_accumulate(request).await,
        }
    }

    async fn fetch_or_empty(&self, request: &PageRequest<'_>, page: usize) -> Vec<RawListItem> {
        match self
            .source
            .fetch_page(
                request.user_id,
                &request.list.source,
                request.list.kind,
                UPSTREAM_PAGE_SIZE,
                page,
            )
            .await
        {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    user_id = %request.user_id,
                    list_id = %request.list.id,
                    page = page,
                    provider = self.source.name(),
                    "Upstream page fetch failed, treating as end of list"
                );
                Vec::new()
            }
        }
    }

    async fn direct_window(&self, request: &PageRequest<'_>) -> Vec<CatalogEntry> {
        let mut page = request.offset / UPSTREAM_PAGE_SIZE + 1;
        let mut skip = request.offset % UPSTREAM_PAGE_SIZE;
        let mut window: Vec<RawListItem> = Vec::with_capacity(PAGE_SIZE);

        while window.len() < PAGE_SIZE {
            let items = self.fetch_or_empty(request, page).await;
            let fetched = items.len();
            if fetched == 0 {
                break;
            }

            let room = PAGE_SIZE - window.len();
            window.extend(items.into_iter().skip(skip).take(room));
            skip = 0;

            if fetched < UPSTREAM_PAGE_SIZE {
                break;
            }
            page += 1;
        }

        let entries = meta::normalize_page(window, request.list.kind);
        let mut entries = request.spec.apply(entries, request.today);
        request.spec.sort_entries(&mut entries);

        tracing::debug!(
            list_id = %request.list.id,
            offset = request.offset,
            last_page = page,
            entries = entries.len(),
            "Direct window synthesized"
        );

        entries
    }

    async fn narrowed_accumulate(&self, request: &PageRequest<'_>) -> Vec<CatalogEntry> {
        let target = request.offset + PAGE_SIZE;
        let mut pool: Vec<CatalogEntry> = Vec::new();
        let mut pages_read = 0;

        for page in 1..=MAX_UPSTREAM_PAGES {
            let items = self.fetch_or_empty(request, page).await;
            let fetched = items.len();
            if fetched == 0 {
                break;
            }
            pages_read = page;

            let batch = meta::normalize_page(items, request.list.kind);
            pool.extend(request.spec.apply(batch, request.today));

            if pool.len() >= target || fetched < UPSTREAM_PAGE_SIZE {
                break;
            }
        }

        request.spec.sort_entries(&mut pool);

        tracing::debug!(
            list_id = %request.list.id,
            offset = request.offset,
            pages_read = pages_read,
            pool = pool.len(),
            "Narrowed pool accumulated"
        );

        pool.into_iter()
            .skip(request.offset)
            .take(PAGE_SIZE)
            .collect()
    }
}
