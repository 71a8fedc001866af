use chrono::Utc;
use std::sync::Arc;

use crate::db::ConfigRepository;
use crate::models::{ListConfig, UserSettings};
use crate::services::cache_gateway::{CacheGateway, ServedPage};
use crate::services::filter::{FilterOverrides, FilterSpec};
use crate::services::pagination::PageRequest;

/// Entry point for catalog page requests
///
/// Every failure on this path degrades to "no page": repository errors and
/// unknown or disabled catalogs are logged and answered with `None`, which
/// the HTTP layer renders as an empty `metas` array.
#[derive(Clone)]
pub struct CatalogService {
    repo: Arc<dyn ConfigRepository>,
    gateway: CacheGateway,
}

impl CatalogService {
    pub fn new(repo: Arc<dyn ConfigRepository>, gateway: CacheGateway) -> Self {
        Self { repo, gateway }
    }

    pub async fn page(
        &self,
        user_id: &str,
        catalog_id: &str,
        offset: usize,
        overrides: &FilterOverrides,
    ) -> Option<ServedPage> {
        let lists = match self.repo.get_lists(user_id).await {
            Ok(lists) => lists,
            Err(e) => {
                tracing::error!(error = %e, user_id = %user_id, "Failed to load lists");
                return None;
            }
        };

        let Some(list) = lists
            .into_iter()
            .find(|list| list.enabled && list.catalog_id() == catalog_id)
        else {
            tracing::info!(
                user_id = %user_id,
                catalog_id = %catalog_id,
                "Catalog not among enabled lists"
            );
            return None;
        };

        let settings = match self.repo.get_settings(user_id).await {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!(error = %e, user_id = %user_id, "Falling back to default settings");
                UserSettings::default()
            }
        };

        Some(self.serve(user_id, &list, &settings, offset, overrides).await)
    }

    async fn serve(
        &self,
        user_id: &str,
        list: &ListConfig,
        settings: &UserSettings,
        offset: usize,
        overrides: &FilterOverrides,
    ) -> ServedPage {
        let spec = FilterSpec::resolve(overrides, list, settings);
        let request = PageRequest {
            user_id,
            list,
            offset,
            spec: &spec,
            today: Utc::now().date_naive(),
        };
        self.gateway.get_page(&request).await
    }

    /// Computes and caches the first page a client would request by default
    pub async fn warm(&self, user_id: &str, list: &ListConfig, settings: &UserSettings) {
        let served = self
            .serve(user_id, list, settings, 0, &FilterOverrides::default())
            .await;
        tracing::debug!(
            user_id = %user_id,
            catalog_id = %list.catalog_id(),
            from_cache = served.from_cache,
            entries = served.metas().len(),
            "Catalog warmed"
        );
    }

    /// Drops every cached page of the user
    pub async fn purge(&self, user_id: &str) {
        self.gateway.purge_user(user_id).await;
    }
}
