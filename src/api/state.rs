use std::sync::Arc;

use crate::config::Config;
use crate::db::{ConfigRepository, PageStore};
use crate::services::providers::UpstreamListSource;
use crate::services::{
    CacheGateway, CatalogService, ManifestBuilder, PaginationSynthesizer, RevisionTracker,
    UserConfigService,
};

/// Addon identity and cache tuning
#[derive(Debug, Clone)]
pub struct AddonOptions {
    pub addon_id: String,
    pub default_addon_name: String,
    pub cache_ttl_secs: u64,
}

impl From<&Config> for AddonOptions {
    fn from(config: &Config) -> Self {
        Self {
            addon_id: config.addon_id.clone(),
            default_addon_name: config.default_addon_name.clone(),
            cache_ttl_secs: config.cache_ttl_secs,
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub catalogs: CatalogService,
    pub manifests: ManifestBuilder,
    pub users: UserConfigService,
}

impl AppState {
    /// Wires the services over the given collaborators
    pub fn new(
        repo: Arc<dyn ConfigRepository>,
        store: Arc<dyn PageStore>,
        source: Arc<dyn UpstreamListSource>,
        options: AddonOptions,
    ) -> Self {
        let gateway = CacheGateway::new(
            store,
            PaginationSynthesizer::new(source),
            options.cache_ttl_secs,
        );
        let catalogs = CatalogService::new(repo.clone(), gateway);
        let revisions = RevisionTracker::new(repo.clone());

        let manifests = ManifestBuilder::new(
            repo.clone(),
            revisions.clone(),
            catalogs.clone(),
            options.addon_id,
            options.default_addon_name,
        );
        let users = UserConfigService::new(repo, revisions, catalogs.clone());

        Self {
            catalogs,
            manifests,
            users,
        }
    }
}
