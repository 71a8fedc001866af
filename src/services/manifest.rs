use serde::Serialize;
use std::sync::Arc;

use crate::db::ConfigRepository;
use crate::error::AppResult;
use crate::models::{ListConfig, MediaKind, SortField, SortOrder, UserSettings};
use crate::services::catalog::CatalogService;
use crate::services::genre::CANONICAL_GENRES;
use crate::services::revision::RevisionTracker;

/// Type label used when neither a prefix nor an addon name yields one
pub const DEFAULT_TYPE_LABEL: &str = "Lists";

/// Identifier prefix of every item the addon serves
pub const ID_PREFIX: &str = "tt";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub id: String,
    pub version: String,
    pub name: String,
    pub description: String,
    pub resources: Vec<ManifestResource>,
    pub types: Vec<String>,
    pub catalogs: Vec<CatalogDescriptor>,
    pub id_prefixes: Vec<String>,
    pub behavior_hints: BehaviorHints,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ManifestResource {
    Name(String),
    Detailed {
        name: String,
        types: Vec<String>,
        #[serde(rename = "idPrefixes")]
        id_prefixes: Vec<String>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct BehaviorHints {
    pub configurable: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogDescriptor {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    pub name: String,
    pub extra: Vec<ExtraDescriptor>,
}

/// A request parameter a catalog accepts
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtraDescriptor {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    pub is_required: bool,
}

impl ExtraDescriptor {
    fn open(name: &str) -> Self {
        Self {
            name: name.to_string(),
            options: None,
            is_required: false,
        }
    }

    fn closed<I, S>(name: &str, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.to_string(),
            options: Some(options.into_iter().map(Into::into).collect()),
            is_required: false,
        }
    }
}

fn sanitize_label(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

/// Derives the single catalog type shared by all of a user's catalogs
///
/// Tries the catalog prefix, then the addon name, then [`DEFAULT_TYPE_LABEL`];
/// a candidate that sanitizes to nothing is skipped.
pub fn derive_type_label(settings: &UserSettings) -> String {
    [settings.catalog_prefix.as_deref(), settings.addon_name.as_deref()]
        .into_iter()
        .flatten()
        .map(sanitize_label)
        .find(|label| !label.is_empty())
        .unwrap_or_else(|| DEFAULT_TYPE_LABEL.to_string())
}

fn catalog_extras() -> Vec<ExtraDescriptor> {
    vec![
        ExtraDescriptor::open("skip"),
        ExtraDescriptor::closed("sort", SortField::ALL.iter().map(|s| s.as_str())),
        ExtraDescriptor::closed("order", SortOrder::ALL.iter().map(|o| o.as_str())),
        ExtraDescriptor::closed("genre", CANONICAL_GENRES.iter().copied()),
        ExtraDescriptor::open("yearMin"),
        ExtraDescriptor::open("yearMax"),
        ExtraDescriptor::open("ratingMin"),
        ExtraDescriptor::open("ratingMax"),
        ExtraDescriptor::closed("hideUnreleased", ["true", "false"]),
    ]
}

/// Enabled lists in display order, ties broken by name
fn catalog_lists(lists: Vec<ListConfig>) -> Vec<ListConfig> {
    let mut enabled: Vec<ListConfig> = lists.into_iter().filter(|list| list.enabled).collect();
    enabled.sort_by(|a, b| {
        a.display_order
            .cmp(&b.display_order)
            .then_with(|| a.name.cmp(&b.name))
    });
    enabled
}

/// Assembles per-user manifests
#[derive(Clone)]
pub struct ManifestBuilder {
    repo: Arc<dyn ConfigRepository>,
    revisions: RevisionTracker,
    catalogs: CatalogService,
    addon_id: String,
    default_addon_name: String,
}

impl ManifestBuilder {
    pub fn new(
        repo: Arc<dyn ConfigRepository>,
        revisions: RevisionTracker,
        catalogs: CatalogService,
        addon_id: String,
        default_addon_name: String,
    ) -> Self {
        Self {
            repo,
            revisions,
            catalogs,
            addon_id,
            default_addon_name,
        }
    }

    pub async fn build(&self, user_id: &str) -> AppResult<Manifest> {
        let version = self.revisions.version(user_id).await?;
        let settings = self.repo.get_settings(user_id).await?;
        let lists = catalog_lists(self.repo.get_lists(user_id).await?);

        let manifest = self.assemble(user_id, version, &settings, &lists);
        tracing::info!(
            user_id = %user_id,
            version = %manifest.version,
            catalogs = manifest.catalogs.len(),
            "Manifest built"
        );

        self.spawn_warmup(user_id, settings, lists);
        Ok(manifest)
    }

    fn assemble(
        &self,
        user_id: &str,
        version: String,
        settings: &UserSettings,
        lists: &[ListConfig],
    ) -> Manifest {
        let label = derive_type_label(settings);
        let name = settings
            .addon_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.default_addon_name)
            .to_string();

        let catalogs = lists
            .iter()
            .map(|list| CatalogDescriptor {
                kind: label.clone(),
                id: list.catalog_id(),
                name: list.name.clone(),
                extra: catalog_extras(),
            })
            .collect();

        let media_kinds = [MediaKind::Movie, MediaKind::Series]
            .iter()
            .map(|kind| kind.as_str().to_string())
            .collect();

        Manifest {
            id: format!("{}.{}", self.addon_id, user_id),
            version,
            description: format!("{} watch lists, filtered and sorted as catalogs", name),
            name,
            resources: vec![
                ManifestResource::Name("catalog".to_string()),
                ManifestResource::Detailed {
                    name: "meta".to_string(),
                    types: media_kinds,
                    id_prefixes: vec![ID_PREFIX.to_string()],
                },
            ],
            types: vec![label],
            catalogs,
            id_prefixes: vec![ID_PREFIX.to_string()],
            behavior_hints: BehaviorHints { configurable: true },
        }
    }

    /// Fire-and-forget page 0 fetch for every catalog
    fn spawn_warmup(&self, user_id: &str, settings: UserSettings, lists: Vec<ListConfig>) {
        if lists.is_empty() {
            return;
        }

        let catalogs = self.catalogs.clone();
        let user_id = user_id.to_string();
        tokio::spawn(async move {
            for list in &lists {
                catalogs.warm(&user_id, list, &settings).await;
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{InMemoryConfigRepository, MemoryPageStore};
    use crate::error::AppError;
    use crate::models::ListFilterDefaults;
    use crate::services::filter::FilterOverrides;
    use std::time::Duration;
    use crate::services::cache_gateway::CacheGateway;
    use crate::services::pagination::PaginationSynthesizer;
    use crate::services::providers::MockUpstreamListSource;

    fn list(id: &str, name: &str, display_order: i32, enabled: bool) -> ListConfig {
        ListConfig {
            id: id.to_string(),
            user_id: "u1".to_string(),
            name: name.to_string(),
            source: "alice/picks".to_string(),
            kind: MediaKind::Movie,
            sort: None,
            order: None,
            enabled,
            display_order,
            filters: ListFilterDefaults::default(),
        }
    }

    fn builder(repo: Arc<InMemoryConfigRepository>) -> ManifestBuilder {
        let mut mock = MockUpstreamListSource::new();
        mock.expect_name().return_const("mock");
        mock.expect_fetch_page()
            .returning(|_, _, _, _, _| Ok(Vec::new()));

        builder_with(repo, mock).0
    }

    fn builder_with(
        repo: Arc<InMemoryConfigRepository>,
        mock: MockUpstreamListSource,
    ) -> (ManifestBuilder, CatalogService, Arc<MemoryPageStore>) {
        let store = Arc::new(MemoryPageStore::new());
        let gateway = CacheGateway::new(
            store.clone(),
            PaginationSynthesizer::new(Arc::new(mock)),
            600,
        );
        let catalogs = CatalogService::new(repo.clone(), gateway);
        let builder = ManifestBuilder::new(
            repo.clone(),
            RevisionTracker::new(repo),
            catalogs.clone(),
            "community.listfeed".to_string(),
            "ListFeed".to_string(),
        );
        (builder, catalogs, store)
    }

    #[test]
    fn test_type_label_fallback_chain() {
        let mut settings = UserSettings::default();
        assert_eq!(derive_type_label(&settings), "Lists");

        settings.addon_name = Some("My Lists!".to_string());
        assert_eq!(derive_type_label(&settings), "MyLists");

        settings.catalog_prefix = Some("--".to_string());
        assert_eq!(derive_type_label(&settings), "MyLists");

        settings.catalog_prefix = Some("Weekend Picks".to_string());
        assert_eq!(derive_type_label(&settings), "WeekendPicks");
    }

    #[tokio::test]
    async fn test_manifest_shape() {
        let repo = Arc::new(InMemoryConfigRepository::new());
        repo.save_lists(
            "u1",
            &[
                list("3", "Zeta", 1, true),
                list("1", "Beta", 0, true),
                list("2", "Alpha", 1, true),
                list("4", "Hidden", 0, false),
            ],
        )
        .await
        .unwrap();

        let manifest = builder(repo).build("u1").await.unwrap();
        assert_eq!(manifest.id, "community.listfeed.u1");
        assert_eq!(manifest.version, "1.0.1");
        assert_eq!(manifest.name, "ListFeed");
        assert_eq!(manifest.types, vec!["Lists"]);

        let ids: Vec<&str> = manifest.catalogs.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["list-1", "list-2", "list-3"]);
        assert!(manifest.catalogs.iter().all(|c| c.kind == "Lists"));

        let json = serde_json::to_value(&manifest).unwrap();
        assert_eq!(json["resources"][0], "catalog");
        assert_eq!(json["resources"][1]["name"], "meta");
        assert_eq!(json["resources"][1]["idPrefixes"][0], "tt");
        assert_eq!(json["behaviorHints"]["configurable"], true);

        let extras = &json["catalogs"][0]["extra"];
        assert_eq!(extras[0]["name"], "skip");
        assert!(extras[0].get("options").is_none());
        assert_eq!(extras[1]["options"][0], "rank");
        assert_eq!(extras[3]["name"], "genre");
        assert!(extras[3]["options"]
            .as_array()
            .unwrap()
            .iter()
            .any(|g| g == "Science Fiction"));
    }

    #[tokio::test]
    async fn test_building_does_not_bump_revision() {
        let repo = Arc::new(InMemoryConfigRepository::new());
        let builder = builder(repo.clone());
        for _ in 0..3 {
            assert_eq!(builder.build("u1").await.unwrap().version, "1.0.1");
        }
    }

    #[tokio::test]
    async fn test_warmup_caches_first_page_despite_upstream_errors() {
        let repo = Arc::new(InMemoryConfigRepository::new());
        repo.save_lists("u1", &[list("1", "Picks", 0, true)])
            .await
            .unwrap();

        let mut mock = MockUpstreamListSource::new();
        mock.expect_name().return_const("mock");
        mock.expect_fetch_page()
            .returning(|_, _, _, _, _| Err(AppError::ExternalApi("upstream down".to_string())));
        let (builder, catalogs, store) = builder_with(repo, mock);

        let manifest = builder.build("u1").await.unwrap();
        assert_eq!(manifest.catalogs.len(), 1);

        for _ in 0..50 {
            if !store.is_empty().await {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(store.len().await, 1);

        let served = catalogs
            .page("u1", "list-1", 0, &FilterOverrides::default())
            .await
            .unwrap();
        assert!(served.from_cache);
        assert!(served.metas().is_empty());
    }
}
