use std::collections::HashSet;
use std::sync::Arc;

use crate::db::ConfigRepository;
use crate::error::{AppError, AppResult};
use crate::models::{ListConfig, UserSettings};
use crate::services::catalog::CatalogService;
use crate::services::revision::RevisionTracker;

/// Outcome of a configuration write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationOutcome {
    /// Whether the write changed anything
    pub changed: bool,
    /// Manifest revision after the write
    pub revision: u64,
}

/// Reads and writes user configuration
///
/// Every accepted mutation bumps the manifest revision once and purges the
/// user's cached catalog pages.
#[derive(Clone)]
pub struct UserConfigService {
    repo: Arc<dyn ConfigRepository>,
    revisions: RevisionTracker,
    catalogs: CatalogService,
}

fn validate_lists(lists: &[ListConfig]) -> AppResult<()> {
    let mut seen = HashSet::new();

    for list in lists {
        if list.id.is_empty() {
            return Err(AppError::InvalidInput("List id cannot be empty".to_string()));
        }
        if !seen.insert(list.id.as_str()) {
            return Err(AppError::InvalidInput(format!("Duplicate list id '{}'", list.id)));
        }
        if list.name.trim().is_empty() {
            return Err(AppError::InvalidInput(format!("List '{}' needs a name", list.id)));
        }
        if list.source.trim().is_empty() {
            return Err(AppError::InvalidInput(format!("List '{}' needs a source", list.id)));
        }

        let ratings = [list.filters.rating_min, list.filters.rating_max];
        if ratings.iter().flatten().any(|r| !r.is_finite()) {
            return Err(AppError::InvalidInput(format!(
                "List '{}' has a non-numeric rating bound",
                list.id
            )));
        }
    }

    Ok(())
}

impl UserConfigService {
    pub fn new(
        repo: Arc<dyn ConfigRepository>,
        revisions: RevisionTracker,
        catalogs: CatalogService,
    ) -> Self {
        Self {
            repo,
            revisions,
            catalogs,
        }
    }

    /// Purges before bumping so a failed bump still drops stale pages
    async fn after_mutation(&self, user_id: &str) -> AppResult<u64> {
        self.catalogs.purge(user_id).await;
        self.revisions.bump(user_id).await
    }

    pub async fn lists(&self, user_id: &str) -> AppResult<Vec<ListConfig>> {
        self.repo.get_lists(user_id).await
    }

    /// Replaces all of the user's lists
    pub async fn save_lists(&self, user_id: &str, lists: Vec<ListConfig>) -> AppResult<MutationOutcome> {
        let lists: Vec<ListConfig> = lists
            .into_iter()
            .map(|mut list| {
                list.id = list.id.trim().to_string();
                list.user_id = user_id.to_string();
                list
            })
            .collect();
        validate_lists(&lists)?;

        self.repo.save_lists(user_id, &lists).await?;
        let revision = self.after_mutation(user_id).await?;

        tracing::info!(user_id = %user_id, lists = lists.len(), revision = revision, "Lists saved");
        Ok(MutationOutcome {
            changed: true,
            revision,
        })
    }

    /// Removes one list; unknown ids are `NotFound` and change nothing
    pub async fn delete_list(&self, user_id: &str, list_id: &str) -> AppResult<MutationOutcome> {
        let mut lists = self.repo.get_lists(user_id).await?;
        let before = lists.len();
        lists.retain(|list| list.id != list_id);

        if lists.len() == before {
            return Err(AppError::NotFound(format!("List '{}'", list_id)));
        }

        self.repo.save_lists(user_id, &lists).await?;
        let revision = self.after_mutation(user_id).await?;

        tracing::info!(user_id = %user_id, list_id = %list_id, revision = revision, "List deleted");
        Ok(MutationOutcome {
            changed: true,
            revision,
        })
    }

    pub async fn settings(&self, user_id: &str) -> AppResult<UserSettings> {
        self.repo.get_settings(user_id).await
    }

    /// Stores settings; identical settings are not a mutation
    pub async fn update_settings(
        &self,
        user_id: &str,
        settings: UserSettings,
    ) -> AppResult<MutationOutcome> {
        let current = self.repo.get_settings(user_id).await?;
        if current == settings {
            return Ok(MutationOutcome {
                changed: false,
                revision: self.revisions.read(user_id).await?,
            });
        }

        self.repo.save_settings(user_id, &settings).await?;
        let revision = self.after_mutation(user_id).await?;

        tracing::info!(user_id = %user_id, revision = revision, "Settings updated");
        Ok(MutationOutcome {
            changed: true,
            revision,
        })
    }

    pub async fn revision(&self, user_id: &str) -> AppResult<u64> {
        self.revisions.read(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{InMemoryConfigRepository, MemoryPageStore, PageStore, ScriptedRepository};
    use crate::models::{ListFilterDefaults, MediaKind};
    use crate::services::cache_gateway::CacheGateway;
    use crate::services::pagination::PaginationSynthesizer;
    use crate::services::providers::MockUpstreamListSource;

    fn list(id: &str) -> ListConfig {
        ListConfig {
            id: id.to_string(),
            user_id: String::new(),
            name: format!("List {}", id),
            source: "alice/picks".to_string(),
            kind: MediaKind::Movie,
            sort: None,
            order: None,
            enabled: true,
            display_order: 0,
            filters: ListFilterDefaults::default(),
        }
    }

    fn service() -> (UserConfigService, Arc<MemoryPageStore>) {
        service_with(Arc::new(InMemoryConfigRepository::new()))
    }

    fn service_with(repo: Arc<dyn ConfigRepository>) -> (UserConfigService, Arc<MemoryPageStore>) {
        let store = Arc::new(MemoryPageStore::new());
        let mut mock = MockUpstreamListSource::new();
        mock.expect_name().return_const("mock");
        let gateway = CacheGateway::new(
            store.clone(),
            PaginationSynthesizer::new(Arc::new(mock)),
            600,
        );
        let catalogs = CatalogService::new(repo.clone(), gateway);
        let revisions = RevisionTracker::new(repo.clone());
        (UserConfigService::new(repo, revisions, catalogs), store)
    }

    #[tokio::test]
    async fn test_save_bumps_and_purges() {
        let (service, store) = service();
        store
            .set("catalog:u1:list-1:0:s=rank", "[]".to_string(), 600)
            .await
            .unwrap();
        store
            .set("catalog:u2:list-1:0:s=rank", "[]".to_string(), 600)
            .await
            .unwrap();

        let outcome = service.save_lists("u1", vec![list("1")]).await.unwrap();
        assert_eq!(outcome.revision, 2);
        assert_eq!(store.len().await, 1);

        let saved = service.lists("u1").await.unwrap();
        assert_eq!(saved[0].user_id, "u1");
    }

    #[tokio::test]
    async fn test_duplicate_ids_rejected_without_bump() {
        let (service, _) = service();
        service.save_lists("u1", vec![list("1"), list("2")]).await.unwrap();

        let result = service.save_lists("u1", vec![list("1"), list(" 1")]).await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
        assert_eq!(service.revision("u1").await.unwrap(), 2);
        assert_eq!(service.lists("u1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_unknown_list_is_not_found() {
        let (service, _) = service();
        service.save_lists("u1", vec![list("1")]).await.unwrap();

        let result = service.delete_list("u1", "9").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert_eq!(service.revision("u1").await.unwrap(), 2);

        let outcome = service.delete_list("u1", "1").await.unwrap();
        assert_eq!(outcome.revision, 3);
        assert!(service.lists("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_identical_settings_are_not_a_mutation() {
        let (service, _) = service();
        let outcome = service
            .update_settings("u1", UserSettings::default())
            .await
            .unwrap();
        assert!(!outcome.changed);
        assert_eq!(outcome.revision, 1);

        let settings = UserSettings {
            hide_unreleased_all: true,
            ..UserSettings::default()
        };
        let outcome = service.update_settings("u1", settings.clone()).await.unwrap();
        assert!(outcome.changed);
        assert_eq!(outcome.revision, 2);

        let outcome = service.update_settings("u1", settings).await.unwrap();
        assert!(!outcome.changed);
        assert_eq!(outcome.revision, 2);
    }

    #[tokio::test]
    async fn test_failed_bump_still_purges() {
        let (service, store) = service_with(Arc::new(ScriptedRepository {
            fail_bumps: true,
            ..ScriptedRepository::default()
        }));
        store
            .set("catalog:u1:list-1:0:s=rank", "[]".to_string(), 600)
            .await
            .unwrap();

        let result = service.save_lists("u1", vec![list("1")]).await;
        assert!(matches!(result, Err(AppError::Internal(_))));
        assert!(store.is_empty().await);
    }
}
