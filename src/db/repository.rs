use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::error::AppResult;
use crate::models::{ListConfig, UserSettings};
use crate::services::revision::parse_revision;

/// Storage of user list configuration, settings and manifest revisions
#[async_trait::async_trait]
pub trait ConfigRepository: Send + Sync {
    async fn get_lists(&self, user_id: &str) -> AppResult<Vec<ListConfig>>;

    /// Replaces every list of the user
    async fn save_lists(&self, user_id: &str, lists: &[ListConfig]) -> AppResult<()>;

    /// Settings of the user, defaults when never saved
    async fn get_settings(&self, user_id: &str) -> AppResult<UserSettings>;

    async fn save_settings(&self, user_id: &str, settings: &UserSettings) -> AppResult<()>;

    /// Raw stored manifest version, in whatever format it was written
    async fn get_manifest_version(&self, user_id: &str) -> AppResult<Option<String>>;

    /// Stores `version` only if the stored value still equals `expected`
    ///
    /// Returns whether the write happened.
    async fn replace_manifest_version(
        &self,
        user_id: &str,
        expected: Option<&str>,
        version: &str,
    ) -> AppResult<bool>;

    /// Atomically increments the stored revision and returns the new value
    ///
    /// A missing or unparsable record counts as revision 1; legacy dotted
    /// versions count as their last component.
    async fn bump_manifest_version(&self, user_id: &str) -> AppResult<u64>;
}

#[derive(Default)]
struct UserRecord {
    lists: Vec<ListConfig>,
    settings: UserSettings,
    manifest_version: Option<String>,
}

/// Process-local repository for tests and development runs
#[derive(Default)]
pub struct InMemoryConfigRepository {
    users: RwLock<HashMap<String, UserRecord>>,
}

impl InMemoryConfigRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ConfigRepository for InMemoryConfigRepository {
    async fn get_lists(&self, user_id: &str) -> AppResult<Vec<ListConfig>> {
        let users = self.users.read().await;
        Ok(users
            .get(user_id)
            .map(|record| record.lists.clone())
            .unwrap_or_default())
    }

    async fn save_lists(&self, user_id: &str, lists: &[ListConfig]) -> AppResult<()> {
        let mut users = self.users.write().await;
        users.entry(user_id.to_string()).or_default().lists = lists.to_vec();
        Ok(())
    }

    async fn get_settings(&self, user_id: &str) -> AppResult<UserSettings> {
        let users = self.users.read().await;
        Ok(users
            .get(user_id)
            .map(|record| record.settings.clone())
            .unwrap_or_default())
    }

    async fn save_settings(&self, user_id: &str, settings: &UserSettings) -> AppResult<()> {
        let mut users = self.users.write().await;
        users.entry(user_id.to_string()).or_default().settings = settings.clone();
        Ok(())
    }

    async fn get_manifest_version(&self, user_id: &str) -> AppResult<Option<String>> {
        let users = self.users.read().await;
        Ok(users
            .get(user_id)
            .and_then(|record| record.manifest_version.clone()))
    }

    async fn replace_manifest_version(
        &self,
        user_id: &str,
        expected: Option<&str>,
        version: &str,
    ) -> AppResult<bool> {
        let mut users = self.users.write().await;
        let record = users.entry(user_id.to_string()).or_default();
        if record.manifest_version.as_deref() != expected {
            return Ok(false);
        }
        record.manifest_version = Some(version.to_string());
        Ok(true)
    }

    async fn bump_manifest_version(&self, user_id: &str) -> AppResult<u64> {
        let mut users = self.users.write().await;
        let record = users.entry(user_id.to_string()).or_default();
        let next = record
            .manifest_version
            .as_deref()
            .and_then(parse_revision)
            .unwrap_or(1)
            + 1;
        record.manifest_version = Some(next.to_string());
        Ok(next)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ListFilterDefaults, MediaKind};

    fn list(id: &str) -> ListConfig {
        ListConfig {
            id: id.to_string(),
            user_id: "u1".to_string(),
            name: format!("List {}", id),
            source: "alice/picks".to_string(),
            kind: MediaKind::Series,
            sort: None,
            order: None,
            enabled: true,
            display_order: 0,
            filters: ListFilterDefaults::default(),
        }
    }

    #[tokio::test]
    async fn test_unknown_user_reads_as_empty() {
        let repo = InMemoryConfigRepository::new();
        assert!(repo.get_lists("nobody").await.unwrap().is_empty());
        assert_eq!(repo.get_settings("nobody").await.unwrap(), UserSettings::default());
        assert_eq!(repo.get_manifest_version("nobody").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_save_lists_replaces() {
        let repo = InMemoryConfigRepository::new();
        repo.save_lists("u1", &[list("1"), list("2")]).await.unwrap();
        repo.save_lists("u1", &[list("3")]).await.unwrap();

        let ids: Vec<String> = repo
            .get_lists("u1")
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.id)
            .collect();
        assert_eq!(ids, vec!["3"]);
        assert!(repo.get_lists("u2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_replace_manifest_version_compares_first() {
        let repo = InMemoryConfigRepository::new();
        assert!(repo.replace_manifest_version("u1", None, "4").await.unwrap());
        assert!(!repo.replace_manifest_version("u1", None, "9").await.unwrap());
        assert!(repo.replace_manifest_version("u1", Some("4"), "5").await.unwrap());
        assert_eq!(repo.get_manifest_version("u1").await.unwrap(), Some("5".to_string()));
    }

    #[tokio::test]
    async fn test_bump_manifest_version() {
        let repo = InMemoryConfigRepository::new();
        assert_eq!(repo.bump_manifest_version("u1").await.unwrap(), 2);
        assert_eq!(repo.bump_manifest_version("u1").await.unwrap(), 3);

        repo.replace_manifest_version("u2", None, "v1.0.7").await.unwrap();
        assert_eq!(repo.bump_manifest_version("u2").await.unwrap(), 8);
        assert_eq!(repo.get_manifest_version("u2").await.unwrap(), Some("8".to_string()));
    }
}
