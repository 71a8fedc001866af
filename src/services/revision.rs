use std::sync::Arc;

use crate::db::ConfigRepository;
use crate::error::AppResult;

/// Fixed leading components of the manifest version string
pub const VERSION_PREFIX: &str = "1.0";

/// Parses a stored revision.
///
/// Current records hold a bare integer. Older records held a full dotted
/// version such as `1.0.7` or `v1.0.7`; the last component is taken.
pub fn parse_revision(raw: &str) -> Option<u64> {
    let trimmed = raw.trim().trim_start_matches(['v', 'V']);
    if trimmed.is_empty() {
        return None;
    }

    let last = trimmed.rsplit('.').next()?;
    last.parse::<u64>().ok().map(|rev| rev.max(1))
}

/// Renders the client-visible version for a revision
pub fn version_string(revision: u64) -> String {
    format!("{}.{}", VERSION_PREFIX, revision)
}

/// Per-user monotonic manifest revision
///
/// Bumped once per accepted configuration mutation so clients notice the
/// manifest changed. Never decremented or reset.
#[derive(Clone)]
pub struct RevisionTracker {
    repo: Arc<dyn ConfigRepository>,
}

impl RevisionTracker {
    pub fn new(repo: Arc<dyn ConfigRepository>) -> Self {
        Self { repo }
    }

    /// Current revision, starting at 1
    ///
    /// A missing or legacy-format record is rewritten in the current format,
    /// unless another writer replaced it in the meantime.
    pub async fn read(&self, user_id: &str) -> AppResult<u64> {
        let stored = self.repo.get_manifest_version(user_id).await?;
        let revision = stored.as_deref().and_then(parse_revision).unwrap_or(1);

        let canonical = revision.to_string();
        if stored.as_deref() != Some(canonical.as_str()) {
            match self
                .repo
                .replace_manifest_version(user_id, stored.as_deref(), &canonical)
                .await
            {
                Ok(true) => {}
                Ok(false) => tracing::debug!(
                    user_id = %user_id,
                    "Manifest revision changed during migration, keeping the newer value"
                ),
                Err(e) => tracing::warn!(
                    error = %e,
                    user_id = %user_id,
                    stored = ?stored,
                    "Could not persist migrated manifest revision"
                ),
            }
        }

        Ok(revision)
    }

    /// Increments and persists the revision, returning the new value
    pub async fn bump(&self, user_id: &str) -> AppResult<u64> {
        let next = self.repo.bump_manifest_version(user_id).await?;

        tracing::info!(user_id = %user_id, revision = next, "Manifest revision bumped");
        Ok(next)
    }

    /// Version string for the user's current revision
    pub async fn version(&self, user_id: &str) -> AppResult<String> {
        Ok(version_string(self.read(user_id).await?))
    }
}
