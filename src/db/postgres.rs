use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::db::ConfigRepository;
use crate::error::{AppError, AppResult};
use crate::models::{ListConfig, ListFilterDefaults, SortField, SortOrder, UserSettings};
use crate::services::revision::parse_revision;

/// Creates a PostgreSQL connection pool
///
/// Establishes a pool of database connections for efficient reuse.
/// The pool automatically manages connection lifecycle and limits.
pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// Applies the embedded migrations under `migrations/`
pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[derive(Debug, sqlx::FromRow)]
struct ListRow {
    user_id: String,
    id: String,
    name: String,
    source: String,
    kind: String,
    sort_field: Option<String>,
    sort_order: Option<String>,
    enabled: bool,
    display_order: i32,
    genre: Option<String>,
    year_min: Option<i32>,
    year_max: Option<i32>,
    rating_min: Option<f64>,
    rating_max: Option<f64>,
    hide_unreleased: Option<bool>,
}

/// Stored enum text that no longer parses is dropped rather than failing the read
fn parse_stored<T: std::str::FromStr<Err = String>>(raw: Option<String>, column: &str) -> Option<T> {
    let raw = raw?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(column = column, value = %raw, error = %e, "Ignoring unparsable stored value");
            None
        }
    }
}

impl TryFrom<ListRow> for ListConfig {
    type Error = AppError;

    fn try_from(row: ListRow) -> Result<Self, Self::Error> {
        let kind = row
            .kind
            .parse()
            .map_err(|e| AppError::Internal(format!("list {}: {}", row.id, e)))?;

        Ok(ListConfig {
            sort: parse_stored::<SortField>(row.sort_field, "sort_field"),
            order: parse_stored::<SortOrder>(row.sort_order, "sort_order"),
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            source: row.source,
            kind,
            enabled: row.enabled,
            display_order: row.display_order,
            filters: ListFilterDefaults {
                genre: row.genre,
                year_min: row.year_min,
                year_max: row.year_max,
                rating_min: row.rating_min,
                rating_max: row.rating_max,
                hide_unreleased: row.hide_unreleased,
            },
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SettingsRow {
    addon_name: Option<String>,
    catalog_prefix: Option<String>,
    hide_unreleased_all: bool,
    default_sort: Option<String>,
    default_order: Option<String>,
}

impl From<SettingsRow> for UserSettings {
    fn from(row: SettingsRow) -> Self {
        UserSettings {
            addon_name: row.addon_name,
            catalog_prefix: row.catalog_prefix,
            hide_unreleased_all: row.hide_unreleased_all,
            default_sort: parse_stored(row.default_sort, "default_sort"),
            default_order: parse_stored(row.default_order, "default_order"),
        }
    }
}

/// Postgres-backed configuration repository
#[derive(Clone)]
pub struct PgConfigRepository {
    pool: PgPool,
}

impl PgConfigRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ConfigRepository for PgConfigRepository {
    async fn get_lists(&self, user_id: &str) -> AppResult<Vec<ListConfig>> {
        let rows: Vec<ListRow> = sqlx::query_as(
            r#"
            SELECT user_id, id, name, source, kind, sort_field, sort_order, enabled,
                   display_order, genre, year_min, year_max, rating_min, rating_max,
                   hide_unreleased
            FROM user_lists
            WHERE user_id = $1
            ORDER BY display_order, name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ListConfig::try_from).collect()
    }

    async fn save_lists(&self, user_id: &str, lists: &[ListConfig]) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM user_lists WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        for list in lists {
            sqlx::query(
                r#"
                INSERT INTO user_lists (
                    user_id, id, name, source, kind, sort_field, sort_order, enabled,
                    display_order, genre, year_min, year_max, rating_min, rating_max,
                    hide_unreleased
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
                "#,
            )
            .bind(user_id)
            .bind(&list.id)
            .bind(&list.name)
            .bind(&list.source)
            .bind(list.kind.as_str())
            .bind(list.sort.map(|s| s.as_str()))
            .bind(list.order.map(|o| o.as_str()))
            .bind(list.enabled)
            .bind(list.display_order)
            .bind(&list.filters.genre)
            .bind(list.filters.year_min)
            .bind(list.filters.year_max)
            .bind(list.filters.rating_min)
            .bind(list.filters.rating_max)
            .bind(list.filters.hide_unreleased)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_settings(&self, user_id: &str) -> AppResult<UserSettings> {
        let row: Option<SettingsRow> = sqlx::query_as(
            r#"
            SELECT addon_name, catalog_prefix, hide_unreleased_all, default_sort, default_order
            FROM user_settings
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(UserSettings::from).unwrap_or_default())
    }

    async fn save_settings(&self, user_id: &str, settings: &UserSettings) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO user_settings (
                user_id, addon_name, catalog_prefix, hide_unreleased_all, default_sort, default_order
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id) DO UPDATE SET
                addon_name = EXCLUDED.addon_name,
                catalog_prefix = EXCLUDED.catalog_prefix,
                hide_unreleased_all = EXCLUDED.hide_unreleased_all,
                default_sort = EXCLUDED.default_sort,
                default_order = EXCLUDED.default_order,
                updated_at = now()
            "#,
        )
        .bind(user_id)
        .bind(&settings.addon_name)
        .bind(&settings.catalog_prefix)
        .bind(settings.hide_unreleased_all)
        .bind(settings.default_sort.map(|s| s.as_str()))
        .bind(settings.default_order.map(|o| o.as_str()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_manifest_version(&self, user_id: &str) -> AppResult<Option<String>> {
        let version: Option<Option<String>> =
            sqlx::query_scalar("SELECT manifest_version FROM user_settings WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(version.flatten())
    }

    async fn replace_manifest_version(
        &self,
        user_id: &str,
        expected: Option<&str>,
        version: &str,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO user_settings (user_id, manifest_version)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE SET
                manifest_version = EXCLUDED.manifest_version,
                updated_at = now()
            WHERE user_settings.manifest_version IS NOT DISTINCT FROM $3
            "#,
        )
        .bind(user_id)
        .bind(version)
        .bind(expected)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn bump_manifest_version(&self, user_id: &str) -> AppResult<u64> {
        let mut tx = self.pool.begin().await?;

        // the row must exist for FOR UPDATE to serialize concurrent bumps
        sqlx::query("INSERT INTO user_settings (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let stored: Option<String> = sqlx::query_scalar(
            "SELECT manifest_version FROM user_settings WHERE user_id = $1 FOR UPDATE",
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        let next = stored.as_deref().and_then(parse_revision).unwrap_or(1) + 1;

        sqlx::query(
            "UPDATE user_settings SET manifest_version = $2, updated_at = now() WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(next.to_string())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(next)
    }
}
