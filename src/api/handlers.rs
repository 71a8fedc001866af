use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::error::{AppError, AppResult};
use crate::models::{CatalogResponse, ListConfig, UserSettings};
use crate::services::filter::FilterOverrides;
use crate::services::manifest::Manifest;
use crate::services::revision::version_string;
use crate::services::user_config::MutationOutcome;

use super::AppState;

/// Offset and filter overrides carried by a catalog request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogParams {
    pub offset: usize,
    pub overrides: FilterOverrides,
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_number<T: std::str::FromStr>(value: &str) -> Option<T> {
    value.trim().parse().ok()
}

impl CatalogParams {
    /// Applies one request parameter; unknown keys and unparsable values are ignored
    fn apply(&mut self, key: &str, value: &str) {
        let overrides = &mut self.overrides;
        match key {
            "skip" => {
                if let Some(offset) = parse_number(value) {
                    self.offset = offset;
                }
            }
            "sort" => overrides.sort = value.parse().ok().or(overrides.sort),
            "order" => overrides.order = value.parse().ok().or(overrides.order),
            "genre" => {
                if !value.trim().is_empty() {
                    overrides.genre = Some(value.to_string());
                }
            }
            "yearMin" => overrides.year_min = parse_number(value).or(overrides.year_min),
            "yearMax" => overrides.year_max = parse_number(value).or(overrides.year_max),
            "ratingMin" => {
                overrides.rating_min = parse_number::<f64>(value)
                    .filter(|r| r.is_finite())
                    .or(overrides.rating_min)
            }
            "ratingMax" => {
                overrides.rating_max = parse_number::<f64>(value)
                    .filter(|r| r.is_finite())
                    .or(overrides.rating_max)
            }
            "hideUnreleased" => {
                overrides.hide_unreleased = parse_flag(value).or(overrides.hide_unreleased)
            }
            _ => {}
        }
    }

    /// Parses the query string map and the optional `key=value&...json` path segment
    ///
    /// Values from the path segment win over the query string.
    pub fn parse(query: &HashMap<String, String>, extra: Option<&str>) -> Self {
        let mut params = Self::default();

        for (key, value) in query {
            params.apply(key, value);
        }

        if let Some(extra) = extra {
            let extra = extra.strip_suffix(".json").unwrap_or(extra);
            for pair in extra.split('&').filter(|pair| !pair.is_empty()) {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                params.apply(key, value);
            }
        }

        params
    }
}

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

fn path_param<'a>(path: &'a HashMap<String, String>, name: &str) -> AppResult<&'a str> {
    path.get(name)
        .map(String::as_str)
        .ok_or_else(|| AppError::Internal(format!("route is missing '{}'", name)))
}

/// Serves the per-user manifest; the optional token segment is ignored
pub async fn manifest(
    State(state): State<AppState>,
    Path(path): Path<HashMap<String, String>>,
) -> AppResult<Json<Manifest>> {
    let user_id = path_param(&path, "user_id")?;
    let manifest = state.manifests.build(user_id).await?;
    Ok(Json(manifest))
}

/// Serves one catalog page
///
/// Never fails: anything that prevents building a page yields empty `metas`.
pub async fn catalog(
    State(state): State<AppState>,
    Path(path): Path<HashMap<String, String>>,
    Query(query): Query<HashMap<String, String>>,
) -> Json<CatalogResponse> {
    let (Some(user_id), Some(catalog_id)) = (path.get("user_id"), path.get("catalog_id")) else {
        return Json(CatalogResponse { metas: Vec::new() });
    };
    let catalog_id = catalog_id.strip_suffix(".json").unwrap_or(catalog_id);
    let params = CatalogParams::parse(&query, path.get("extra").map(String::as_str));

    tracing::debug!(
        user_id = %user_id,
        catalog_id = %catalog_id,
        offset = params.offset,
        "Catalog request"
    );

    let metas = state
        .catalogs
        .page(user_id, catalog_id, params.offset, &params.overrides)
        .await
        .map(|served| served.page.metas)
        .unwrap_or_default();

    Json(CatalogResponse { metas })
}

/// Result of a configuration write
#[derive(Debug, Serialize)]
pub struct MutationResponse {
    pub changed: bool,
    pub revision: u64,
    pub version: String,
}

impl From<MutationOutcome> for MutationResponse {
    fn from(outcome: MutationOutcome) -> Self {
        Self {
            changed: outcome.changed,
            revision: outcome.revision,
            version: version_string(outcome.revision),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RevisionResponse {
    pub revision: u64,
    pub version: String,
}

pub async fn get_lists(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<Vec<ListConfig>>> {
    Ok(Json(state.users.lists(&user_id).await?))
}

pub async fn put_lists(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(lists): Json<Vec<ListConfig>>,
) -> AppResult<Json<MutationResponse>> {
    let outcome = state.users.save_lists(&user_id, lists).await?;
    Ok(Json(outcome.into()))
}

pub async fn delete_list(
    State(state): State<AppState>,
    Path((user_id, list_id)): Path<(String, String)>,
) -> AppResult<Json<MutationResponse>> {
    let outcome = state.users.delete_list(&user_id, &list_id).await?;
    Ok(Json(outcome.into()))
}

pub async fn get_settings(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<UserSettings>> {
    Ok(Json(state.users.settings(&user_id).await?))
}

pub async fn put_settings(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(settings): Json<UserSettings>,
) -> AppResult<Json<MutationResponse>> {
    let outcome = state.users.update_settings(&user_id, settings).await?;
    Ok(Json(outcome.into()))
}

pub async fn get_revision(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<RevisionResponse>> {
    let revision = state.users.revision(&user_id).await?;
    Ok(Json(RevisionResponse {
        revision,
        version: version_string(revision),
    }))
}
