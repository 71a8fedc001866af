use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{CatalogEntry, MediaKind, RawListItem};
use crate::services::genre;

static IMDB_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^tt\d+$").expect("valid regex"));

/// Returns the lower-cased `tt` identifier when the raw value is one
pub fn canonical_id(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    IMDB_ID
        .is_match(trimmed)
        .then(|| trimmed.to_ascii_lowercase())
}

fn round_rating(rating: f64) -> Option<f64> {
    rating.is_finite().then(|| (rating * 10.0).round() / 10.0)
}

/// Converts one upstream list item into a catalog entry.
///
/// Items without a valid `tt` identifier are dropped.
pub fn normalize(item: RawListItem, kind: MediaKind) -> Option<CatalogEntry> {
    let id = item.imdb_id.as_deref().and_then(canonical_id)?;

    let release_info = item
        .release_year
        .map(|year| year.to_string())
        .or_else(|| {
            item.released
                .as_deref()
                .and_then(|raw| raw.get(..4))
                .filter(|prefix| prefix.chars().all(|c| c.is_ascii_digit()))
                .map(str::to_string)
        });

    let name = item
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| id.clone());

    Some(CatalogEntry {
        name,
        kind,
        poster: item.poster.filter(|p| !p.trim().is_empty()),
        description: item.description.filter(|d| !d.trim().is_empty()),
        imdb_rating: item.rating.and_then(round_rating),
        release_info,
        released: item.released.filter(|r| !r.trim().is_empty()),
        runtime: item.runtime.filter(|minutes| *minutes > 0),
        genres: genre::canonicalize_all(&item.genres),
        id,
    })
}

/// Normalizes a whole upstream page, preserving order.
pub fn normalize_page(items: Vec<RawListItem>, kind: MediaKind) -> Vec<CatalogEntry> {
    let total = items.len();
    let entries: Vec<CatalogEntry> = items
        .into_iter()
        .filter_map(|item| normalize(item, kind))
        .collect();

    if entries.len() < total {
        tracing::debug!(
            dropped = total - entries.len(),
            kept = entries.len(),
            "Dropped upstream items without a valid identifier"
        );
    }

    entries
}
