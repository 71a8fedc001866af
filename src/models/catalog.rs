use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::MediaKind;

/// One catalog entry in the client protocol's meta shape
///
/// Entries are created by the meta normalizer and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: MediaKind,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imdb_rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_info: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub released: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub genres: Vec<String>,
}

impl CatalogEntry {
    /// Release year parsed from the leading digits of `release_info`
    pub fn year(&self) -> Option<i32> {
        let info = self.release_info.as_deref()?;
        let digits: String = info.chars().take_while(|c| c.is_ascii_digit()).collect();
        if digits.len() == 4 {
            digits.parse().ok()
        } else {
            None
        }
    }

    /// Release date, or `None` when absent or unparsable
    pub fn release_date(&self) -> Option<NaiveDate> {
        parse_release_date(self.released.as_deref()?)
    }
}

/// Accepts `YYYY-MM-DD`, RFC 3339 timestamps and `YYYY-MM-DDThh:mm:ss` prefixes
pub fn parse_release_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.date_naive());
    }
    raw.get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
}

/// A synthesized page as held in the cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedPage {
    pub metas: Vec<CatalogEntry>,
    pub cached_at: DateTime<Utc>,
}

/// Catalog page document returned to the client
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogResponse {
    pub metas: Vec<CatalogEntry>,
}

/// Raw item as returned by the upstream list service
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawListItem {
    #[serde(default, alias = "imdbid", alias = "imdb")]
    pub imdb_id: Option<String>,
    #[serde(default, alias = "name")]
    pub title: Option<String>,
    #[serde(default, alias = "overview")]
    pub description: Option<String>,
    #[serde(default, alias = "imdbrating", alias = "imdb_rating", alias = "score")]
    pub rating: Option<f64>,
    #[serde(default, alias = "year")]
    pub release_year: Option<i32>,
    #[serde(default, alias = "release_date")]
    pub released: Option<String>,
    #[serde(default)]
    pub runtime: Option<u32>,
    #[serde(default, alias = "genre", deserialize_with = "deserialize_genres")]
    pub genres: Vec<String>,
    #[serde(default)]
    pub poster: Option<String>,
}

/// Upstream genre fields arrive as null, a comma separated string or an array
fn deserialize_genres<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum GenreField {
        Text(String),
        List(Vec<Option<String>>),
    }

    Ok(match Option::<GenreField>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(GenreField::Text(text)) => text
            .split(',')
            .map(str::trim)
            .filter(|g| !g.is_empty())
            .map(str::to_string)
            .collect(),
        Some(GenreField::List(items)) => items.into_iter().flatten().collect(),
    })
}
