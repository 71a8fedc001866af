use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};

/// Media kind of a list and of every entry it produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Movie,
    Series,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Movie => "movie",
            MediaKind::Series => "series",
        }
    }
}

impl Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "movie" | "movies" => Ok(MediaKind::Movie),
            "series" | "show" | "shows" | "tv" => Ok(MediaKind::Series),
            other => Err(format!("unknown media kind '{}'", other)),
        }
    }
}

/// Field a catalog page can be sorted by
///
/// `Rank` keeps the upstream list order and is the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    #[default]
    Rank,
    Title,
    Year,
    Released,
    Rating,
    Runtime,
}

impl SortField {
    pub const ALL: [SortField; 6] = [
        SortField::Rank,
        SortField::Title,
        SortField::Year,
        SortField::Released,
        SortField::Rating,
        SortField::Runtime,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::Rank => "rank",
            SortField::Title => "title",
            SortField::Year => "year",
            SortField::Released => "released",
            SortField::Rating => "rating",
            SortField::Runtime => "runtime",
        }
    }
}

impl FromStr for SortField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rank" | "default" | "list" => Ok(SortField::Rank),
            "title" | "name" => Ok(SortField::Title),
            "year" | "release_year" => Ok(SortField::Year),
            "released" | "release_date" | "releasedate" => Ok(SortField::Released),
            "rating" | "imdbrating" | "imdb_rating" | "score" => Ok(SortField::Rating),
            "runtime" | "length" => Ok(SortField::Runtime),
            other => Err(format!("unknown sort field '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub const ALL: [SortOrder; 2] = [SortOrder::Asc, SortOrder::Desc];

    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortOrder::Asc),
            "desc" | "descending" => Ok(SortOrder::Desc),
            other => Err(format!("unknown sort order '{}'", other)),
        }
    }
}

/// Per-list filter defaults, each overridable per request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListFilterDefaults {
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub year_min: Option<i32>,
    #[serde(default)]
    pub year_max: Option<i32>,
    #[serde(default)]
    pub rating_min: Option<f64>,
    #[serde(default)]
    pub rating_max: Option<f64>,
    #[serde(default)]
    pub hide_unreleased: Option<bool>,
}

/// A user's externally hosted watch list attached to their catalog feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListConfig {
    pub id: String,
    /// Owning user; overwritten with the path user on save
    #[serde(default)]
    pub user_id: String,
    pub name: String,
    /// List URL or `<owner>/<slug>` reference on the list service
    pub source: String,
    pub kind: MediaKind,
    #[serde(default)]
    pub sort: Option<SortField>,
    #[serde(default)]
    pub order: Option<SortOrder>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub display_order: i32,
    #[serde(default)]
    pub filters: ListFilterDefaults,
}

fn default_enabled() -> bool {
    true
}

impl ListConfig {
    /// Catalog id the manifest advertises for this list
    pub fn catalog_id(&self) -> String {
        format!("list-{}", self.id)
    }
}

/// Per-user naming and global catalog settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserSettings {
    #[serde(default)]
    pub addon_name: Option<String>,
    #[serde(default)]
    pub catalog_prefix: Option<String>,
    #[serde(default)]
    pub hide_unreleased_all: bool,
    #[serde(default)]
    pub default_sort: Option<SortField>,
    #[serde(default)]
    pub default_order: Option<SortOrder>,
}
