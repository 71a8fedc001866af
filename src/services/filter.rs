//! Filter predicate compilation and FilterSpec resolution.

use chrono::NaiveDate;
use std::cmp::Ordering;

use crate::models::{CatalogEntry, ListConfig, SortField, SortOrder, UserSettings};
use crate::services::genre;

/// Compiled genre expression: AND of OR-groups over genre slugs
///
/// `Action, Comedy + Drama` means (Action OR Comedy) AND Drama. Parentheses
/// carry no structure and are dropped. Terms are canonicalized before slugging
/// so `sci-fi` and `Science Fiction` are the same term.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenreFilter {
    groups: Vec<Vec<String>>,
}

impl GenreFilter {
    pub fn compile(expression: &str) -> Self {
        let stripped: String = expression.chars().filter(|c| *c != '(' && *c != ')').collect();

        let mut groups: Vec<Vec<String>> = stripped
            .split('+')
            .map(|group| {
                let mut terms: Vec<String> = group
                    .split(',')
                    .filter_map(genre::canonicalize)
                    .map(|canonical| genre::slug(&canonical))
                    .collect();
                terms.sort();
                terms.dedup();
                terms
            })
            .filter(|terms| !terms.is_empty())
            .collect();
        groups.sort();
        groups.dedup();

        Self { groups }
    }

    /// True when the expression constrains nothing
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Each group must share at least one slug with the item's genres.
    pub fn matches(&self, genres: &[String]) -> bool {
        if self.groups.is_empty() {
            return true;
        }
        let item: Vec<String> = genres.iter().map(|g| genre::slug(g)).collect();
        self.groups
            .iter()
            .all(|group| group.iter().any(|term| item.contains(term)))
    }

    /// Canonical textual form; equal filters render identically
    pub fn canonical_form(&self) -> String {
        self.groups
            .iter()
            .map(|group| group.join(","))
            .collect::<Vec<_>>()
            .join("+")
    }
}

/// Request-level overrides, highest precedence
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterOverrides {
    pub sort: Option<SortField>,
    pub order: Option<SortOrder>,
    pub genre: Option<String>,
    pub year_min: Option<i32>,
    pub year_max: Option<i32>,
    pub rating_min: Option<f64>,
    pub rating_max: Option<f64>,
    pub hide_unreleased: Option<bool>,
}

/// Fully resolved filter and sort specification for one catalog request
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSpec {
    pub sort: SortField,
    pub order: SortOrder,
    pub genre: GenreFilter,
    pub year_min: Option<i32>,
    pub year_max: Option<i32>,
    pub rating_min: Option<f64>,
    pub rating_max: Option<f64>,
    pub hide_unreleased: bool,
}

impl Default for FilterSpec {
    fn default() -> Self {
        Self {
            sort: SortField::default(),
            order: SortOrder::default(),
            genre: GenreFilter::default(),
            year_min: None,
            year_max: None,
            rating_min: None,
            rating_max: None,
            hide_unreleased: false,
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl FilterSpec {
    /// Merges request > list > global for every field.
    pub fn resolve(request: &FilterOverrides, list: &ListConfig, global: &UserSettings) -> Self {
        let defaults = &list.filters;
        let genre = non_blank(&request.genre)
            .or_else(|| non_blank(&defaults.genre))
            .map(GenreFilter::compile)
            .unwrap_or_default();

        Self {
            sort: request
                .sort
                .or(list.sort)
                .or(global.default_sort)
                .unwrap_or_default(),
            order: request
                .order
                .or(list.order)
                .or(global.default_order)
                .unwrap_or_default(),
            genre,
            year_min: request.year_min.or(defaults.year_min),
            year_max: request.year_max.or(defaults.year_max),
            rating_min: request.rating_min.or(defaults.rating_min),
            rating_max: request.rating_max.or(defaults.rating_max),
            hide_unreleased: request
                .hide_unreleased
                .or(defaults.hide_unreleased)
                .unwrap_or(global.hide_unreleased_all),
        }
    }

    /// Any genre, year or rating constraint
    pub fn is_narrowing(&self) -> bool {
        !self.genre.is_empty()
            || self.year_min.is_some()
            || self.year_max.is_some()
            || self.rating_min.is_some()
            || self.rating_max.is_some()
    }

    /// Renders every output-affecting field; absent bounds render empty.
    pub fn cache_fragment(&self) -> String {
        fn slot<T: ToString>(value: Option<T>) -> String {
            value.map(|v| v.to_string()).unwrap_or_default()
        }

        format!(
            "s={};o={};g={};y={}-{};r={}-{};hu={}",
            self.sort.as_str(),
            self.order.as_str(),
            self.genre.canonical_form(),
            slot(self.year_min),
            slot(self.year_max),
            slot(self.rating_min),
            slot(self.rating_max),
            u8::from(self.hide_unreleased),
        )
    }

    fn passes_bounds(&self, entry: &CatalogEntry) -> bool {
        if self.year_min.is_some() || self.year_max.is_some() {
            let Some(year) = entry.year() else {
                return false;
            };
            if self.year_min.is_some_and(|min| year < min) {
                return false;
            }
            if self.year_max.is_some_and(|max| year > max) {
                return false;
            }
        }

        if self.rating_min.is_some() || self.rating_max.is_some() {
            let Some(rating) = entry.imdb_rating else {
                return false;
            };
            if self.rating_min.is_some_and(|min| rating < min) {
                return false;
            }
            if self.rating_max.is_some_and(|max| rating > max) {
                return false;
            }
        }

        true
    }

    fn passes_release(&self, entry: &CatalogEntry, today: NaiveDate) -> bool {
        if !self.hide_unreleased {
            return true;
        }
        // unknown or unparsable dates stay visible
        entry.release_date().map_or(true, |date| date <= today)
    }

    /// Filters one upstream batch.
    ///
    /// The genre predicate is skipped when no entry in the batch carries any
    /// genre data; year and rating bounds always apply.
    pub fn apply(&self, batch: Vec<CatalogEntry>, today: NaiveDate) -> Vec<CatalogEntry> {
        let genre_known = batch.iter().any(|entry| !entry.genres.is_empty());

        batch
            .into_iter()
            .filter(|entry| !genre_known || self.genre.matches(&entry.genres))
            .filter(|entry| self.passes_bounds(entry))
            .filter(|entry| self.passes_release(entry, today))
            .collect()
    }

    /// Stable sort by the requested field; entries missing it go last.
    pub fn sort_entries(&self, entries: &mut [CatalogEntry]) {
        let desc = self.order == SortOrder::Desc;

        fn by_key<K: PartialOrd>(a: Option<K>, b: Option<K>, desc: bool) -> Ordering {
            match (a, b) {
                (Some(a), Some(b)) => {
                    let ord = a.partial_cmp(&b).unwrap_or(Ordering::Equal);
                    if desc {
                        ord.reverse()
                    } else {
                        ord
                    }
                }
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
        }

        match self.sort {
            SortField::Rank => {
                if desc {
                    entries.reverse();
                }
            }
            SortField::Title => entries.sort_by(|a, b| {
                by_key(Some(a.name.to_lowercase()), Some(b.name.to_lowercase()), desc)
            }),
            SortField::Year => entries.sort_by(|a, b| by_key(a.year(), b.year(), desc)),
            SortField::Released => entries.sort_by(|a, b| {
                by_key(
                    a.release_date().or_else(|| year_start(a)),
                    b.release_date().or_else(|| year_start(b)),
                    desc,
                )
            }),
            SortField::Rating => {
                entries.sort_by(|a, b| by_key(a.imdb_rating, b.imdb_rating, desc))
            }
            SortField::Runtime => entries.sort_by(|a, b| by_key(a.runtime, b.runtime, desc)),
        }
    }
}

fn year_start(entry: &CatalogEntry) -> Option<NaiveDate> {
    entry.year().and_then(|y| NaiveDate::from_ymd_opt(y, 1, 1))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{ListFilterDefaults, MediaKind};

    pub(crate) fn meta(id: &str, genres: &[&str]) -> CatalogEntry {
        CatalogEntry {
            id: id.to_string(),
            kind: MediaKind::Movie,
            name: id.to_string(),
            poster: None,
            description: None,
            imdb_rating: None,
            release_info: None,
            released: None,
            runtime: None,
            genres: genres.iter().map(|g| g.to_string()).collect(),
        }
    }

    fn list() -> ListConfig {
        ListConfig {
            id: "1".to_string(),
            user_id: "u1".to_string(),
            name: "Picks".to_string(),
            source: "alice/picks".to_string(),
            kind: MediaKind::Movie,
            sort: None,
            order: None,
            enabled: true,
            display_order: 0,
            filters: ListFilterDefaults::default(),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    #[test]
    fn test_and_groups_require_every_group() {
        let filter = GenreFilter::compile("Action + Comedy");
        assert!(filter.matches(&["Action".to_string(), "Comedy".to_string()]));
        assert!(!filter.matches(&["Action".to_string()]));
        assert!(!filter.matches(&["Comedy".to_string()]));
    }

    #[test]
    fn test_or_terms_within_group() {
        let filter = GenreFilter::compile("Action, Comedy");
        assert!(filter.matches(&["Action".to_string()]));
        assert!(filter.matches(&["Comedy".to_string()]));
        assert!(!filter.matches(&["Drama".to_string()]));
    }

    #[test]
    fn test_terms_are_alias_aware() {
        let filter = GenreFilter::compile("sci-fi + (thriller, horror)");
        assert!(filter.matches(&["Science Fiction".to_string(), "Horror".to_string()]));
        assert!(!filter.matches(&["Science Fiction".to_string()]));
    }

    #[test]
    fn test_single_term_equals_general_form() {
        let bare = GenreFilter::compile("Drama");
        let grouped = GenreFilter::compile("(Drama,) + ");
        assert_eq!(bare, grouped);
        assert!(bare.matches(&["drama".to_string()]));
        assert!(!bare.matches(&["Comedy".to_string()]));
    }

    #[test]
    fn test_empty_expression_matches_everything() {
        let filter = GenreFilter::compile("  + , ()");
        assert!(filter.is_empty());
        assert!(filter.matches(&[]));
    }

    #[test]
    fn test_canonical_form_ignores_term_order() {
        let a = GenreFilter::compile("Comedy, Action + Drama");
        let b = GenreFilter::compile("drama + action,comedy");
        assert_eq!(a.canonical_form(), b.canonical_form());
        assert_eq!(a.canonical_form(), "action,comedy+drama");
    }

    #[test]
    fn test_resolve_precedence() {
        let mut list = list();
        list.sort = Some(SortField::Year);
        list.filters.genre = Some("Drama".to_string());
        list.filters.year_min = Some(1990);
        let global = UserSettings {
            default_sort: Some(SortField::Title),
            default_order: Some(SortOrder::Desc),
            hide_unreleased_all: true,
            ..UserSettings::default()
        };
        let request = FilterOverrides {
            genre: Some("Comedy".to_string()),
            hide_unreleased: Some(false),
            ..FilterOverrides::default()
        };

        let spec = FilterSpec::resolve(&request, &list, &global);
        assert_eq!(spec.sort, SortField::Year);
        assert_eq!(spec.order, SortOrder::Desc);
        assert_eq!(spec.genre, GenreFilter::compile("Comedy"));
        assert_eq!(spec.year_min, Some(1990));
        assert!(!spec.hide_unreleased);
    }

    #[test]
    fn test_blank_genre_override_falls_back() {
        let mut list = list();
        list.filters.genre = Some("Horror".to_string());
        let request = FilterOverrides {
            genre: Some("  ".to_string()),
            ..FilterOverrides::default()
        };

        let spec = FilterSpec::resolve(&request, &list, &UserSettings::default());
        assert_eq!(spec.genre, GenreFilter::compile("Horror"));
    }

    #[test]
    fn test_explicit_defaults_share_cache_fragment() {
        let implicit = FilterSpec::resolve(
            &FilterOverrides::default(),
            &list(),
            &UserSettings::default(),
        );
        let explicit = FilterSpec::resolve(
            &FilterOverrides {
                sort: Some(SortField::Rank),
                order: Some(SortOrder::Asc),
                genre: Some(String::new()),
                hide_unreleased: Some(false),
                ..FilterOverrides::default()
            },
            &list(),
            &UserSettings::default(),
        );
        assert_eq!(implicit.cache_fragment(), explicit.cache_fragment());
    }

    #[test]
    fn test_distinct_specs_have_distinct_fragments() {
        let base = FilterSpec::default();
        let with_min = FilterSpec {
            year_min: Some(2000),
            ..FilterSpec::default()
        };
        let with_max = FilterSpec {
            year_max: Some(2000),
            ..FilterSpec::default()
        };
        let hidden = FilterSpec {
            hide_unreleased: true,
            ..FilterSpec::default()
        };

        let fragments = [
            base.cache_fragment(),
            with_min.cache_fragment(),
            with_max.cache_fragment(),
            hidden.cache_fragment(),
        ];
        for (i, a) in fragments.iter().enumerate() {
            for b in fragments.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_narrowing_detection() {
        assert!(!FilterSpec::default().is_narrowing());
        let sorted = FilterSpec {
            sort: SortField::Year,
            hide_unreleased: true,
            ..FilterSpec::default()
        };
        assert!(!sorted.is_narrowing());
        let rated = FilterSpec {
            rating_min: Some(7.0),
            ..FilterSpec::default()
        };
        assert!(rated.is_narrowing());
    }

    #[test]
    fn test_genre_guard_when_batch_has_no_genres() {
        let spec = FilterSpec {
            genre: GenreFilter::compile("Action"),
            ..FilterSpec::default()
        };
        let bare = vec![meta("tt1", &[]), meta("tt2", &[])];
        assert_eq!(spec.apply(bare, today()).len(), 2);

        let mixed = vec![meta("tt1", &[]), meta("tt2", &["Action"])];
        let kept = spec.apply(mixed, today());
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, "tt2");
    }

    #[test]
    fn test_year_and_rating_bounds_are_strict_on_missing_values() {
        let spec = FilterSpec {
            year_min: Some(2000),
            rating_min: Some(7.0),
            ..FilterSpec::default()
        };

        let mut good = meta("tt1", &[]);
        good.release_info = Some("2010".to_string());
        good.imdb_rating = Some(7.5);
        let mut no_year = meta("tt2", &[]);
        no_year.imdb_rating = Some(9.0);
        let mut old = meta("tt3", &[]);
        old.release_info = Some("1995".to_string());
        old.imdb_rating = Some(8.0);
        let mut no_rating = meta("tt4", &[]);
        no_rating.release_info = Some("2015".to_string());

        let kept = spec.apply(vec![good, no_year, old, no_rating], today());
        let ids: Vec<&str> = kept.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["tt1"]);
    }

    #[test]
    fn test_hide_unreleased_fails_open() {
        let spec = FilterSpec {
            hide_unreleased: true,
            ..FilterSpec::default()
        };
        let mut future = meta("tt1", &[]);
        future.released = Some("2030-01-01".to_string());
        let mut past = meta("tt2", &[]);
        past.released = Some("2001-09-14".to_string());
        let mut garbled = meta("tt3", &[]);
        garbled.released = Some("coming soon".to_string());
        let undated = meta("tt4", &[]);

        let kept = spec.apply(vec![future, past, garbled, undated], today());
        let ids: Vec<&str> = kept.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["tt2", "tt3", "tt4"]);
    }

    #[test]
    fn test_sort_missing_values_last_both_directions() {
        let mut a = meta("tt1", &[]);
        a.imdb_rating = Some(6.0);
        let b = meta("tt2", &[]);
        let mut c = meta("tt3", &[]);
        c.imdb_rating = Some(8.0);

        let mut spec = FilterSpec {
            sort: SortField::Rating,
            order: SortOrder::Desc,
            ..FilterSpec::default()
        };
        let mut entries = vec![a.clone(), b.clone(), c.clone()];
        spec.sort_entries(&mut entries);
        let ids: Vec<&str> = entries.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["tt3", "tt1", "tt2"]);

        spec.order = SortOrder::Asc;
        let mut entries = vec![b, c, a];
        spec.sort_entries(&mut entries);
        let ids: Vec<&str> = entries.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["tt1", "tt3", "tt2"]);
    }

    #[test]
    fn test_rank_desc_reverses() {
        let spec = FilterSpec {
            order: SortOrder::Desc,
            ..FilterSpec::default()
        };
        let mut entries = vec![meta("tt1", &[]), meta("tt2", &[]), meta("tt3", &[])];
        spec.sort_entries(&mut entries);
        let ids: Vec<&str> = entries.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["tt3", "tt2", "tt1"]);
    }
}
