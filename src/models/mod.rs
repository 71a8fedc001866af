mod catalog;
mod list;

pub use catalog::{
    parse_release_date, CachedPage, CatalogEntry, CatalogResponse, RawListItem,
};
pub use list::{ListConfig, ListFilterDefaults, MediaKind, SortField, SortOrder, UserSettings};
