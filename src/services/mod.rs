pub mod cache_gateway;
pub mod catalog;
pub mod filter;
pub mod genre;
pub mod manifest;
pub mod meta;
pub mod pagination;
pub mod providers;
pub mod revision;
pub mod user_config;

pub use cache_gateway::CacheGateway;
pub use catalog::CatalogService;
pub use manifest::ManifestBuilder;
pub use pagination::PaginationSynthesizer;
pub use revision::RevisionTracker;
pub use user_config::UserConfigService;
