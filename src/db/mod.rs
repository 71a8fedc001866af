pub mod memory;
pub mod postgres;
pub mod redis;
mod repository;
mod store;

pub use memory::MemoryPageStore;
pub use postgres::{create_pool, run_migrations, PgConfigRepository};
pub use self::redis::{create_redis_client, CacheWriterHandle, RedisPageStore};
pub use repository::{ConfigRepository, InMemoryConfigRepository};
#[cfg(test)]
pub(crate) use repository::scripted::ScriptedRepository;
pub use store::PageStore;
