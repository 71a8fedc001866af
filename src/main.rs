use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use listfeed_api::api::{create_router, AddonOptions, AppState};
use listfeed_api::config::Config;
use listfeed_api::db::{
    create_pool, create_redis_client, run_migrations, PgConfigRepository, RedisPageStore,
};
use listfeed_api::services::providers::MdbListSource;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "listfeed_api=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;

    let pool = create_pool(&config.database_url)
        .await
        .context("Failed to connect to Postgres")?;
    run_migrations(&pool).await.context("Failed to run migrations")?;
    tracing::info!("Database ready");

    let redis_client = create_redis_client(&config.redis_url)?;
    let (store, cache_writer) = RedisPageStore::new(redis_client);

    let source = MdbListSource::new(config.list_api_key.clone(), config.list_api_url.clone());

    let state = AppState::new(
        Arc::new(PgConfigRepository::new(pool)),
        Arc::new(store),
        Arc::new(source),
        AddonOptions::from(&config),
    );
    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(addr = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cache_writer.shutdown().await;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
