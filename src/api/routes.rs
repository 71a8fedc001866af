use axum::{middleware, routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::{make_span_with_request_id, request_id_middleware};

use super::handlers;
use super::AppState;

/// Creates the application router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .merge(addon_routes())
        .nest("/api/v1", api_routes())
        .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Client-facing addon protocol, with and without the token segment
fn addon_routes() -> Router<AppState> {
    Router::new()
        .route("/addon/:user_id/manifest.json", get(handlers::manifest))
        .route("/addon/:user_id/:token/manifest.json", get(handlers::manifest))
        .route(
            "/addon/:user_id/catalog/:type/:catalog_id",
            get(handlers::catalog),
        )
        .route(
            "/addon/:user_id/catalog/:type/:catalog_id/:extra",
            get(handlers::catalog),
        )
        .route(
            "/addon/:user_id/:token/catalog/:type/:catalog_id",
            get(handlers::catalog),
        )
        .route(
            "/addon/:user_id/:token/catalog/:type/:catalog_id/:extra",
            get(handlers::catalog),
        )
}

/// Configuration API under /api/v1
fn api_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/users/:user_id/lists",
            get(handlers::get_lists).put(handlers::put_lists),
        )
        .route(
            "/users/:user_id/lists/:list_id",
            axum::routing::delete(handlers::delete_list),
        )
        .route(
            "/users/:user_id/settings",
            get(handlers::get_settings).put(handlers::put_settings),
        )
        .route("/users/:user_id/revision", get(handlers::get_revision))
}
