use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::{download, handlers, middleware::metrics_middleware, stream};
use crate::metrics::metrics_handler;
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Pools and queue position
        .route("/pools", get(handlers::get_pools))
        .route("/status/{request_id}", get(handlers::get_status))
        // Jobs
        .route("/download", post(download::download))
        .nest_service("/stream", stream::artifact_router(state.downloads_dir()))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(metrics_handler))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
}
