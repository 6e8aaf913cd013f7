use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use super::middleware::metrics_middleware;
use super::{convert, handlers, ws};
use crate::state::AppState;

/// Mount point of the JSON API.
pub const API_PREFIX: &str = "/api/v1";

pub fn create_router(state: Arc<AppState>) -> Router {
    let max_upload_bytes = state.config().server.max_upload_bytes;
    let static_dir = state.config().server.static_dir.clone();

    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Conversion options
        .route("/formats", get(handlers::list_formats))
        .route("/presets", get(handlers::list_presets))
        // Conversion
        .route("/convert", post(convert::convert))
        .route("/convert/archive", post(convert::convert_archive))
        // Results
        .route(
            "/batches/{id}",
            get(convert::get_batch).delete(convert::delete_batch),
        )
        .route("/batches/{id}/files/{index}", get(convert::download_file))
        .route("/batches/{id}/archive", get(convert::download_archive))
        // Progress updates
        .route("/ws", get(ws::ws_handler))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state);

    let mut app = Router::new()
        .nest(API_PREFIX, api_routes)
        .route("/metrics", get(handlers::metrics));

    // Front-end assets with SPA fallback
    if let Some(dir) = static_dir {
        let index_path = dir.join("index.html");
        app = app.fallback_service(ServeDir::new(&dir).fallback(ServeFile::new(index_path)));
    }

    app.layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
}
