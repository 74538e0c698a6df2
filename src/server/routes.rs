//! Axum router configuration for the folderforge HTTP adapter.

use super::handlers::{delete, download, list_folders, list_one, upload};
use super::AppState;
use axum::routing::{delete as delete_method, get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Builds the full route table of spec.md §4.G.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/metadatas/folders", get(list_folders))
        .route("/:dir/list", get(list_one))
        .route("/:dir/download/:name", get(download))
        .route("/:dir/upload", post(upload))
        .route("/:dir/file/:name", delete_method(delete))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
