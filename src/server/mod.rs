//! Thin HTTP adapter over a `Project` (spec.md §4.G).
//!
//! The adapter performs no business logic: it resolves a `dir` path segment
//! to a registered folder and dispatches to that folder's public operations.

mod handlers;
mod routes;

pub use routes::create_router;

use crate::project::Project;
use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;

/// Shared application state handed to every handler.
pub struct AppState {
    pub project: Project,
}

/// Binds and serves the HTTP API until the process is asked to shut down.
pub async fn run_server(project: Project, port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let state = Arc::new(AppState { project });
    let app = create_router(state);

    tracing::info!(%addr, "starting folderforge HTTP server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
