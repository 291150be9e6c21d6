//! HTTP surface for the interactive flow
//!
//! One operator session per id: upload an X-ray, analyze it, generate and
//! download PDF reports.

pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

pub use state::{AppState, ServerConfig, SharedState};

use crate::inference::Classifier;
use crate::utils::error::Result;

/// Build the application router
pub fn router(state: SharedState) -> Router {
    let max_upload = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(routes::health::health_check))
        // Sessions
        .route("/sessions", post(routes::sessions::create_session))
        .route(
            "/sessions/:id",
            get(routes::sessions::get_session).delete(routes::sessions::delete_session),
        )
        .route("/sessions/:id/image", post(routes::sessions::upload_image))
        .route("/sessions/:id/analyze", post(routes::sessions::analyze))
        // Reports
        .route(
            "/sessions/:id/reports",
            get(routes::reports::list_reports).post(routes::reports::create_report),
        )
        .route(
            "/sessions/:id/reports/:index/download",
            get(routes::reports::download_report),
        )
        .route(
            "/sessions/:id/latest-report",
            get(routes::reports::download_latest),
        )
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_upload))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

/// Bind and serve until the process is stopped
pub async fn serve(config: ServerConfig, classifier: Arc<dyn Classifier>) -> Result<()> {
    let addr = config.socket_addr()?;
    let state = Arc::new(AppState::new(config, classifier));
    let app = router(state);

    info!("Starting server on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
