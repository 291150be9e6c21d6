//! HTTP route handlers
//!
//! Handlers return `Result<_, (StatusCode, String)>`; library errors are
//! mapped through [`error_response`].

pub mod health;
pub mod reports;
pub mod sessions;

use axum::http::StatusCode;
use tracing::{error, warn};
use uuid::Uuid;

use crate::server::state::{SessionHandle, SharedState};
use crate::utils::error::XrayError;

pub type ApiError = (StatusCode, String);

/// HTTP status for a library error
pub fn status_for(err: &XrayError) -> StatusCode {
    match err {
        XrayError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        XrayError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        XrayError::NotFound(_) | XrayError::PathNotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Convert a library error into a handler error, logging server-side faults
pub fn error_response(err: XrayError) -> ApiError {
    let status = status_for(&err);
    if status.is_server_error() {
        error!("{}", err);
    } else {
        warn!("{}", err);
    }
    (status, err.to_string())
}

pub(crate) fn session_not_found(id: &Uuid) -> ApiError {
    (StatusCode::NOT_FOUND, format!("Session {} not found", id))
}

/// Look up a session or answer 404
pub(crate) async fn lookup_session(
    state: &SharedState,
    id: &Uuid,
) -> Result<SessionHandle, ApiError> {
    state.session(id).await.ok_or_else(|| session_not_found(id))
}

/// Run CPU-bound work (preprocessing, the forward pass, PDF rendering) off
/// the async workers
pub(crate) async fn run_blocking<F, T>(task: F) -> Result<T, ApiError>
where
    F: FnOnce() -> crate::utils::error::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| {
            error!("Blocking task failed: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Background task failed".to_string(),
            )
        })?
        .map_err(error_response)
}
