//! Session endpoints - create, inspect, upload and analyze

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use chrono::{DateTime, Local};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use super::{lookup_session, run_blocking, session_not_found, ApiError};
use crate::inference::VerdictSummary;
use crate::server::state::SharedState;
use crate::session::{SessionContext, SessionStage};

/// Name of the multipart field carrying the image
pub const UPLOAD_FIELD: &str = "file";

#[derive(Debug, Serialize)]
pub struct CreatedSession {
    pub id: Uuid,
}

/// Current state of a session
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub id: Uuid,
    pub stage: SessionStage,
    pub image_name: Option<String>,
    pub verdict: Option<VerdictSummary>,
    pub report_count: usize,
    pub created_at: DateTime<Local>,
}

impl SessionView {
    fn new(id: Uuid, ctx: &SessionContext) -> Self {
        Self {
            id,
            stage: ctx.stage(),
            image_name: ctx.image().and_then(|img| img.file_name.clone()),
            verdict: ctx.verdict().map(|v| v.summary()),
            report_count: ctx.history().len(),
            created_at: ctx.created_at(),
        }
    }
}

/// POST /sessions - Start a new session
pub async fn create_session(
    State(state): State<SharedState>,
) -> (StatusCode, Json<CreatedSession>) {
    let id = Uuid::new_v4();
    let ctx = state.new_session();
    state
        .sessions
        .write()
        .await
        .insert(id, Arc::new(Mutex::new(ctx)));

    info!("Created session {}", id);
    (StatusCode::CREATED, Json(CreatedSession { id }))
}

/// GET /sessions/:id - Session stage, verdict and report count
pub async fn get_session(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    let session = lookup_session(&state, &id).await?;
    let ctx = session.lock().await;
    Ok(Json(SessionView::new(id, &ctx)))
}

/// DELETE /sessions/:id - End a session
///
/// Reports already written stay on disk.
pub async fn delete_session(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state
        .sessions
        .write()
        .await
        .remove(&id)
        .ok_or_else(|| session_not_found(&id))?;

    info!("Ended session {}", id);
    Ok(StatusCode::NO_CONTENT)
}

/// POST /sessions/:id/image - Multipart upload of a chest X-ray
pub async fn upload_image(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<SessionView>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| (StatusCode::BAD_REQUEST, format!("Failed to read upload: {}", e)))?;
        upload = Some((file_name, bytes));
        break;
    }

    let (file_name, bytes) = upload.ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            format!("Missing multipart field '{}'", UPLOAD_FIELD),
        )
    })?;

    let session = lookup_session(&state, &id).await?;
    let mut ctx = session.lock_owned().await;

    let view = run_blocking(move || {
        ctx.upload_image(&bytes, file_name.as_deref())?;
        let view = SessionView::new(id, &ctx);
        Ok(view)
    })
    .await?;

    Ok(Json(view))
}

/// POST /sessions/:id/analyze - Run the classifier on the uploaded image
///
/// The session stays locked for the whole pass, so an upload arriving
/// meanwhile waits and then replaces both the image and this verdict.
pub async fn analyze(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<VerdictSummary>, ApiError> {
    let session = lookup_session(&state, &id).await?;
    let mut ctx = session.lock_owned().await;
    let classifier = Arc::clone(&state.classifier);

    let verdict = run_blocking(move || ctx.analyze(classifier.as_ref())).await?;

    Ok(Json(verdict.summary()))
}
