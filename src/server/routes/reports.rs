//! Report endpoints - generate, list and download PDFs

use std::path::PathBuf;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use tokio::fs;
use tokio_util::io::ReaderStream;
use tracing::error;
use uuid::Uuid;

use super::{error_response, lookup_session, run_blocking, ApiError};
use crate::server::state::SharedState;
use crate::session::{Age, Gender, PatientInfo, ReportRecord};
use crate::utils::error::Result as XrayResult;

/// Patient details submitted with a report request
#[derive(Debug, Deserialize)]
pub struct ReportRequest {
    pub name: String,
    pub age: u32,
    pub gender: String,
}

impl ReportRequest {
    fn into_patient(self) -> XrayResult<PatientInfo> {
        let age = Age::new(self.age)?;
        let gender: Gender = self.gender.parse()?;
        Ok(PatientInfo::new(self.name, age, gender))
    }
}

/// POST /sessions/:id/reports - Generate a PDF for the current verdict
pub async fn create_report(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ReportRequest>,
) -> Result<(StatusCode, Json<ReportRecord>), ApiError> {
    let patient = request.into_patient().map_err(error_response)?;
    let generator = state.session_reports(&id);

    let session = lookup_session(&state, &id).await?;
    let mut ctx = session.lock_owned().await;

    let record = run_blocking(move || {
        let record = ctx.generate_report(&patient, &generator)?.clone();
        Ok(record)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /sessions/:id/reports - Report history in creation order
pub async fn list_reports(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ReportRecord>>, ApiError> {
    let session = lookup_session(&state, &id).await?;
    let ctx = session.lock().await;
    Ok(Json(ctx.history().list().to_vec()))
}

/// GET /sessions/:id/reports/:index/download - Stream one report (1-based)
pub async fn download_report(
    State(state): State<SharedState>,
    Path((id, index)): Path<(Uuid, usize)>,
) -> Result<impl IntoResponse, ApiError> {
    let (path, file_name) = {
        let session = lookup_session(&state, &id).await?;
        let ctx = session.lock().await;
        let record = ctx.report(index).map_err(error_response)?;
        (record.path().to_path_buf(), record.file_name().to_string())
    };

    stream_pdf(path, file_name).await
}

/// GET /sessions/:id/latest-report - Stream the most recent report
pub async fn download_latest(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let (path, file_name) = {
        let session = lookup_session(&state, &id).await?;
        let ctx = session.lock().await;
        let record = ctx
            .latest_report()
            .ok_or_else(|| (StatusCode::NOT_FOUND, "No reports generated yet".to_string()))?;
        (record.path().to_path_buf(), record.file_name().to_string())
    };

    stream_pdf(path, file_name).await
}

async fn stream_pdf(path: PathBuf, file_name: String) -> Result<impl IntoResponse, ApiError> {
    let file = fs::File::open(&path).await.map_err(|e| {
        error!("Failed to open report {:?}: {}", path, e);
        (StatusCode::NOT_FOUND, "Report file not found".to_string())
    })?;

    let body = Body::from_stream(ReaderStream::new(file));
    let content_disposition = format!("attachment; filename=\"{}\"", file_name);

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, content_disposition),
        ],
        body,
    ))
}
