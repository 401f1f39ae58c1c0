use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{reports, JobRecord, JobStatus, ReportParams, ReportType};
use crate::errors::AppError;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateReportRequest {
    #[serde(default)]
    pub report_type: String,
    #[serde(default)]
    pub parameters: ReportParams,
}

#[derive(Debug, Serialize)]
pub struct CreateReportResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ActiveJobsResponse {
    pub count: usize,
    pub jobs: Vec<JobRecord>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/reports
///
/// Queues a report job and returns its id immediately.
pub async fn handle_create_report(
    State(state): State<AppState>,
    Json(request): Json<CreateReportRequest>,
) -> Result<(StatusCode, Json<CreateReportResponse>), AppError> {
    if request.report_type.trim().is_empty() {
        return Err(AppError::Validation("report_type is required".to_string()));
    }
    let report_type = ReportType::parse(&request.report_type).ok_or_else(|| {
        let allowed: Vec<&str> = ReportType::ALL.iter().map(|t| t.as_str()).collect();
        AppError::Validation(format!(
            "unknown report type '{}'; allowed: {}",
            request.report_type,
            allowed.join(", ")
        ))
    })?;

    let record = state.jobs.submit(report_type, request.parameters).await;
    Ok((
        StatusCode::CREATED,
        Json(CreateReportResponse {
            job_id: record.job_id,
            status: record.status,
            message: record.message,
        }),
    ))
}

/// GET /api/reports/types
pub async fn handle_report_types() -> Json<Value> {
    Json(reports::catalogue())
}

/// GET /api/reports/active
pub async fn handle_active_reports(State(state): State<AppState>) -> Json<ActiveJobsResponse> {
    let jobs = state.jobs.jobs().list_active().await;
    Json(ActiveJobsResponse {
        count: jobs.len(),
        jobs,
    })
}

/// GET /api/reports/:job_id
pub async fn handle_report_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<JobRecord>, AppError> {
    state
        .jobs
        .jobs()
        .get(&job_id)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("job {job_id} not found")))
}

/// POST /api/reports/:job_id/cancel
pub async fn handle_cancel_report(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<JobRecord>, AppError> {
    Ok(Json(state.jobs.cancel(&job_id).await?))
}
