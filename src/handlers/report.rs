// src/handlers/report.rs

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};

use crate::{error::AppError, models::report::ReportResponse, state::AppState};

/// Returns the report for a session, scoring it on first access.
pub async fn get_report(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let report = state.reports.get_or_compute(session_id).await?;
    Ok(Json(ReportResponse::from(report)))
}
