// src/handlers/exam.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError,
    models::session::{SessionResponse, StartSessionRequest, SubmitAnswerRequest},
    state::AppState,
    utils::jwt::Claims,
};

/// Lists exams whose availability window is open right now.
pub async fn list_active_exams(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let exams = state.catalog.list_active().await?;
    Ok(Json(exams))
}

/// Basic info about one exam.
pub async fn get_exam(
    State(state): State<AppState>,
    Path(exam_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let exam = state.catalog.get_exam(exam_id).await?;
    Ok(Json(exam))
}

/// All questions of an exam, ordered by number, without answer keys.
pub async fn get_exam_questions(
    State(state): State<AppState>,
    Path(exam_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let questions = state.catalog.list_questions(exam_id).await?;
    Ok(Json(questions))
}

/// Starts or resumes the caller's attempt at an exam.
///
/// The student id is the `sub` claim of the verified JWT.
pub async fn start_session(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<StartSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let session = state
        .sessions
        .start_or_resume(&claims.sub, payload.exam_id)
        .await?;

    Ok(Json(SessionResponse::from(session)))
}

/// Records (or replaces) the answer to one question.
pub async fn submit_answer(
    State(state): State<AppState>,
    Json(payload): Json<SubmitAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let ack = state
        .answers
        .submit(&payload.session_token, payload.question_id, &payload.answer_text)
        .await?;

    Ok(Json(ack))
}

/// Finishes the attempt. The report is computed on first request.
pub async fn complete_session(
    State(state): State<AppState>,
    Path(session_token): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let receipt = state.answers.complete(&session_token).await?;
    Ok(Json(receipt))
}
