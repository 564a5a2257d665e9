// src/services/mod.rs

//! Transport-agnostic exam session logic.
//!
//! Handlers stay thin: they validate payloads, pull the student identity out of
//! the JWT claims and delegate here.

pub mod answer_recorder;
pub mod catalog;
pub mod reports;
pub mod scorer;
pub mod session_manager;

pub use answer_recorder::AnswerRecorder;
pub use catalog::ExamCatalog;
pub use reports::ReportService;
pub use scorer::Scorer;
pub use session_manager::SessionManager;

use uuid::Uuid;

use crate::error::AppError;

/// Session tokens are UUIDs; anything else is rejected before touching the store.
pub(crate) fn validate_token(token: &str) -> Result<(), AppError> {
    Uuid::parse_str(token)
        .map(|_| ())
        .map_err(|_| AppError::BadRequest("Malformed session token".to_string()))
}
