// src/models/report.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Represents the 'reports' table.
/// The persisted outcome of scoring one session.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Report {
    pub id: i64,
    pub student_id: String,
    pub exam_id: i64,
    pub session_id: i64,

    /// Number of questions answered correctly.
    pub score: i64,

    /// Number of questions in the exam.
    pub total: i64,

    /// `score / total * 100`, or 0 for an exam without questions.
    pub percentage: f64,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// A report that has been computed but not yet stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReport {
    pub student_id: String,
    pub exam_id: i64,
    pub session_id: i64,
    pub score: i64,
    pub total: i64,
    pub percentage: f64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// DTO returned by the report endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportResponse {
    pub session_id: i64,
    pub score: i64,
    pub total: i64,
    pub percentage: f64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<Report> for ReportResponse {
    fn from(r: Report) -> Self {
        ReportResponse {
            session_id: r.session_id,
            score: r.score,
            total: r.total,
            percentage: r.percentage,
            created_at: r.created_at,
        }
    }
}
