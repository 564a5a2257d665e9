// src/store/mod.rs

//! Persistence seams for the session service.
//!
//! Each component receives only the repositories it needs as `Arc<dyn …>`.
//! `PgStore` backs production; `MemoryStore` backs tests.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    error::AppError,
    models::{
        exam::Exam,
        question::Question,
        report::{NewReport, Report},
        session::{NewSession, Session, SessionInsert, SessionTransition},
    },
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Read access to exams and their questions.
#[async_trait]
pub trait ExamRepository: Send + Sync {
    async fn find_exam(&self, exam_id: i64) -> Result<Option<Exam>, AppError>;

    /// Exams whose availability window contains `now`.
    async fn list_open_exams(&self, now: DateTime<Utc>) -> Result<Vec<Exam>, AppError>;

    /// All questions of the exam ordered by number, answer keys included.
    async fn find_questions(&self, exam_id: i64) -> Result<Vec<Question>, AppError>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn find_by_student_and_exam(
        &self,
        student_id: &str,
        exam_id: i64,
    ) -> Result<Option<Session>, AppError>;

    async fn find_by_token(&self, token: &str) -> Result<Option<Session>, AppError>;

    async fn find_by_id(&self, session_id: i64) -> Result<Option<Session>, AppError>;

    /// Inserts under the (student_id, exam_id) unique constraint.
    /// Losing a race is not an error: the stored session comes back as `AlreadyExists`.
    async fn insert_session(&self, session: &NewSession) -> Result<SessionInsert, AppError>;

    /// Sets `responses[question_id] = answer_text` in one conditional write,
    /// guarded by `token`, `status = active` and `expires_at >= now`.
    /// Returns whether the write applied.
    async fn record_response(
        &self,
        token: &str,
        question_id: i64,
        answer_text: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError>;

    /// Moves an active session to the transition's target status.
    /// Returns the updated session, or `None` if no active session has this token.
    async fn transition(
        &self,
        token: &str,
        transition: SessionTransition,
    ) -> Result<Option<Session>, AppError>;
}

#[async_trait]
pub trait ReportRepository: Send + Sync {
    /// Earliest report stored for the session, if any.
    async fn find_by_session(&self, session_id: i64) -> Result<Option<Report>, AppError>;

    async fn insert_report(&self, report: &NewReport) -> Result<Report, AppError>;
}
