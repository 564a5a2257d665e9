// src/services/session_manager.rs

use std::sync::Arc;

use crate::{
    config::{ExamWindowPolicy, RetryPolicy},
    error::AppError,
    models::session::{NewSession, Session, SessionInsert, SessionStatus},
    store::{ExamRepository, SessionRepository},
    utils::{clock::Clock, retry::with_retry},
};

/// Creates or resumes a student's attempt at an exam.
#[derive(Clone)]
pub struct SessionManager {
    exams: Arc<dyn ExamRepository>,
    sessions: Arc<dyn SessionRepository>,
    clock: Arc<dyn Clock>,
    window: ExamWindowPolicy,
    retry: RetryPolicy,
}

impl SessionManager {
    pub fn new(
        exams: Arc<dyn ExamRepository>,
        sessions: Arc<dyn SessionRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            exams,
            sessions,
            clock,
            window: ExamWindowPolicy::default(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_window_policy(mut self, window: ExamWindowPolicy) -> Self {
        self.window = window;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Starts an attempt, or returns the existing one unchanged.
    ///
    /// * `NotFound` if the exam does not exist.
    /// * `Conflict` if the student already completed this exam.
    /// * Expired attempts are returned as they are; they cannot be restarted.
    ///
    /// Writes nothing on the resume path and exactly one session on the creation path.
    pub async fn start_or_resume(&self, student_id: &str, exam_id: i64) -> Result<Session, AppError> {
        let student_id = student_id.trim();
        if student_id.is_empty() {
            return Err(AppError::BadRequest("Student id must not be empty".to_string()));
        }
        if exam_id < 1 {
            return Err(AppError::BadRequest("Invalid exam id".to_string()));
        }

        let exam = with_retry(&self.retry, "find_exam", || self.exams.find_exam(exam_id))
            .await?
            .ok_or_else(|| AppError::NotFound("Exam not found".to_string()))?;

        let existing = with_retry(&self.retry, "find_session", || {
            self.sessions.find_by_student_and_exam(student_id, exam_id)
        })
        .await?;

        if let Some(session) = existing {
            tracing::debug!("Resuming session {} for exam {}", session.id, exam_id);
            return resume(session);
        }

        let now = self.clock.now();
        if self.window == ExamWindowPolicy::Enforce && !exam.is_open_at(now) {
            return Err(AppError::BadRequest(format!(
                "Exam '{}' is not open at this time",
                exam.title
            )));
        }

        let new_session = NewSession::begin(student_id, &exam, now);
        let inserted = with_retry(&self.retry, "insert_session", || {
            self.sessions.insert_session(&new_session)
        })
        .await?;

        match inserted {
            SessionInsert::Created(session) => {
                tracing::info!(
                    "Started session {} for exam {} (expires at {})",
                    session.id,
                    exam_id,
                    session.expires_at
                );
                Ok(session)
            }
            // A concurrent start for the same student won the unique constraint.
            SessionInsert::AlreadyExists(session) => resume(session),
        }
    }
}

fn resume(session: Session) -> Result<Session, AppError> {
    if session.status == SessionStatus::Completed {
        return Err(AppError::Conflict(
            "You have already completed this exam".to_string(),
        ));
    }
    Ok(session)
}
