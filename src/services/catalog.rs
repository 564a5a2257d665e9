// src/services/catalog.rs

use std::sync::Arc;

use crate::{
    config::RetryPolicy,
    error::AppError,
    models::{exam::Exam, question::PublicQuestion},
    store::ExamRepository,
    utils::{clock::Clock, retry::with_retry},
};

/// Student-facing reads of exams and questions. Answer keys never leave through here.
#[derive(Clone)]
pub struct ExamCatalog {
    exams: Arc<dyn ExamRepository>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
}

impl ExamCatalog {
    pub fn new(exams: Arc<dyn ExamRepository>, clock: Arc<dyn Clock>) -> Self {
        Self {
            exams,
            clock,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Exams whose availability window contains the current time.
    pub async fn list_active(&self) -> Result<Vec<Exam>, AppError> {
        let now = self.clock.now();
        with_retry(&self.retry, "list_open_exams", || {
            self.exams.list_open_exams(now)
        })
        .await
    }

    pub async fn get_exam(&self, exam_id: i64) -> Result<Exam, AppError> {
        with_retry(&self.retry, "find_exam", || self.exams.find_exam(exam_id))
            .await?
            .ok_or_else(|| AppError::NotFound("Exam not found".to_string()))
    }

    /// Questions ordered by number, without answer keys.
    pub async fn list_questions(&self, exam_id: i64) -> Result<Vec<PublicQuestion>, AppError> {
        // Distinguish "no such exam" from "exam without questions".
        self.get_exam(exam_id).await?;

        let questions = with_retry(&self.retry, "find_questions", || {
            self.exams.find_questions(exam_id)
        })
        .await?;

        Ok(questions.into_iter().map(PublicQuestion::from).collect())
    }
}
