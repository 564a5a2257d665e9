// src/services/scorer.rs

use std::{collections::HashMap, sync::Arc};

use crate::{
    config::RetryPolicy,
    error::AppError,
    models::{
        question::Question,
        report::{NewReport, Report},
        session::{Session, SessionTransition},
    },
    store::{ExamRepository, ReportRepository, SessionRepository},
    utils::{clock::Clock, retry::with_retry},
};

/// Correct answers over questions asked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Tally {
    pub correct: i64,
    pub total: i64,
}

impl Tally {
    /// 0 for an exam without questions.
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.correct as f64 / self.total as f64 * 100.0
    }
}

/// Counts every question of the exam and the responses that match its key.
///
/// Responses to question ids outside `questions` are ignored. Questions without
/// a key (open-ended) count toward the total and never toward the score.
pub fn tally(questions: &[Question], responses: &HashMap<i64, String>) -> Tally {
    let correct = questions
        .iter()
        .filter(|q| is_correct(q, responses.get(&q.id)))
        .count() as i64;

    Tally {
        correct,
        total: questions.len() as i64,
    }
}

fn is_correct(question: &Question, response: Option<&String>) -> bool {
    let (Some(key), Some(response)) = (question.answer.as_deref(), response) else {
        return false;
    };
    let key = normalize(key);
    !key.is_empty() && key == normalize(response)
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Turns a finished session into a persisted report.
#[derive(Clone)]
pub struct Scorer {
    exams: Arc<dyn ExamRepository>,
    sessions: Arc<dyn SessionRepository>,
    reports: Arc<dyn ReportRepository>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
}

impl Scorer {
    pub fn new(
        exams: Arc<dyn ExamRepository>,
        sessions: Arc<dyn SessionRepository>,
        reports: Arc<dyn ReportRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            exams,
            sessions,
            reports,
            clock,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Scores the session and inserts a new report row.
    ///
    /// Every call inserts; callers that want at most one report per session go
    /// through `ReportService::get_or_compute`.
    pub async fn calculate_score(&self, session_id: i64) -> Result<Report, AppError> {
        let session = with_retry(&self.retry, "find_session", || {
            self.sessions.find_by_id(session_id)
        })
        .await?
        .ok_or_else(|| AppError::NotFound("Session not found".to_string()))?;

        let session = self.settle(session).await?;

        let questions = with_retry(&self.retry, "find_questions", || {
            self.exams.find_questions(session.exam_id)
        })
        .await?;

        let result = tally(&questions, &session.responses);
        let report = NewReport {
            student_id: session.student_id.clone(),
            exam_id: session.exam_id,
            session_id: session.id,
            score: result.correct,
            total: result.total,
            percentage: result.percentage(),
            created_at: self.clock.now(),
        };

        // Not retried: a retry after an ambiguous failure could store the report twice.
        let stored = self.reports.insert_report(&report).await?;
        tracing::info!(
            "Scored session {}: {}/{} ({:.2}%)",
            session.id,
            stored.score,
            stored.total,
            stored.percentage
        );
        Ok(stored)
    }

    /// Expires an active session past its deadline before it is scored.
    /// Terminal sessions and sessions still inside their deadline are scored as stored.
    async fn settle(&self, session: Session) -> Result<Session, AppError> {
        if session.status.is_terminal() || !session.is_past_deadline(self.clock.now()) {
            return Ok(session);
        }

        let expired = with_retry(&self.retry, "expire_session", || {
            self.sessions.transition(&session.token, SessionTransition::Expire)
        })
        .await?;

        match expired {
            Some(expired) => {
                tracing::info!("Session {} expired before scoring", expired.id);
                Ok(expired)
            }
            // Someone else closed it in the meantime; score whatever is stored now.
            None => with_retry(&self.retry, "find_session", || {
                self.sessions.find_by_id(session.id)
            })
            .await?
            .ok_or_else(|| AppError::NotFound("Session not found".to_string())),
        }
    }
}
