// src/services/answer_recorder.rs

use std::sync::Arc;

use crate::{
    config::{MAX_ANSWER_LENGTH, RetryPolicy},
    error::AppError,
    models::session::{CompletionReceipt, SessionStatus, SessionTransition, SubmitAnswerAck},
    services::validate_token,
    store::SessionRepository,
    utils::{clock::Clock, retry::with_retry},
};

/// Records answers into active sessions and closes them.
///
/// Expiry is detected lazily, here and in the scorer. Nothing sweeps stale sessions.
#[derive(Clone)]
pub struct AnswerRecorder {
    sessions: Arc<dyn SessionRepository>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
}

impl AnswerRecorder {
    pub fn new(sessions: Arc<dyn SessionRepository>, clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions,
            clock,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Stores `answer_text` as the answer to `question_id`, replacing any earlier one.
    ///
    /// The write is a single guarded update; the session is only read back when the
    /// guard rejected it, to tell the caller why.
    pub async fn submit(
        &self,
        token: &str,
        question_id: i64,
        answer_text: &str,
    ) -> Result<SubmitAnswerAck, AppError> {
        validate_token(token)?;
        if question_id < 1 {
            return Err(AppError::BadRequest("Invalid question id".to_string()));
        }
        if answer_text.chars().count() > MAX_ANSWER_LENGTH as usize {
            return Err(AppError::BadRequest(format!(
                "Answer exceeds {} characters",
                MAX_ANSWER_LENGTH
            )));
        }

        let now = self.clock.now();
        let applied = with_retry(&self.retry, "record_response", || {
            self.sessions
                .record_response(token, question_id, answer_text, now)
        })
        .await?;

        if applied {
            return Ok(SubmitAnswerAck { success: true });
        }

        let session = with_retry(&self.retry, "find_session", || {
            self.sessions.find_by_token(token)
        })
        .await?
        .ok_or_else(|| AppError::NotFound("Session not found".to_string()))?;

        match session.status {
            SessionStatus::Active if session.is_past_deadline(now) => {
                self.expire(token).await?;
                tracing::warn!(
                    "Rejected answer for question {}: session {} expired at {}",
                    question_id,
                    session.id,
                    session.expires_at
                );
                Err(AppError::Expired("Session expired".to_string()))
            }
            _ => Err(AppError::InvalidSession(
                "Invalid or inactive session".to_string(),
            )),
        }
    }

    /// Marks the session completed. Scoring happens separately, on first report request.
    pub async fn complete(&self, token: &str) -> Result<CompletionReceipt, AppError> {
        validate_token(token)?;

        let at = self.clock.now();
        let mut attempts = 0;
        let completed = with_retry(&self.retry, "complete_session", || {
            attempts += 1;
            self.sessions.transition(token, SessionTransition::Complete { at })
        })
        .await?;

        if let Some(session) = completed {
            tracing::info!(
                "Session {} completed for exam {}",
                session.id,
                session.exam_id
            );
            return Ok(CompletionReceipt {
                success: true,
                session_id: session.id,
            });
        }

        // A retried attempt may find the row already completed by an earlier
        // attempt whose acknowledgement was lost.
        let known = with_retry(&self.retry, "find_session", || {
            self.sessions.find_by_token(token)
        })
        .await?
        .ok_or_else(|| AppError::NotFound("Session not found".to_string()))?;

        if attempts > 1 && known.status == SessionStatus::Completed && known.finished_at == Some(at)
        {
            tracing::info!("Session {} completed for exam {}", known.id, known.exam_id);
            return Ok(CompletionReceipt {
                success: true,
                session_id: known.id,
            });
        }
        Err(AppError::InvalidSession(
            "Invalid or inactive session".to_string(),
        ))
    }

    async fn expire(&self, token: &str) -> Result<(), AppError> {
        let expired = with_retry(&self.retry, "expire_session", || {
            self.sessions.transition(token, SessionTransition::Expire)
        })
        .await?;
        if let Some(session) = expired {
            tracing::info!("Session {} expired", session.id);
        }
        Ok(())
    }
}
