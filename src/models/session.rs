// src/models/session.rs

use std::{collections::HashMap, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{config::MAX_ANSWER_LENGTH, models::exam::Exam};

/// Lifecycle state of an exam attempt.
/// Stored as text: 'active', 'completed' or 'expired'.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Completed,
    Expired,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
            SessionStatus::Expired => "expired",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::Active)
    }

    /// Result of applying `transition` to a session in this state.
    /// `None` for every terminal state: nothing leaves Completed or Expired.
    pub fn apply(self, transition: SessionTransition) -> Option<SessionStatus> {
        match self {
            SessionStatus::Active => Some(transition.target()),
            SessionStatus::Completed | SessionStatus::Expired => None,
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SessionStatus::Active),
            "completed" => Ok(SessionStatus::Completed),
            "expired" => Ok(SessionStatus::Expired),
            other => Err(format!("unknown session status '{}'", other)),
        }
    }
}

/// The only two ways out of `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionTransition {
    /// Student finished the exam.
    Complete { at: DateTime<Utc> },
    /// Deadline passed. Detected lazily by submit and scoring.
    Expire,
}

impl SessionTransition {
    pub fn target(&self) -> SessionStatus {
        match self {
            SessionTransition::Complete { .. } => SessionStatus::Completed,
            SessionTransition::Expire => SessionStatus::Expired,
        }
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        match self {
            SessionTransition::Complete { at } => Some(*at),
            SessionTransition::Expire => None,
        }
    }
}

/// Represents the 'exam_sessions' table.
/// One row per (student_id, exam_id), ever.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: i64,

    /// Opaque identity handed over by the auth layer.
    pub student_id: String,
    pub exam_id: i64,

    /// Unguessable handle used by the student-facing calls.
    pub token: String,

    pub started_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    pub current_question_number: i32,

    /// Question id -> latest answer text.
    pub responses: HashMap<i64, String>,
}

impl Session {
    pub fn is_past_deadline(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// A session that has not been persisted yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSession {
    pub student_id: String,
    pub exam_id: i64,
    pub token: String,
    pub started_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl NewSession {
    /// Fresh attempt at `exam` starting at `now`, with a random v4 token.
    pub fn begin(student_id: &str, exam: &Exam, now: DateTime<Utc>) -> Self {
        NewSession {
            student_id: student_id.to_owned(),
            exam_id: exam.id,
            token: Uuid::new_v4().to_string(),
            started_at: now,
            expires_at: now + exam.duration(),
        }
    }
}

/// Outcome of inserting a session under the (student_id, exam_id) unique constraint.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionInsert {
    Created(Session),
    /// Another request created the session first; this is the stored one.
    AlreadyExists(Session),
}

/// DTO for starting (or resuming) an attempt.
#[derive(Debug, Deserialize, Validate)]
pub struct StartSessionRequest {
    #[validate(range(min = 1))]
    pub exam_id: i64,
}

/// DTO returned to the student when a session starts or resumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub session_id: i64,
    pub exam_id: i64,
    pub token: String,
    pub started_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: SessionStatus,
    pub current_question_number: i32,
    /// Answers recorded so far, so a resumed attempt can be restored.
    pub responses: HashMap<i64, String>,
}

impl From<Session> for SessionResponse {
    fn from(s: Session) -> Self {
        SessionResponse {
            session_id: s.id,
            exam_id: s.exam_id,
            token: s.token,
            started_at: s.started_at,
            expires_at: s.expires_at,
            status: s.status,
            current_question_number: s.current_question_number,
            responses: s.responses,
        }
    }
}

/// DTO for submitting a single answer.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitAnswerRequest {
    #[validate(length(min = 1, max = 64))]
    pub session_token: String,

    #[validate(range(min = 1))]
    pub question_id: i64,

    #[validate(length(max = MAX_ANSWER_LENGTH))]
    pub answer_text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitAnswerAck {
    pub success: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionReceipt {
    pub success: bool,
    pub session_id: i64,
}
