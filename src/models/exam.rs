// src/models/exam.rs

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// An exam as seen by the session service.
/// Exams are immutable here; nothing in this crate writes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exam {
    pub id: i64,
    pub title: String,
    pub subject: String,

    /// Availability window. Only consulted when the window policy is `Enforce`.
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,

    /// Length of one attempt, counted from the moment the session starts.
    pub duration_minutes: i32,

    /// Question ids ordered by question number.
    pub question_ids: Vec<i64>,
}

impl Exam {
    pub fn duration(&self) -> Duration {
        Duration::minutes(i64::from(self.duration_minutes))
    }

    /// Inclusive on both ends.
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.start_at <= now && now <= self.end_at
    }
}
