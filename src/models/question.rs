// src/models/question.rs

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Question type. Stored as text: 'mcq' or 'open_ended'.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestionType {
    #[serde(rename = "MCQ")]
    Mcq,
    #[serde(rename = "Open-ended")]
    OpenEnded,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::Mcq => "mcq",
            QuestionType::OpenEnded => "open_ended",
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mcq" => Ok(QuestionType::Mcq),
            "open_ended" => Ok(QuestionType::OpenEnded),
            other => Err(format!("unknown question type '{}'", other)),
        }
    }
}

/// Represents the 'questions' table, answer key included.
///
/// Deliberately not `Serialize`: the only way a question leaves the service
/// is through [`PublicQuestion`].
#[derive(Debug, Clone, PartialEq)]
pub struct Question {
    pub id: i64,
    pub exam_id: i64,

    /// Position within the exam, starting at 1.
    pub number: i32,

    pub statement: String,

    pub question_type: QuestionType,

    /// Choices shown to the student (e.g., ["a) ...", "b) ..."]). Empty for open-ended questions.
    pub options: Vec<String>,

    /// The answer key. Always `None` for open-ended questions.
    pub answer: Option<String>,
}

/// DTO for sending a question to the student (excludes the answer key).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicQuestion {
    pub id: i64,
    pub exam_id: i64,
    pub number: i32,
    pub statement: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub options: Vec<String>,
}

impl From<Question> for PublicQuestion {
    fn from(q: Question) -> Self {
        PublicQuestion {
            id: q.id,
            exam_id: q.exam_id,
            number: q.number,
            statement: q.statement,
            question_type: q.question_type,
            options: q.options,
        }
    }
}
