// src/store/memory.rs

use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        Mutex, MutexGuard,
        atomic::{AtomicU32, Ordering},
    },
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    error::AppError,
    models::{
        exam::Exam,
        question::{Question, QuestionType},
        report::{NewReport, Report},
        session::{NewSession, Session, SessionInsert, SessionStatus, SessionTransition},
    },
    store::{ExamRepository, ReportRepository, SessionRepository},
};

/// Exam fields supplied when seeding the store.
#[derive(Debug, Clone)]
pub struct ExamSeed {
    pub title: String,
    pub subject: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub duration_minutes: i32,
}

/// Question fields supplied when seeding the store.
#[derive(Debug, Clone)]
pub struct QuestionSeed {
    pub number: i32,
    pub statement: String,
    pub question_type: QuestionType,
    pub options: Vec<String>,
    pub answer: Option<String>,
}

impl QuestionSeed {
    /// Multiple choice question with options a..d and the given key.
    pub fn mcq(number: i32, key: &str) -> Self {
        QuestionSeed {
            number,
            statement: format!("Question {}", number),
            question_type: QuestionType::Mcq,
            options: ["a", "b", "c", "d"].iter().map(|o| o.to_string()).collect(),
            answer: Some(key.to_string()),
        }
    }

    pub fn open_ended(number: i32) -> Self {
        QuestionSeed {
            number,
            statement: format!("Question {}", number),
            question_type: QuestionType::OpenEnded,
            options: Vec::new(),
            answer: None,
        }
    }
}

#[derive(Default)]
struct Tables {
    next_id: i64,
    exams: BTreeMap<i64, Exam>,
    questions: BTreeMap<i64, Question>,
    sessions: BTreeMap<i64, Session>,
    reports: Vec<Report>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn session_by_token_mut(&mut self, token: &str) -> Option<&mut Session> {
        self.sessions.values_mut().find(|s| s.token == token)
    }
}

/// In-process store with the same conditional-write semantics as `PgStore`.
///
/// Every operation runs under a single lock, which stands in for row-level
/// atomicity and the unique constraints of the SQL schema.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    outages: AtomicU32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Makes the next `calls` store operations fail with `Unavailable`.
    pub fn fail_next(&self, calls: u32) {
        self.outages.store(calls, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), AppError> {
        let pending = self
            .outages
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        match pending {
            Ok(_) => Err(AppError::Unavailable("simulated store outage".to_string())),
            Err(_) => Ok(()),
        }
    }

    pub fn add_exam(&self, seed: ExamSeed) -> Exam {
        let mut tables = self.tables();
        let exam = Exam {
            id: tables.next_id(),
            title: seed.title,
            subject: seed.subject,
            start_at: seed.start_at,
            end_at: seed.end_at,
            duration_minutes: seed.duration_minutes,
            question_ids: Vec::new(),
        };
        tables.exams.insert(exam.id, exam.clone());
        exam
    }

    /// Adds a question and keeps the exam's question id list ordered by number.
    pub fn add_question(&self, exam_id: i64, seed: QuestionSeed) -> Result<Question, AppError> {
        let mut tables = self.tables();
        if !tables.exams.contains_key(&exam_id) {
            return Err(AppError::NotFound("Exam not found".to_string()));
        }
        if seed.number < 1 {
            return Err(AppError::BadRequest("Question number starts at 1".to_string()));
        }
        let taken = tables
            .questions
            .values()
            .any(|q| q.exam_id == exam_id && q.number == seed.number);
        if taken {
            return Err(AppError::Conflict(format!(
                "Question number {} already exists",
                seed.number
            )));
        }

        let question = Question {
            id: tables.next_id(),
            exam_id,
            number: seed.number,
            statement: seed.statement,
            question_type: seed.question_type,
            options: seed.options,
            answer: seed.answer,
        };
        tables.questions.insert(question.id, question.clone());

        let mut ordered: Vec<(i32, i64)> = tables
            .questions
            .values()
            .filter(|q| q.exam_id == exam_id)
            .map(|q| (q.number, q.id))
            .collect();
        ordered.sort_unstable();
        if let Some(exam) = tables.exams.get_mut(&exam_id) {
            exam.question_ids = ordered.into_iter().map(|(_, id)| id).collect();
        }

        Ok(question)
    }

    pub fn exam(&self, exam_id: i64) -> Option<Exam> {
        self.tables().exams.get(&exam_id).cloned()
    }

    /// Every report stored for a session, oldest first.
    pub fn reports_for(&self, session_id: i64) -> Vec<Report> {
        self.tables()
            .reports
            .iter()
            .filter(|r| r.session_id == session_id)
            .cloned()
            .collect()
    }

    pub fn session_count(&self) -> usize {
        self.tables().sessions.len()
    }
}

#[async_trait]
impl ExamRepository for MemoryStore {
    async fn find_exam(&self, exam_id: i64) -> Result<Option<Exam>, AppError> {
        self.check_available()?;
        Ok(self.tables().exams.get(&exam_id).cloned())
    }

    async fn list_open_exams(&self, now: DateTime<Utc>) -> Result<Vec<Exam>, AppError> {
        self.check_available()?;
        let mut open: Vec<Exam> = self
            .tables()
            .exams
            .values()
            .filter(|e| e.is_open_at(now))
            .cloned()
            .collect();
        open.sort_by_key(|e| (e.start_at, e.id));
        Ok(open)
    }

    async fn find_questions(&self, exam_id: i64) -> Result<Vec<Question>, AppError> {
        self.check_available()?;
        let mut questions: Vec<Question> = self
            .tables()
            .questions
            .values()
            .filter(|q| q.exam_id == exam_id)
            .cloned()
            .collect();
        questions.sort_by_key(|q| q.number);
        Ok(questions)
    }
}

#[async_trait]
impl SessionRepository for MemoryStore {
    async fn find_by_student_and_exam(
        &self,
        student_id: &str,
        exam_id: i64,
    ) -> Result<Option<Session>, AppError> {
        self.check_available()?;
        Ok(self
            .tables()
            .sessions
            .values()
            .find(|s| s.student_id == student_id && s.exam_id == exam_id)
            .cloned())
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<Session>, AppError> {
        self.check_available()?;
        Ok(self
            .tables()
            .sessions
            .values()
            .find(|s| s.token == token)
            .cloned())
    }

    async fn find_by_id(&self, session_id: i64) -> Result<Option<Session>, AppError> {
        self.check_available()?;
        Ok(self.tables().sessions.get(&session_id).cloned())
    }

    async fn insert_session(&self, session: &NewSession) -> Result<SessionInsert, AppError> {
        self.check_available()?;
        let mut tables = self.tables();

        let existing = tables
            .sessions
            .values()
            .find(|s| s.student_id == session.student_id && s.exam_id == session.exam_id);
        if let Some(existing) = existing {
            return Ok(SessionInsert::AlreadyExists(existing.clone()));
        }
        if tables.sessions.values().any(|s| s.token == session.token) {
            return Err(AppError::InternalServerError(
                "duplicate session token".to_string(),
            ));
        }

        let stored = Session {
            id: tables.next_id(),
            student_id: session.student_id.clone(),
            exam_id: session.exam_id,
            token: session.token.clone(),
            started_at: session.started_at,
            expires_at: session.expires_at,
            finished_at: None,
            status: SessionStatus::Active,
            current_question_number: 1,
            responses: HashMap::new(),
        };
        tables.sessions.insert(stored.id, stored.clone());
        Ok(SessionInsert::Created(stored))
    }

    async fn record_response(
        &self,
        token: &str,
        question_id: i64,
        answer_text: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        self.check_available()?;
        let mut tables = self.tables();
        match tables.session_by_token_mut(token) {
            Some(s) if s.status == SessionStatus::Active && s.expires_at >= now => {
                s.responses.insert(question_id, answer_text.to_owned());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn transition(
        &self,
        token: &str,
        transition: SessionTransition,
    ) -> Result<Option<Session>, AppError> {
        self.check_available()?;
        let mut tables = self.tables();
        let Some(session) = tables.session_by_token_mut(token) else {
            return Ok(None);
        };
        let Some(next) = session.status.apply(transition) else {
            return Ok(None);
        };
        session.status = next;
        if let Some(at) = transition.finished_at() {
            session.finished_at = Some(at);
        }
        Ok(Some(session.clone()))
    }
}

#[async_trait]
impl ReportRepository for MemoryStore {
    async fn find_by_session(&self, session_id: i64) -> Result<Option<Report>, AppError> {
        self.check_available()?;
        Ok(self
            .tables()
            .reports
            .iter()
            .find(|r| r.session_id == session_id)
            .cloned())
    }

    async fn insert_report(&self, report: &NewReport) -> Result<Report, AppError> {
        self.check_available()?;
        let mut tables = self.tables();
        let stored = Report {
            id: tables.next_id(),
            student_id: report.student_id.clone(),
            exam_id: report.exam_id,
            session_id: report.session_id,
            score: report.score,
            total: report.total,
            percentage: report.percentage,
            created_at: report.created_at,
        };
        tables.reports.push(stored.clone());
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn seed_exam(store: &MemoryStore) -> Exam {
        let start = Utc.with_ymd_and_hms(2026, 6, 1, 8, 0, 0).unwrap();
        store.add_exam(ExamSeed {
            title: "History".into(),
            subject: "Humanities".into(),
            start_at: start,
            end_at: start + Duration::hours(8),
            duration_minutes: 30,
        })
    }

    #[test]
    fn test_question_ids_follow_question_numbers() {
        let store = MemoryStore::new();
        let exam = seed_exam(&store);
        let third = store.add_question(exam.id, QuestionSeed::mcq(3, "a")).unwrap();
        let first = store.add_question(exam.id, QuestionSeed::mcq(1, "b")).unwrap();

        let stored = store.exam(exam.id).unwrap();
        assert_eq!(stored.question_ids, vec![first.id, third.id]);
    }

    #[test]
    fn test_question_number_unique_per_exam() {
        let store = MemoryStore::new();
        let exam = seed_exam(&store);
        store.add_question(exam.id, QuestionSeed::mcq(1, "a")).unwrap();
        let dup = store.add_question(exam.id, QuestionSeed::open_ended(1));
        assert!(matches!(dup, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_insert_session_is_unique_per_student_and_exam() {
        let store = MemoryStore::new();
        let exam = seed_exam(&store);
        let now = exam.start_at;

        let first = store
            .insert_session(&NewSession::begin("s1", &exam, now))
            .await
            .unwrap();
        let second = store
            .insert_session(&NewSession::begin("s1", &exam, now))
            .await
            .unwrap();

        let SessionInsert::Created(created) = first else {
            panic!("first insert should create");
        };
        assert_eq!(second, SessionInsert::AlreadyExists(created));
        assert_eq!(store.session_count(), 1);
    }

    #[tokio::test]
    async fn test_record_response_respects_guard() {
        let store = MemoryStore::new();
        let exam = seed_exam(&store);
        let now = exam.start_at;
        let new = NewSession::begin("s1", &exam, now);
        store.insert_session(&new).await.unwrap();

        assert!(store.record_response(&new.token, 1, "a", now).await.unwrap());
        assert!(
            !store
                .record_response(&new.token, 1, "b", new.expires_at + Duration::seconds(1))
                .await
                .unwrap()
        );
        assert!(!store.record_response("unknown", 1, "a", now).await.unwrap());

        let session = store.find_by_token(&new.token).await.unwrap().unwrap();
        assert_eq!(session.responses.get(&1).map(String::as_str), Some("a"));
    }

    #[tokio::test]
    async fn test_outage_injection() {
        let store = MemoryStore::new();
        store.fail_next(1);
        assert!(matches!(
            store.find_exam(1).await,
            Err(AppError::Unavailable(_))
        ));
        assert_eq!(store.find_exam(1).await, Ok(None));
    }
}
