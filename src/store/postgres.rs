// src/store/postgres.rs

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, types::Json};

use crate::{
    error::AppError,
    models::{
        exam::Exam,
        question::Question,
        report::{NewReport, Report},
        session::{NewSession, Session, SessionInsert, SessionTransition},
    },
    store::{ExamRepository, ReportRepository, SessionRepository},
};

const SESSION_COLUMNS: &str = "id, student_id, exam_id, session_token, started_at, expires_at, \
     finished_at, status, current_question_number, responses";

const EXAM_COLUMNS: &str = "e.id, e.title, e.subject, e.start_at, e.end_at, e.duration_minutes, \
     ARRAY(SELECT q.id FROM questions q WHERE q.exam_id = e.id ORDER BY q.number) AS question_ids";

const REPORT_COLUMNS: &str =
    "id, student_id, exam_id, session_id, score, total, percentage, created_at";

/// Postgres-backed repositories sharing one connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Row of 'exams' with the ordered question ids aggregated in.
#[derive(FromRow)]
struct ExamRow {
    id: i64,
    title: String,
    subject: String,
    start_at: DateTime<Utc>,
    end_at: DateTime<Utc>,
    duration_minutes: i32,
    question_ids: Vec<i64>,
}

impl From<ExamRow> for Exam {
    fn from(row: ExamRow) -> Self {
        Exam {
            id: row.id,
            title: row.title,
            subject: row.subject,
            start_at: row.start_at,
            end_at: row.end_at,
            duration_minutes: row.duration_minutes,
            question_ids: row.question_ids,
        }
    }
}

/// Row of 'questions'. `type` is a reserved word in Rust, hence the alias.
#[derive(FromRow)]
struct QuestionRow {
    id: i64,
    exam_id: i64,
    number: i32,
    statement: String,
    question_type: String,
    options: Json<Vec<String>>,
    answer: Option<String>,
}

impl TryFrom<QuestionRow> for Question {
    type Error = AppError;

    fn try_from(row: QuestionRow) -> Result<Self, Self::Error> {
        Ok(Question {
            id: row.id,
            exam_id: row.exam_id,
            number: row.number,
            statement: row.statement,
            question_type: row
                .question_type
                .parse()
                .map_err(AppError::InternalServerError)?,
            options: row.options.0,
            answer: row.answer,
        })
    }
}

/// Row of 'exam_sessions'. Responses live in a JSONB object keyed by question id.
#[derive(FromRow)]
struct SessionRow {
    id: i64,
    student_id: String,
    exam_id: i64,
    session_token: String,
    started_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    status: String,
    current_question_number: i32,
    responses: Json<HashMap<i64, String>>,
}

impl TryFrom<SessionRow> for Session {
    type Error = AppError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        Ok(Session {
            id: row.id,
            student_id: row.student_id,
            exam_id: row.exam_id,
            token: row.session_token,
            started_at: row.started_at,
            expires_at: row.expires_at,
            finished_at: row.finished_at,
            status: row.status.parse().map_err(AppError::InternalServerError)?,
            current_question_number: row.current_question_number,
            responses: row.responses.0,
        })
    }
}

fn into_session(row: Option<SessionRow>) -> Result<Option<Session>, AppError> {
    row.map(Session::try_from).transpose()
}

#[async_trait]
impl ExamRepository for PgStore {
    async fn find_exam(&self, exam_id: i64) -> Result<Option<Exam>, AppError> {
        let row = sqlx::query_as::<_, ExamRow>(&format!(
            "SELECT {} FROM exams e WHERE e.id = $1",
            EXAM_COLUMNS
        ))
        .bind(exam_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch exam {}: {:?}", exam_id, e);
            AppError::from(e)
        })?;

        Ok(row.map(Exam::from))
    }

    async fn list_open_exams(&self, now: DateTime<Utc>) -> Result<Vec<Exam>, AppError> {
        let rows = sqlx::query_as::<_, ExamRow>(&format!(
            "SELECT {} FROM exams e WHERE e.start_at <= $1 AND e.end_at >= $1 ORDER BY e.start_at, e.id",
            EXAM_COLUMNS
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list open exams: {:?}", e);
            AppError::from(e)
        })?;

        Ok(rows.into_iter().map(Exam::from).collect())
    }

    async fn find_questions(&self, exam_id: i64) -> Result<Vec<Question>, AppError> {
        let rows = sqlx::query_as::<_, QuestionRow>(
            r#"
            SELECT
                id,
                exam_id,
                number,
                statement,
                type AS question_type,
                options,
                answer
            FROM questions
            WHERE exam_id = $1
            ORDER BY number
            "#,
        )
        .bind(exam_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch questions for exam {}: {:?}", exam_id, e);
            AppError::from(e)
        })?;

        rows.into_iter().map(Question::try_from).collect()
    }
}

#[async_trait]
impl SessionRepository for PgStore {
    async fn find_by_student_and_exam(
        &self,
        student_id: &str,
        exam_id: i64,
    ) -> Result<Option<Session>, AppError> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {} FROM exam_sessions WHERE student_id = $1 AND exam_id = $2",
            SESSION_COLUMNS
        ))
        .bind(student_id)
        .bind(exam_id)
        .fetch_optional(&self.pool)
        .await?;

        into_session(row)
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<Session>, AppError> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {} FROM exam_sessions WHERE session_token = $1",
            SESSION_COLUMNS
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        into_session(row)
    }

    async fn find_by_id(&self, session_id: i64) -> Result<Option<Session>, AppError> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {} FROM exam_sessions WHERE id = $1",
            SESSION_COLUMNS
        ))
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        into_session(row)
    }

    async fn insert_session(&self, session: &NewSession) -> Result<SessionInsert, AppError> {
        // ON CONFLICT turns a concurrent double start into one insert and one no-op.
        let inserted = sqlx::query_as::<_, SessionRow>(&format!(
            r#"
            INSERT INTO exam_sessions
                (student_id, exam_id, session_token, started_at, expires_at,
                 status, current_question_number, responses)
            VALUES ($1, $2, $3, $4, $5, 'active', 1, '{{}}'::jsonb)
            ON CONFLICT (student_id, exam_id) DO NOTHING
            RETURNING {}
            "#,
            SESSION_COLUMNS
        ))
        .bind(&session.student_id)
        .bind(session.exam_id)
        .bind(&session.token)
        .bind(session.started_at)
        .bind(session.expires_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to insert exam session: {:?}", e);
            AppError::from(e)
        })?;

        if let Some(row) = inserted {
            return Ok(SessionInsert::Created(Session::try_from(row)?));
        }

        self.find_by_student_and_exam(&session.student_id, session.exam_id)
            .await?
            .map(SessionInsert::AlreadyExists)
            .ok_or_else(|| {
                AppError::InternalServerError(
                    "Session insert conflicted but no session was found".to_string(),
                )
            })
    }

    async fn record_response(
        &self,
        token: &str,
        question_id: i64,
        answer_text: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        // Field-level merge: concurrent answers to other questions are never overwritten.
        let result = sqlx::query(
            r#"
            UPDATE exam_sessions
            SET responses = responses || jsonb_build_object($2::text, $3::text)
            WHERE session_token = $1
              AND status = 'active'
              AND expires_at >= $4
            "#,
        )
        .bind(token)
        .bind(question_id.to_string())
        .bind(answer_text)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to record response: {:?}", e);
            AppError::from(e)
        })?;

        Ok(result.rows_affected() == 1)
    }

    async fn transition(
        &self,
        token: &str,
        transition: SessionTransition,
    ) -> Result<Option<Session>, AppError> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            r#"
            UPDATE exam_sessions
            SET status = $2,
                finished_at = COALESCE($3, finished_at)
            WHERE session_token = $1
              AND status = 'active'
            RETURNING {}
            "#,
            SESSION_COLUMNS
        ))
        .bind(token)
        .bind(transition.target().as_str())
        .bind(transition.finished_at())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to transition session: {:?}", e);
            AppError::from(e)
        })?;

        into_session(row)
    }
}

#[async_trait]
impl ReportRepository for PgStore {
    async fn find_by_session(&self, session_id: i64) -> Result<Option<Report>, AppError> {
        let report = sqlx::query_as::<_, Report>(&format!(
            "SELECT {} FROM reports WHERE session_id = $1 ORDER BY created_at, id LIMIT 1",
            REPORT_COLUMNS
        ))
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(report)
    }

    async fn insert_report(&self, report: &NewReport) -> Result<Report, AppError> {
        let stored = sqlx::query_as::<_, Report>(&format!(
            r#"
            INSERT INTO reports
                (student_id, exam_id, session_id, score, total, percentage, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            REPORT_COLUMNS
        ))
        .bind(&report.student_id)
        .bind(report.exam_id)
        .bind(report.session_id)
        .bind(report.score)
        .bind(report.total)
        .bind(report.percentage)
        .bind(report.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to insert report: {:?}", e);
            AppError::from(e)
        })?;

        Ok(stored)
    }
}
