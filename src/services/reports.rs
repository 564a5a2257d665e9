// src/services/reports.rs

use std::sync::Arc;

use crate::{
    config::RetryPolicy,
    error::AppError,
    models::report::Report,
    services::scorer::Scorer,
    store::ReportRepository,
    utils::retry::with_retry,
};

/// Report lookup with compute-on-miss.
#[derive(Clone)]
pub struct ReportService {
    reports: Arc<dyn ReportRepository>,
    scorer: Scorer,
    retry: RetryPolicy,
}

impl ReportService {
    pub fn new(reports: Arc<dyn ReportRepository>, scorer: Scorer) -> Self {
        Self {
            reports,
            scorer,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Pure lookup. `None` if the session was never scored.
    pub async fn get_report_by_session(&self, session_id: i64) -> Result<Option<Report>, AppError> {
        with_retry(&self.retry, "find_report", || {
            self.reports.find_by_session(session_id)
        })
        .await
    }

    /// Stored report for the session, scoring it first if there is none yet.
    pub async fn get_or_compute(&self, session_id: i64) -> Result<Report, AppError> {
        if let Some(report) = self.get_report_by_session(session_id).await? {
            return Ok(report);
        }
        tracing::debug!("No report for session {}, computing", session_id);
        self.scorer.calculate_score(session_id).await
    }
}
