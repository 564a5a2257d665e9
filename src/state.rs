use std::sync::Arc;

use crate::config::Config;
use crate::services::{AnswerRecorder, ExamCatalog, ReportService, Scorer, SessionManager};
use crate::store::{ExamRepository, ReportRepository, SessionRepository};
use crate::utils::clock::Clock;
use axum::extract::FromRef;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub catalog: ExamCatalog,
    pub sessions: SessionManager,
    pub answers: AnswerRecorder,
    pub reports: ReportService,
}

impl AppState {
    /// Wires every service against one store implementing all repositories.
    pub fn new<S>(config: Config, store: Arc<S>, clock: Arc<dyn Clock>) -> Self
    where
        S: ExamRepository + SessionRepository + ReportRepository + 'static,
    {
        let exams: Arc<dyn ExamRepository> = store.clone();
        let sessions: Arc<dyn SessionRepository> = store.clone();
        let reports: Arc<dyn ReportRepository> = store;
        let retry = config.store_retry;

        let scorer = Scorer::new(exams.clone(), sessions.clone(), reports.clone(), clock.clone())
            .with_retry(retry);

        Self {
            catalog: ExamCatalog::new(exams.clone(), clock.clone()).with_retry(retry),
            sessions: SessionManager::new(exams, sessions.clone(), clock.clone())
                .with_window_policy(config.exam_window)
                .with_retry(retry),
            answers: AnswerRecorder::new(sessions, clock).with_retry(retry),
            reports: ReportService::new(reports, scorer).with_retry(retry),
            config,
        }
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
