// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method},
    middleware,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{exam, report},
    state::AppState,
    utils::jwt::auth_middleware,
};

/// Assembles the main application router.
///
/// * Merges the exam and report sub-routers, all behind JWT authentication.
/// * Applies global middleware (Trace, CORS).
/// * Injects the application state (services over the store).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let exam_routes = Router::new()
        .route("/active", get(exam::list_active_exams))
        .route("/{exam_id}", get(exam::get_exam))
        .route("/{exam_id}/questions", get(exam::get_exam_questions))
        .route("/sessions/start", post(exam::start_session))
        .route("/sessions/submit-answer", post(exam::submit_answer))
        .route(
            "/sessions/complete/{session_token}",
            post(exam::complete_session),
        );

    let report_routes = Router::new().route("/session/{session_id}", get(report::get_report));

    let api = Router::new()
        .nest("/exams", exam_routes)
        .nest("/reports", report_routes)
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api", api)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
    };
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::{
        config::{Config, ExamWindowPolicy, RetryPolicy},
        services::testing::Fixture,
        store::SessionRepository,
        utils::jwt::sign_jwt,
    };

    const SECRET: &str = "router_test_secret";

    fn app(fx: &Fixture, window: ExamWindowPolicy) -> Router {
        let config = Config {
            database_url: String::new(),
            database_max_connections: 1,
            jwt_secret: SECRET.to_string(),
            rust_log: "error".to_string(),
            exam_window: window,
            store_retry: RetryPolicy::none(),
        };
        create_router(AppState::new(config, fx.store.clone(), fx.clock.clone()))
    }

    fn json_request(
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_invalid_token_is_unauthorized() {
        let fx = Fixture::with_keys(&["a"]);
        let response = app(&fx, ExamWindowPolicy::Ignore)
            .oneshot(json_request(Method::GET, "/api/exams/active", Some("garbage"), None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(body_json(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn test_start_uses_token_subject_as_student() {
        let fx = Fixture::with_keys(&["a"]);
        let token = sign_jwt("student-7", "student", SECRET, 60).unwrap();

        let response = app(&fx, ExamWindowPolicy::Ignore)
            .oneshot(json_request(
                Method::POST,
                "/api/exams/sessions/start",
                Some(&token),
                Some(json!({ "exam_id": fx.exam.id })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let session = fx
            .store
            .find_by_student_and_exam("student-7", fx.exam.id)
            .await
            .unwrap();
        assert!(session.is_some());
    }

    #[tokio::test]
    async fn test_enforced_window_rejects_closed_exam() {
        let fx = Fixture::with_keys(&["a"]);
        fx.clock.advance(chrono::Duration::days(2));
        let token = sign_jwt("student-7", "student", SECRET, 60).unwrap();

        let response = app(&fx, ExamWindowPolicy::Enforce)
            .oneshot(json_request(
                Method::POST,
                "/api/exams/sessions/start",
                Some(&token),
                Some(json!({ "exam_id": fx.exam.id })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_complete_with_malformed_token_is_bad_request() {
        let fx = Fixture::with_keys(&["a"]);
        let token = sign_jwt("student-7", "student", SECRET, 60).unwrap();

        let response = app(&fx, ExamWindowPolicy::Ignore)
            .oneshot(json_request(
                Method::POST,
                "/api/exams/sessions/complete/not-a-uuid",
                Some(&token),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
