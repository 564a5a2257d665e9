// tests/api_tests.rs

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use exam_sessions::{
    config::{Config, ExamWindowPolicy, RetryPolicy},
    models::exam::Exam,
    routes,
    state::AppState,
    store::{
        MemoryStore,
        memory::{ExamSeed, QuestionSeed},
    },
    utils::{clock::ManualClock, jwt::Claims},
};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::{Value, json};

const SECRET: &str = "test_secret_for_integration_tests";

struct TestApp {
    address: String,
    client: reqwest::Client,
    clock: Arc<ManualClock>,
    exam: Exam,
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    /// Mints a token the way the identity service does.
    fn bearer(student: &str) -> String {
        let claims = Claims {
            sub: student.to_string(),
            role: "student".to_string(),
            exp: (Utc::now() + Duration::minutes(10)).timestamp() as usize,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .expect("Failed to sign token");
        format!("Bearer {}", token)
    }

    async fn start(&self, student: &str, exam_id: i64) -> reqwest::Response {
        self.client
            .post(self.url("/api/exams/sessions/start"))
            .header("Authorization", Self::bearer(student))
            .json(&json!({ "exam_id": exam_id }))
            .send()
            .await
            .expect("Failed to execute request")
    }

    async fn submit(&self, token: &str, question_id: i64, answer: &str) -> reqwest::Response {
        self.client
            .post(self.url("/api/exams/sessions/submit-answer"))
            .header("Authorization", Self::bearer("student-1"))
            .json(&json!({
                "session_token": token,
                "question_id": question_id,
                "answer_text": answer,
            }))
            .send()
            .await
            .expect("Failed to execute request")
    }

    async fn complete(&self, token: &str) -> reqwest::Response {
        self.client
            .post(self.url(&format!("/api/exams/sessions/complete/{}", token)))
            .header("Authorization", Self::bearer("student-1"))
            .send()
            .await
            .expect("Failed to execute request")
    }

    async fn report(&self, session_id: i64) -> reqwest::Response {
        self.client
            .get(self.url(&format!("/api/reports/session/{}", session_id)))
            .header("Authorization", Self::bearer("student-1"))
            .send()
            .await
            .expect("Failed to execute request")
    }
}

/// Spawns the app on a random port over an in-memory store seeded with one
/// exam of three MCQ questions keyed b, c, a.
async fn spawn_app() -> TestApp {
    let start = Utc.with_ymd_and_hms(2026, 10, 1, 8, 0, 0).unwrap();
    let store = Arc::new(MemoryStore::new());
    let exam = store.add_exam(ExamSeed {
        title: "Final".into(),
        subject: "Biology".into(),
        start_at: start,
        end_at: start + Duration::hours(10),
        duration_minutes: 30,
    });
    for (number, key) in [(1, "b"), (2, "c"), (3, "a")] {
        store
            .add_question(exam.id, QuestionSeed::mcq(number, key))
            .expect("Failed to seed question");
    }
    let exam = store.exam(exam.id).expect("Seeded exam missing");

    let config = Config {
        database_url: "postgres://unused".to_string(),
        database_max_connections: 1,
        jwt_secret: SECRET.to_string(),
        rust_log: "error".to_string(),
        exam_window: ExamWindowPolicy::Ignore,
        store_retry: RetryPolicy::none(),
    };
    let clock = Arc::new(ManualClock::new(start + Duration::minutes(5)));
    let state = AppState::new(config, store, clock.clone());
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address,
        client: reqwest::Client::new(),
        clock,
        exam,
    }
}

#[tokio::test]
async fn unknown_route_is_404() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(app.url("/random_path_that_does_not_exist"))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn requests_without_token_are_rejected() {
    let app = spawn_app().await;

    let response = app
        .client
        .post(app.url("/api/exams/sessions/start"))
        .json(&json!({ "exam_id": app.exam.id }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn questions_listing_hides_answer_keys() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(app.url(&format!("/api/exams/{}/questions", app.exam.id)))
        .header("Authorization", TestApp::bearer("student-1"))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 200);
    let questions: Vec<Value> = response.json().await.unwrap();
    assert_eq!(questions.len(), 3);
    for q in &questions {
        assert!(q.get("answer").is_none());
    }
}

#[tokio::test]
async fn active_exams_listing() {
    let app = spawn_app().await;

    let open: Vec<Value> = app
        .client
        .get(app.url("/api/exams/active"))
        .header("Authorization", TestApp::bearer("student-1"))
        .send()
        .await
        .expect("Failed to execute request")
        .json()
        .await
        .unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0]["id"], app.exam.id);

    app.clock.advance(Duration::days(1));
    let closed: Vec<Value> = app
        .client
        .get(app.url("/api/exams/active"))
        .header("Authorization", TestApp::bearer("student-1"))
        .send()
        .await
        .expect("Failed to execute request")
        .json()
        .await
        .unwrap();
    assert!(closed.is_empty());
}

#[tokio::test]
async fn start_unknown_exam_is_404() {
    let app = spawn_app().await;
    let response = app.start("student-1", 9_999).await;
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn start_is_idempotent() {
    let app = spawn_app().await;

    let first: Value = app.start("student-1", app.exam.id).await.json().await.unwrap();
    let second: Value = app.start("student-1", app.exam.id).await.json().await.unwrap();

    assert_eq!(first["token"], second["token"]);
    assert_eq!(first["status"], "active");
    assert_eq!(first["current_question_number"], 1);
}

#[tokio::test]
async fn full_exam_flow() {
    let app = spawn_app().await;
    let q = &app.exam.question_ids;

    // 1. Start
    let session: Value = app.start("student-1", app.exam.id).await.json().await.unwrap();
    let token = session["token"].as_str().expect("Token not found").to_string();

    // 2. Answer (second answer for q1 replaces the first)
    for (qid, answer) in [(q[0], "a"), (q[0], "B"), (q[1], "X"), (q[2], "a")] {
        let response = app.submit(&token, qid, answer).await;
        assert_eq!(response.status().as_u16(), 200);
        let ack: Value = response.json().await.unwrap();
        assert_eq!(ack["success"], true);
    }

    // 3. Complete
    let response = app.complete(&token).await;
    assert_eq!(response.status().as_u16(), 200);
    let receipt: Value = response.json().await.unwrap();
    let session_id = receipt["session_id"].as_i64().expect("session_id missing");

    // 4. Second completion is refused
    assert_eq!(app.complete(&token).await.status().as_u16(), 409);

    // 5. Report is computed on first access, then served from the store
    let first: Value = app.report(session_id).await.json().await.unwrap();
    assert_eq!(first["score"], 2);
    assert_eq!(first["total"], 3);
    let percentage = first["percentage"].as_f64().unwrap();
    assert!((percentage - 66.67).abs() < 0.01);

    let second: Value = app.report(session_id).await.json().await.unwrap();
    assert_eq!(first["created_at"], second["created_at"]);

    // 6. Completed attempt cannot be restarted
    assert_eq!(app.start("student-1", app.exam.id).await.status().as_u16(), 409);
}

#[tokio::test]
async fn late_submission_expires_session() {
    let app = spawn_app().await;
    let session: Value = app.start("student-1", app.exam.id).await.json().await.unwrap();
    let token = session["token"].as_str().unwrap().to_string();

    app.clock.advance(Duration::minutes(31));
    let response = app.submit(&token, app.exam.question_ids[0], "b").await;
    assert_eq!(response.status().as_u16(), 410);

    let resumed: Value = app.start("student-1", app.exam.id).await.json().await.unwrap();
    assert_eq!(resumed["status"], "expired");
    assert_eq!(resumed["responses"], json!({}));
}

#[tokio::test]
async fn malformed_submission_is_400() {
    let app = spawn_app().await;

    let response = app.submit("not-a-uuid", app.exam.question_ids[0], "b").await;
    assert_eq!(response.status().as_u16(), 400);

    let session: Value = app.start("student-1", app.exam.id).await.json().await.unwrap();
    let token = session["token"].as_str().unwrap().to_string();
    let response = app.submit(&token, 0, "b").await;
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn report_for_unknown_session_is_404() {
    let app = spawn_app().await;
    assert_eq!(app.report(123_456).await.status().as_u16(), 404);
}

#[tokio::test]
async fn concurrent_submissions_over_http_are_all_kept() {
    let app = spawn_app().await;
    let session: Value = app.start("student-1", app.exam.id).await.json().await.unwrap();
    let token = session["token"].as_str().unwrap().to_string();

    let mut handles = Vec::new();
    for qid in app.exam.question_ids.iter().copied() {
        let client = app.client.clone();
        let url = app.url("/api/exams/sessions/submit-answer");
        let body = json!({ "session_token": token, "question_id": qid, "answer_text": "a" });
        handles.push(tokio::spawn(async move {
            client
                .post(url)
                .header("Authorization", TestApp::bearer("student-1"))
                .json(&body)
                .send()
                .await
                .expect("Failed to execute request")
                .status()
                .as_u16()
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap(), 200);
    }

    let resumed: Value = app.start("student-1", app.exam.id).await.json().await.unwrap();
    assert_eq!(resumed["responses"].as_object().unwrap().len(), 3);
}

#[tokio::test]
async fn report_for_session_in_progress_scores_current_answers() {
    let app = spawn_app().await;
    let session: Value = app.start("student-1", app.exam.id).await.json().await.unwrap();
    let token = session["token"].as_str().unwrap().to_string();
    let session_id = session["session_id"].as_i64().unwrap();

    app.submit(&token, app.exam.question_ids[0], "b").await;

    let response = app.report(session_id).await;
    assert_eq!(response.status().as_u16(), 200);
    let report: Value = response.json().await.unwrap();
    assert_eq!(report["score"], 1);
    assert_eq!(report["total"], 3);
}
