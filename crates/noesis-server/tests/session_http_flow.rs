//! End-to-end HTTP tests for the session lifecycle endpoints, driven
//! against an in-memory repository so no live Postgres is required.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use noesis_engine::SessionCompletionMode;
use noesis_repository::fixtures::seeded_repository;
use noesis_server::state::AppState;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn test_app() -> (axum::Router, noesis_repository::fixtures::Fixture) {
    let (repo, fixture) = seeded_repository().await;
    let state = AppState::from_repo(Arc::new(repo), SessionCompletionMode::ItemExhaustion);
    (noesis_server::build_router(state, 1_000), fixture)
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_check_reports_ok() {
    let (app, _fixture) = test_app().await;
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn create_session_then_fetch_next_question() {
    let (app, fixture) = test_app().await;

    let create_response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/sessions")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({
                        "userId": fixture.user_id,
                        "quizId": fixture.quiz_id,
                        "condition": "adaptive"
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(create_response.status(), StatusCode::CREATED);
    let created = json_body(create_response).await;
    assert_eq!(created["theta"], -0.780);
    assert_eq!(created["thetaSd"], 0.543);
    let session_id = created["sessionId"].as_str().unwrap().to_string();

    let next_response = app
        .oneshot(
            Request::builder()
                .uri(format!("/sessions/{session_id}/next-question"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(next_response.status(), StatusCode::OK);
    let next = json_body(next_response).await;
    assert_eq!(
        next["questionId"].as_str().unwrap(),
        fixture.question_id("q-002").to_string()
    );
    assert!(next["options"]["A"].is_string());
    assert!(next.get("completed").is_none());
}

#[tokio::test]
async fn submitting_answer_updates_theta_and_bkt() {
    let (app, fixture) = test_app().await;

    let create_response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/sessions")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({"userId": fixture.user_id, "quizId": fixture.quiz_id}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    let created = json_body(create_response).await;
    let session_id = created["sessionId"].as_str().unwrap().to_string();
    let q002 = fixture.question_id("q-002");

    let answer_response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/sessions/{session_id}/answer"))
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({
                        "questionId": q002,
                        "selectedAnswer": "a",
                        "responseTimeMs": 1200
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(answer_response.status(), StatusCode::OK);
    let answered = json_body(answer_response).await;
    assert_eq!(answered["correct"], true);
    assert!(answered["theta"]["after"].as_f64().unwrap() > answered["theta"]["before"].as_f64().unwrap());
    assert!(answered["bkt"]["pLearned_after"].as_f64().unwrap() > answered["bkt"]["pLearned_before"].as_f64().unwrap());

    // Duplicate submission for the same question is a bad request.
    let duplicate_response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/sessions/{session_id}/answer"))
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({"questionId": q002, "selectedAnswer": "B"}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(duplicate_response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn session_completes_after_all_items_answered() {
    let (app, fixture) = test_app().await;

    let create_response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/sessions")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({"userId": fixture.user_id, "quizId": fixture.quiz_id}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    let created = json_body(create_response).await;
    let session_id = created["sessionId"].as_str().unwrap().to_string();

    for slug in ["q-001", "q-002", "q-003", "q-004", "q-005"] {
        let question_id = fixture.question_id(slug);
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/sessions/{session_id}/answer"))
                    .header("content-type", "application/json")
                    .body(Body::from(
                        json!({"questionId": question_id, "selectedAnswer": "A"}).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let next_response = app
        .oneshot(
            Request::builder()
                .uri(format!("/sessions/{session_id}/next-question"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(next_response.status(), StatusCode::OK);
    let completed = json_body(next_response).await;
    assert_eq!(completed["completed"], true);
    assert_eq!(completed["totalAnswered"], 5);
}

#[tokio::test]
async fn session_summary_reports_kc_mastery_progress() {
    let (app, fixture) = test_app().await;

    let create_response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/sessions")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({"userId": fixture.user_id, "quizId": fixture.quiz_id}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    let created = json_body(create_response).await;
    let session_id = created["sessionId"].as_str().unwrap().to_string();

    let summary_response = app
        .oneshot(
            Request::builder()
                .uri(format!("/sessions/{session_id}/summary"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(summary_response.status(), StatusCode::OK);
    let summary = json_body(summary_response).await;
    assert_eq!(summary["total"], 1);
    assert_eq!(summary["notStarted"], 1);
    assert_eq!(summary["mastered"], 0);
}
