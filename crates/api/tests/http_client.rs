use std::time::Duration;

use mockito::{Matcher, Server};
use study_api::{
    ApiError, AuthApi, ClientConfig, DifficultyApi, HttpStudyApi, RetryPolicy, ScoringApi,
    SessionApi,
};
use study_core::model::{AnswerEvent, DifficultyTier, FlashcardId, SessionId, SessionStatus};

fn fast_retry(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
    }
}

fn client_for(server: &Server, token: Option<&str>, max_retries: u32) -> HttpStudyApi {
    let mut config = ClientConfig::new(&format!("{}/api", server.url()))
        .unwrap()
        .with_retry(fast_retry(max_retries));
    if let Some(token) = token {
        config = config.with_access_token(token);
    }
    HttpStudyApi::new(config).unwrap()
}

#[tokio::test]
async fn start_session_decodes_service_shape() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/study/session/start")
        .match_query(Matcher::UrlEncoded("token".into(), "tok".into()))
        .match_body(Matcher::PartialJsonString(
            r#"{"topic": "Biology", "target_count": 2}"#.into(),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"id": 12, "user_id": 1, "topic": "Biology", "status": "active",
                "cards_studied": 0, "cards_correct": 0, "accuracy": 0.0,
                "duration_minutes": 0.0, "created_at": "2024-05-01T08:00:00.000001",
                "completed_at": null}"#,
        )
        .create_async()
        .await;

    let api = client_for(&server, Some("tok"), 0);
    let session = api.start_session(Some("Biology"), 2).await.unwrap();

    mock.assert_async().await;
    assert_eq!(session.id(), SessionId::new(12));
    assert_eq!(session.status(), SessionStatus::Active);
    assert_eq!(session.topic(), Some("Biology"));
}

#[tokio::test]
async fn fetch_card_batch_passes_tier_and_keeps_order() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/study/cards-for-session/7")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("limit".into(), "3".into()),
            Matcher::UrlEncoded("difficulty".into(), "hard".into()),
        ]))
        .match_header("authorization", "Bearer tok")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"cards": [
                {"id": 30, "question": "Q30", "answer": "A30", "topic": "t", "difficulty": "hard"},
                {"id": 10, "question": "Q10", "topic": "t", "difficulty": "easy"},
                {"id": 20, "question": "Q20", "answer": "A20", "difficulty": "weird"}
            ]}"#,
        )
        .create_async()
        .await;

    let api = client_for(&server, Some("tok"), 0);
    let cards = api
        .fetch_card_batch(SessionId::new(7), Some(DifficultyTier::Hard), 3)
        .await
        .unwrap();

    mock.assert_async().await;
    let ids: Vec<u64> = cards.iter().map(|c| c.id.value()).collect();
    assert_eq!(ids, vec![30, 10, 20]);
    assert_eq!(cards[1].answer, "");
    assert_eq!(cards[2].difficulty, DifficultyTier::Medium);
}

#[tokio::test]
async fn unauthorized_clears_cached_token() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/api/study/adaptive-difficulty/3")
        .match_query(Matcher::Any)
        .with_status(401)
        .with_body(r#"{"detail": "Invalid token"}"#)
        .create_async()
        .await;

    let api = client_for(&server, Some("expired"), 2);
    assert!(api.is_authenticated());

    let err = api.recommend_difficulty(SessionId::new(3)).await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized));
    assert!(!api.is_authenticated());
    assert_eq!(api.credentials().token(), None);
}

#[tokio::test]
async fn submit_answer_is_never_retried() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/study/quiz/answer")
        .match_query(Matcher::UrlEncoded("session_id".into(), "5".into()))
        .match_body(Matcher::Json(serde_json::json!({
            "flashcard_id": 44,
            "is_correct": true,
            "response_time_seconds": 6
        })))
        .with_status(503)
        .with_body(r#"{"detail": "overloaded"}"#)
        .expect(1)
        .create_async()
        .await;

    let api = client_for(&server, None, 3);
    let event = AnswerEvent::new(SessionId::new(5), FlashcardId::new(44), true, 6);
    let err = api.submit_answer(&event).await.unwrap_err();

    mock.assert_async().await;
    assert!(err.is_transient());
    match err {
        ApiError::Status { status, message } => {
            assert_eq!(status, 503);
            assert_eq!(message, "overloaded");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn idempotent_calls_retry_up_to_the_limit() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/study/session/9/complete")
        .with_status(502)
        .expect(3)
        .create_async()
        .await;

    let api = client_for(&server, None, 2);
    let err = api.complete_session(SessionId::new(9)).await.unwrap_err();

    mock.assert_async().await;
    assert!(matches!(err, ApiError::Status { status: 502, .. }));
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/study/session/9/complete")
        .with_status(404)
        .with_body(r#"{"detail": "Session not found"}"#)
        .expect(1)
        .create_async()
        .await;

    let api = client_for(&server, None, 2);
    let err = api.complete_session(SessionId::new(9)).await.unwrap_err();

    mock.assert_async().await;
    assert!(err.is_validation());
}

#[tokio::test]
async fn login_stores_token_for_later_calls() {
    let mut server = Server::new_async().await;
    let _login = server
        .mock("POST", "/api/auth/login")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"access_token": "fresh", "token_type": "bearer",
                "user": {"id": 1, "email": "a@b.c", "username": "ada",
                         "created_at": "2024-01-01T00:00:00"}}"#,
        )
        .create_async()
        .await;
    let recommend = server
        .mock("GET", "/api/study/adaptive-difficulty/1")
        .match_query(Matcher::UrlEncoded("token".into(), "fresh".into()))
        .match_header("authorization", "Bearer fresh")
        .with_status(200)
        .with_body(r#"{"recommended_difficulty": "expert", "accuracy": 0.9, "attempts": 10}"#)
        .create_async()
        .await;

    let api = client_for(&server, None, 0);
    let auth = api.login("a@b.c", "secret").await.unwrap();
    assert_eq!(auth.username.as_deref(), Some("ada"));

    let recommendation = api.recommend_difficulty(SessionId::new(1)).await.unwrap();
    recommend.assert_async().await;
    assert_eq!(recommendation.recommended, "expert");
    assert_eq!(recommendation.attempts, Some(10));
}
