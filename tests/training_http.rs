mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::app::spawn_test_app;
use common::fixtures::{dictionary_payload, training_payload, SubmitMode, THREE_WORDS};
use common::http::{assert_error, call, data, envelope, send};

fn correct_for(word_id: &str) -> &'static str {
    THREE_WORDS
        .iter()
        .find(|(id, ..)| *id == word_id)
        .map(|(_, _, tid, _)| *tid)
        .expect("fixture word")
}

#[tokio::test]
async fn it_health_live_and_ready() {
    let app = spawn_test_app().await;

    let live = send(&app.app, Method::GET, "/health/live", None, &[]).await;
    assert_eq!(live.status(), StatusCode::OK);

    let ready = send(&app.app, Method::GET, "/health/ready", None, &[]).await;
    let (status, _, body) = envelope(ready).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ready"], true);
    assert_eq!(body["activeSessions"], 0);
}

#[tokio::test]
async fn it_rejects_missing_or_wrong_transport_token() {
    let app = spawn_test_app().await;

    let resp = send(&app.app, Method::GET, "/api/training/42/cache", None, &[]).await;
    let (status, headers, body) = envelope(resp).await;
    assert_error(status, &body, StatusCode::UNAUTHORIZED, "AUTH_UNAUTHORIZED");
    assert!(headers.get("x-request-id").is_some());

    let resp = send(
        &app.app,
        Method::GET,
        "/api/training/42/cache",
        None,
        &[("authorization", "Bearer nope".to_string())],
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn it_rejects_malformed_user_ids() {
    let app = spawn_test_app().await;

    let (status, body) = call(&app, Method::GET, "/api/training/a%3Ab/cache", None).await;
    assert_error(status, &body, StatusCode::BAD_REQUEST, "INVALID_USER_ID");
}

#[tokio::test]
async fn it_runs_a_training_over_http() {
    let app = spawn_test_app().await;
    app.provider.push_fetch(vec![training_payload(&THREE_WORDS)]);
    let start = Some(json!({"trainingType": "remoteSynced"}));

    let (status, body) = call(&app, Method::POST, "/api/training/42/start", start).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["total"], 3);
    let mut word = body["data"]["first"].clone();

    let (status, body) = call(&app, Method::POST, "/api/training/42/start", Some(json!({}))).await;
    assert_error(status, &body, StatusCode::CONFLICT, "SESSION_ACTIVE");

    let mut last = serde_json::Value::Null;
    for _ in 0..3 {
        let word_id = word["wordId"].as_str().unwrap().to_string();
        let answer = json!({
            "wordIndex": word["wordIndex"],
            "selectedOptionId": correct_for(&word_id),
        });
        let (status, body) = call(&app, Method::POST, "/api/training/42/answer", Some(answer)).await;
        let outcome = data(status, &body);
        assert_eq!(outcome["correct"], true);
        last = outcome["next"].clone();
        if last["kind"] == "word" {
            word = last["data"].clone();
        }
    }
    assert_eq!(last["kind"], "finished");
    assert_eq!(last["data"]["submission"]["status"], "sent");
    assert_eq!(last["data"]["cacheCleanup"]["status"], "clearedHadData");

    let (status, body) = call(&app, Method::GET, "/api/training/42/report", None).await;
    let report = data(status, &body);
    assert_eq!(report["report"]["tally"]["correct"], 3);
    assert!(report["text"].as_str().unwrap().contains("Correct: 3 of 3"));

    let (status, body) = call(&app, Method::GET, "/api/training/42/cache", None).await;
    assert_eq!(data(status, &body)["hasPending"], false);
}

#[tokio::test]
async fn it_reports_provider_failures_with_codes() {
    let app = spawn_test_app().await;
    app.provider
        .push_fetch_error(lingua_drill::drill::ProviderError::Auth("expired".into()));

    let start = Some(json!({"trainingType": "remoteSynced"}));
    let (status, body) = call(&app, Method::POST, "/api/training/42/start", start).await;
    assert_error(status, &body, StatusCode::UNPROCESSABLE_ENTITY, "PROVIDER_AUTH");

    let (status, body) = call(&app, Method::POST, "/api/training/42/resend", None).await;
    assert_error(status, &body, StatusCode::NOT_FOUND, "NOTHING_TO_RESEND");

    let answer = Some(json!({"wordIndex": 0, "selectedOptionId": "1"}));
    let (status, body) = call(&app, Method::POST, "/api/training/42/answer", answer).await;
    assert_error(status, &body, StatusCode::NOT_FOUND, "NO_SESSION");
}

#[tokio::test]
async fn it_cancel_always_succeeds() {
    let app = spawn_test_app().await;
    app.provider.push_fetch(vec![training_payload(&THREE_WORDS)]);

    let (status, body) = call(&app, Method::POST, "/api/training/42/cancel", None).await;
    assert_eq!(data(status, &body)["outcome"]["status"], "noSession");

    let start = Some(json!({"trainingType": "remoteSynced"}));
    let (status, _) = call(&app, Method::POST, "/api/training/42/start", start).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = call(&app, Method::POST, "/api/training/42/cancel", None).await;
    assert_eq!(data(status, &body)["outcome"]["status"], "cancelled");
    assert_eq!(app.engine.active_sessions().await, 0);
}

#[tokio::test]
async fn it_syncs_vocabulary_and_reports_due_words() {
    let app = spawn_test_app().await;
    app.provider.set_export(dictionary_payload(&THREE_WORDS));

    let (status, body) = call(&app, Method::POST, "/api/vocabulary/42/sync", None).await;
    assert_eq!(data(status, &body)["added"], 3);

    let (status, body) = call(&app, Method::GET, "/api/vocabulary/42/due?limit=2", None).await;
    let due = data(status, &body);
    assert_eq!(due["due"], 3);
    assert_eq!(due["words"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn it_adds_words_to_the_dictionary() {
    let app = spawn_test_app().await;
    let path = "/api/vocabulary/42/words";

    let (status, body) = call(&app, Method::POST, path, Some(json!({"word": "cat", "translation": "кот"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(data(status, &body)["word"], "cat");
    assert_eq!(app.provider.added().len(), 1);

    let (status, body) = call(&app, Method::POST, path, Some(json!({"word": "", "translation": "кот"}))).await;
    assert_error(status, &body, StatusCode::BAD_REQUEST, "INVALID_WORD");

    app.provider.set_add_mode(SubmitMode::Network);
    let (status, body) = call(&app, Method::POST, path, Some(json!({"word": "dog", "translation": "собака"}))).await;
    assert_error(status, &body, StatusCode::BAD_GATEWAY, "WORD_NOT_ADDED");
    assert_eq!(app.provider.added().len(), 2);
}

#[tokio::test]
async fn it_stores_provider_credentials() {
    let app = spawn_test_app().await;
    let path = "/api/credentials/42";

    let cookies = json!({"cookies": "remember=1; _ym_uid=1690000000123"});
    let (status, body) = call(&app, Method::PUT, path, Some(cookies)).await;
    assert_eq!(data(status, &body)["hasVendorMarker"], true);
    assert!(app.store.get_credential("42").unwrap().is_some());

    let (status, body) = call(&app, Method::PUT, path, Some(json!({"cookies": "  "}))).await;
    assert_error(status, &body, StatusCode::BAD_REQUEST, "INVALID_CREDENTIAL");

    let (status, body) = call(&app, Method::PUT, path, Some(json!({"wrong": true}))).await;
    assert_error(status, &body, StatusCode::BAD_REQUEST, "INVALID_REQUEST_BODY");
}
