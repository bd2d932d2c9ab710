//! Integration tests: train/predict dispatch, contention, persistence, error mapping.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use rec_api::server::{self, AppState};
use rec_classifiers::{ClassifierRegistry, FailingClassifier, GatedClassifier, LogOnlyClassifier};
use rec_lock::FileLockManager;
use rec_scheduler::TrainingCoordinator;
use rec_store::FsModelStore;
use rec_types::{ModelKey, ModelStore};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::util::ServiceExt;

struct TestApp {
    router: axum::Router,
    gated: Arc<GatedClassifier>,
    store: Arc<FsModelStore>,
    dir: TempDir,
}

fn test_app() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FsModelStore::new(dir.path()));
    let store_dyn: Arc<dyn ModelStore> = store.clone();
    let locks = Arc::new(FileLockManager::new(dir.path()));
    let coordinator = Arc::new(TrainingCoordinator::new(locks, Arc::clone(&store_dyn)));
    let gated = Arc::new(GatedClassifier::new());
    let classifiers = ClassifierRegistry::new()
        .with("demo", gated.clone())
        .with("broken", Arc::new(FailingClassifier::new()))
        .with("log_only", Arc::new(LogOnlyClassifier));
    let state = Arc::new(AppState {
        classifiers,
        store: store_dyn,
        coordinator,
        lock_timeout: Duration::from_millis(200),
    });
    TestApp {
        router: server::router(state),
        gated,
        store,
        dir,
    }
}

fn metadata() -> Value {
    json!({ "layer": "ner", "feature": "value", "projectId": "p1" })
}

fn training_body(user: &str) -> Value {
    json!({
        "metadata": metadata(),
        "documents": [{
            "documentId": "d1",
            "userId": user,
            "text": "Alice flew to Paris",
            "annotations": [{ "layer": "ner", "begin": 14, "end": 19, "label": "LOC" }]
        }]
    })
}

fn prediction_body(user: &str, text: &str) -> Value {
    json!({
        "metadata": metadata(),
        "document": { "documentId": "d2", "userId": user, "text": text }
    })
}

async fn post(app: &TestApp, uri: &str, body: &Value) -> (StatusCode, Vec<u8>) {
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let res = app.router.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let body = res.into_body().collect().await.unwrap().to_bytes();
    (status, body.to_vec())
}

async fn get(app: &TestApp, uri: &str) -> (StatusCode, Vec<u8>) {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let res = app.router.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let body = res.into_body().collect().await.unwrap().to_bytes();
    (status, body.to_vec())
}

async fn wait_until_idle(app: &TestApp, classifier: &str, user: &str) {
    for _ in 0..100 {
        let (status, body) = get(app, &format!("/{}/status?user_id={}", classifier, user)).await;
        assert_eq!(status, StatusCode::OK);
        let j: Value = serde_json::from_slice(&body).unwrap();
        if j["training"] == false {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("{}/{} still training", classifier, user);
}

#[tokio::test]
async fn train_busy_other_user_then_predict() {
    let app = test_app();

    let (status, body) = post(&app, "/demo/train", &training_body("u1")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_empty());

    let (status, _) = post(&app, "/demo/train", &training_body("u1")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    let (status, _) = post(&app, "/demo/train", &training_body("u2")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = get(&app, "/demo/status?user_id=u1").await;
    let j: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(j["training"], true);
    assert_eq!(j["hasModel"], false);

    app.gated.open();
    wait_until_idle(&app, "demo", "u1").await;
    wait_until_idle(&app, "demo", "u2").await;
    assert_eq!(app.gated.fit_calls(), 2);

    let (status, body) = post(&app, "/demo/predict", &prediction_body("u1", "Paris is lovely")).await;
    assert_eq!(status, StatusCode::OK);
    let j: Value = serde_json::from_slice(&body).unwrap();
    let annotations = j["document"]["annotations"].as_array().unwrap();
    assert_eq!(annotations.len(), 1);
    assert_eq!(annotations[0]["begin"], 0);
    assert_eq!(annotations[0]["end"], 5);
    assert_eq!(annotations[0]["label"], "LOC");
    assert_eq!(annotations[0]["isPrediction"], true);

    let (status, _) = post(&app, "/demo/train", &training_body("u1")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn unknown_classifier_is_404() {
    let app = test_app();
    let (status, body) = post(&app, "/nope/train", &training_body("u1")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        String::from_utf8(body).unwrap(),
        "Classifier with name [nope] not found!"
    );
    let (status, _) = post(&app, "/nope/predict", &prediction_body("u1", "x")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = get(&app, "/nope/status?user_id=u1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(!app.dir.path().join("nope").exists());
}

#[tokio::test]
async fn predict_without_model_returns_document_unchanged() {
    let app = test_app();
    let (status, body) = post(&app, "/demo/predict", &prediction_body("fresh", "Paris")).await;
    assert_eq!(status, StatusCode::OK);
    let j: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(j["document"]["text"], "Paris");
    assert!(j["document"]["annotations"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn predict_with_corrupt_model_is_500() {
    let app = test_app();
    let key = ModelKey::new("demo", "u1").unwrap();
    let path = app.store.model_path(&key);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, b"{ truncated").unwrap();

    let (status, _) = post(&app, "/demo/predict", &prediction_body("u1", "Paris")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn predict_on_model_free_classifier_ignores_store() {
    let app = test_app();
    let key = ModelKey::new("log_only", "u1").unwrap();
    let path = app.store.model_path(&key);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, b"garbage").unwrap();

    let (status, _) = post(&app, "/log_only/predict", &prediction_body("u1", "Paris")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn malformed_training_requests_are_400() {
    let app = test_app();
    let (status, _) = post(&app, "/demo/train", &json!({ "metadata": metadata(), "documents": [] })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = post(&app, "/demo/train", &training_body("../escape")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = post(&app, "/demo/train", &json!({ "documents": "nope" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.gated.fit_calls(), 0);
}

#[tokio::test]
async fn sync_mode_waits_for_model() {
    let app = test_app();
    app.gated.open();
    let (status, _) = post(&app, "/demo/train?mode=sync", &training_body("u1")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let key = ModelKey::new("demo", "u1").unwrap();
    assert!(app.store.load(&key).await.unwrap().is_some());
}

#[tokio::test]
async fn sync_mode_times_out_as_429() {
    let app = test_app();
    let (status, _) = post(&app, "/demo/train", &training_body("u1")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = post(&app, "/demo/train?mode=sync", &training_body("u1")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    app.gated.open();
}

#[tokio::test]
async fn failed_training_releases_key() {
    let app = test_app();
    let (status, _) = post(&app, "/broken/train", &training_body("u1")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    wait_until_idle(&app, "broken", "u1").await;

    let (status, _) = post(&app, "/broken/train?mode=sync", &training_body("u1")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let (status, _) = post(&app, "/broken/train", &training_body("u1")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn externally_held_lock_rejects_without_side_effects() {
    let app = test_app();
    app.gated.open();
    let key = ModelKey::new("demo", "u1").unwrap();
    // A second manager over the same directory stands in for another worker process.
    let other_process = FileLockManager::new(app.dir.path());
    let held = other_process.try_acquire(&key).await.unwrap();
    assert!(!held.is_busy());

    let (status, _) = post(&app, "/demo/train", &training_body("u1")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(app.gated.fit_calls(), 0);
    assert!(app.store.load(&key).await.unwrap().is_none());

    drop(held);
    let (status, _) = post(&app, "/demo/train?mode=sync", &training_body("u1")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn health() {
    let app = test_app();
    let (status, body) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"ok");
}
