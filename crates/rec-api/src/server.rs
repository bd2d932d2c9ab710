//! Axum server and routes.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rec_classifiers::ClassifierRegistry;
use rec_scheduler::{Coordinator, JobOutcome, SubmitOutcome};
use rec_types::{
    Classifier, ModelKey, ModelStore, PredictionRequest, PredictionResponse, TrainingJob,
    TrainingRequest, TrainingStatusResponse,
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub struct AppState {
    pub classifiers: ClassifierRegistry,
    pub store: Arc<dyn ModelStore>,
    pub coordinator: Arc<dyn Coordinator>,
    /// Upper bound on waiting for a busy key in `mode=sync` training.
    pub lock_timeout: Duration,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/:classifier_name/train", post(handle_train))
        .route("/:classifier_name/predict", post(handle_predict))
        .route("/:classifier_name/status", get(handle_status))
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn lookup(state: &AppState, name: &str) -> Result<Arc<dyn Classifier>, Response> {
    state.classifiers.get(name).ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            format!("Classifier with name [{}] not found!", name),
        )
            .into_response()
    })
}

fn bad_request(msg: impl std::fmt::Display) -> Response {
    (StatusCode::BAD_REQUEST, msg.to_string()).into_response()
}

fn internal_error(msg: impl std::fmt::Display) -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, msg.to_string()).into_response()
}

#[derive(Debug, Default, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum TrainMode {
    /// Return as soon as the job is accepted (default).
    #[default]
    Async,
    /// Wait up to the lock timeout for the key, then wait for training to finish.
    Sync,
}

#[derive(Debug, Deserialize)]
pub struct TrainQuery {
    #[serde(default)]
    pub mode: TrainMode,
}

async fn handle_train(
    State(state): State<Arc<AppState>>,
    Path(classifier_name): Path<String>,
    Query(q): Query<TrainQuery>,
    body: Bytes,
) -> Response {
    tracing::info!(classifier = %classifier_name, "got training request");
    let classifier = match lookup(&state, &classifier_name) {
        Ok(c) => c,
        Err(res) => return res,
    };
    let req: TrainingRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => return bad_request(format!("invalid training request: {}", e)),
    };
    let user_id = match req.user_id() {
        Some(u) => u.to_string(),
        None => return bad_request("training request contains no documents"),
    };
    let key = match ModelKey::new(classifier_name, user_id) {
        Ok(k) => k,
        Err(e) => return bad_request(e),
    };
    let job = TrainingJob {
        key,
        metadata: req.metadata,
        documents: req.documents,
    };

    let submitted = match q.mode {
        TrainMode::Async => state.coordinator.submit(classifier, job).await,
        TrainMode::Sync => {
            state
                .coordinator
                .submit_wait(classifier, job, state.lock_timeout)
                .await
        }
    };
    match submitted {
        Ok(SubmitOutcome::Accepted(handle)) => match q.mode {
            // Dropping the handle detaches the job; it keeps running after we respond.
            TrainMode::Async => StatusCode::NO_CONTENT.into_response(),
            TrainMode::Sync => match handle.wait().await {
                JobOutcome::Saved | JobOutcome::NothingToSave => {
                    StatusCode::NO_CONTENT.into_response()
                }
                JobOutcome::Failed(reason) => internal_error(reason),
            },
        },
        Ok(SubmitOutcome::Busy) => StatusCode::TOO_MANY_REQUESTS.into_response(),
        Err(e) => {
            tracing::error!(error = %e, "training lock unavailable");
            internal_error(e)
        }
    }
}

async fn handle_predict(
    State(state): State<Arc<AppState>>,
    Path(classifier_name): Path<String>,
    body: Bytes,
) -> Response {
    tracing::info!(classifier = %classifier_name, "got prediction request");
    let classifier = match lookup(&state, &classifier_name) {
        Ok(c) => c,
        Err(res) => return res,
    };
    let PredictionRequest {
        metadata,
        mut document,
    } = match serde_json::from_slice::<PredictionRequest>(&body) {
        Ok(r) => r,
        Err(e) => return bad_request(format!("invalid prediction request: {}", e)),
    };

    let model = if classifier.needs_model() {
        let key = match ModelKey::new(classifier_name, document.user_id.clone()) {
            Ok(k) => k,
            Err(e) => return bad_request(e),
        };
        match state.store.load(&key).await {
            Ok(m) => m,
            Err(e) => {
                tracing::error!(
                    classifier = %key.classifier(),
                    user_id = %key.user_id(),
                    error = %e,
                    "loading model failed"
                );
                return internal_error(e);
            }
        }
    } else {
        None
    };

    if let Err(e) = classifier
        .predict(&metadata, model.as_ref(), &mut document)
        .await
    {
        tracing::error!(document_id = %document.document_id, error = %e, "prediction failed");
        return internal_error(e);
    }
    Json(PredictionResponse { document }).into_response()
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub user_id: String,
}

async fn handle_status(
    State(state): State<Arc<AppState>>,
    Path(classifier_name): Path<String>,
    Query(q): Query<StatusQuery>,
) -> Response {
    if let Err(res) = lookup(&state, &classifier_name) {
        return res;
    }
    let key = match ModelKey::new(classifier_name, q.user_id) {
        Ok(k) => k,
        Err(e) => return bad_request(e),
    };
    let training = match state.coordinator.is_training(&key).await {
        Ok(t) => t,
        Err(e) => return internal_error(e),
    };
    let has_model = match state.store.load(&key).await {
        Ok(m) => m.is_some(),
        Err(e) => return internal_error(e),
    };
    Json(TrainingStatusResponse {
        classifier: key.classifier().to_string(),
        user_id: key.user_id().to_string(),
        training,
        has_model,
    })
    .into_response()
}

async fn handle_health() -> &'static str {
    "ok"
}
