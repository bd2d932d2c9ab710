//! Recommender REST API server: /{classifier}/train, /{classifier}/predict.

use rec_api::config::Config;
use rec_api::server::{self, AppState};
use rec_classifiers::{ClassifierRegistry, LogOnlyClassifier, StringMatchClassifier};
use rec_lock::FileLockManager;
use rec_scheduler::TrainingCoordinator;
use rec_store::FsModelStore;
use rec_types::ModelStore;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    tracing::info!(
        model_dir = %config.model_dir.display(),
        lock_dir = %config.lock_dir.display(),
        "using storage directories"
    );

    let store: Arc<dyn ModelStore> = Arc::new(FsModelStore::new(&config.model_dir));
    let locks = Arc::new(FileLockManager::new(&config.lock_dir));
    let coordinator = Arc::new(TrainingCoordinator::new(locks, Arc::clone(&store)));
    let classifiers = ClassifierRegistry::new()
        .with("log_only", Arc::new(LogOnlyClassifier))
        .with("string_match", Arc::new(StringMatchClassifier::new()));

    let state = Arc::new(AppState {
        classifiers,
        store,
        coordinator,
        lock_timeout: config.lock_timeout,
    });
    let app = server::router(state);
    tracing::info!("recommender API listening on {}", config.listen);
    axum::serve(
        tokio::net::TcpListener::bind(config.listen).await?,
        app.into_make_service(),
    )
    .await?;
    Ok(())
}
