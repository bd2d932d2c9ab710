//! Lock-then-spawn training coordinator.

use crate::{Coordinator, CoordinatorError, JobHandle, JobOutcome, SubmitOutcome};
use async_trait::async_trait;
use rec_lock::{Acquire, FileLockManager};
use rec_types::{Classifier, ModelKey, ModelStore, TrainingJob};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Accepts a job only if it can take the key's lock without waiting, then runs fit and save on a
/// detached task that owns the lock guard. The guard is dropped when that task ends, whether fit
/// succeeded, returned an error, or panicked.
pub struct TrainingCoordinator {
    locks: Arc<FileLockManager>,
    store: Arc<dyn ModelStore>,
}

async fn run_job(
    classifier: Arc<dyn Classifier>,
    store: Arc<dyn ModelStore>,
    job: TrainingJob,
) -> JobOutcome {
    let started = Instant::now();
    let key = job.key.clone();
    let blob = match classifier.fit(&job).await {
        Ok(Some(blob)) => blob,
        Ok(None) => {
            tracing::info!(
                classifier = %key.classifier(),
                user_id = %key.user_id(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "training finished, nothing to persist"
            );
            return JobOutcome::NothingToSave;
        }
        Err(e) => {
            tracing::error!(
                classifier = %key.classifier(),
                user_id = %key.user_id(),
                error = %e,
                "training failed"
            );
            return JobOutcome::Failed(e.to_string());
        }
    };
    // Drop the inputs before the write; they can be large.
    drop(job);
    match store.save(&key, &blob).await {
        Ok(()) => {
            tracing::info!(
                classifier = %key.classifier(),
                user_id = %key.user_id(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "training finished, model saved"
            );
            JobOutcome::Saved
        }
        Err(e) => {
            tracing::error!(
                classifier = %key.classifier(),
                user_id = %key.user_id(),
                error = %e,
                "saving trained model failed"
            );
            JobOutcome::Failed(e.to_string())
        }
    }
}

impl TrainingCoordinator {
    pub fn new(locks: Arc<FileLockManager>, store: Arc<dyn ModelStore>) -> Self {
        Self { locks, store }
    }

    fn start(
        &self,
        attempt: Acquire,
        classifier: Arc<dyn Classifier>,
        job: TrainingJob,
    ) -> SubmitOutcome {
        let key = job.key.clone();
        let guard = match attempt {
            Acquire::Held(guard) => guard,
            Acquire::Busy => {
                tracing::debug!(
                    classifier = %key.classifier(),
                    user_id = %key.user_id(),
                    "already training, skipping"
                );
                return SubmitOutcome::Busy;
            }
        };

        tracing::info!(
            classifier = %key.classifier(),
            user_id = %key.user_id(),
            documents = job.documents.len(),
            "training accepted"
        );
        let store = Arc::clone(&self.store);
        let task_key = key.clone();
        let task = tokio::spawn(async move {
            let _guard = guard;
            // Inner task so a panicking fit is observed here instead of unwinding past the guard.
            match tokio::spawn(run_job(classifier, store, job)).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(
                        classifier = %task_key.classifier(),
                        user_id = %task_key.user_id(),
                        error = %e,
                        "training task aborted"
                    );
                    JobOutcome::Failed(e.to_string())
                }
            }
        });
        SubmitOutcome::Accepted(JobHandle::new(key, task))
    }
}

#[async_trait]
impl Coordinator for TrainingCoordinator {
    async fn submit(
        &self,
        classifier: Arc<dyn Classifier>,
        job: TrainingJob,
    ) -> Result<SubmitOutcome, CoordinatorError> {
        let attempt = self.locks.try_acquire(&job.key).await?;
        Ok(self.start(attempt, classifier, job))
    }

    async fn submit_wait(
        &self,
        classifier: Arc<dyn Classifier>,
        job: TrainingJob,
        timeout: Duration,
    ) -> Result<SubmitOutcome, CoordinatorError> {
        let attempt = self.locks.acquire_wait(&job.key, timeout).await?;
        Ok(self.start(attempt, classifier, job))
    }

    async fn is_training(&self, key: &ModelKey) -> Result<bool, CoordinatorError> {
        Ok(self.locks.is_held(key))
    }
}
