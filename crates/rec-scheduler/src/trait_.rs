//! Coordinator trait: submit a training job, probe whether a key is training.

use async_trait::async_trait;
use rec_lock::LockError;
use rec_types::{Classifier, ModelKey, TrainingJob};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    /// The locking subsystem itself is broken; distinct from another run holding the key.
    #[error(transparent)]
    Lock(#[from] LockError),
}

/// How a background training run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Fit succeeded and the model was persisted.
    Saved,
    /// Fit succeeded but the classifier had nothing to persist.
    NothingToSave,
    /// Fit or save failed (or fit panicked); the previous model, if any, is untouched.
    Failed(String),
}

/// Handle on an accepted job. Dropping it detaches the job; it keeps running.
#[derive(Debug)]
pub struct JobHandle {
    key: ModelKey,
    task: JoinHandle<JobOutcome>,
}

impl JobHandle {
    pub(crate) fn new(key: ModelKey, task: JoinHandle<JobOutcome>) -> Self {
        Self { key, task }
    }

    pub fn key(&self) -> &ModelKey {
        &self.key
    }

    /// Wait for the job to finish. When this returns the key's lock has been released.
    pub async fn wait(self) -> JobOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => JobOutcome::Failed(e.to_string()),
        }
    }
}

#[derive(Debug)]
pub enum SubmitOutcome {
    Accepted(JobHandle),
    /// Another run holds the key. Nothing was started and nothing was written.
    Busy,
}

/// Training coordinator.
///
/// Contract: for one key at most one job runs at a time across all processes sharing the lock
/// directory; `submit` never waits for training or for the lock.
#[async_trait]
pub trait Coordinator: Send + Sync {
    async fn submit(
        &self,
        classifier: Arc<dyn Classifier>,
        job: TrainingJob,
    ) -> Result<SubmitOutcome, CoordinatorError>;

    /// Like `submit`, but waits up to `timeout` for the lock. A timeout is reported as `Busy`.
    /// Not for the default request path.
    async fn submit_wait(
        &self,
        classifier: Arc<dyn Classifier>,
        job: TrainingJob,
        timeout: Duration,
    ) -> Result<SubmitOutcome, CoordinatorError>;

    /// Diagnostics only; never use this to decide whether to submit.
    async fn is_training(&self, key: &ModelKey) -> Result<bool, CoordinatorError>;
}
