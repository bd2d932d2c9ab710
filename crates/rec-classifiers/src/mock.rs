//! Deterministic classifiers for tests: a string matcher whose training can be held open, and
//! one whose training always fails.

use crate::StringMatchClassifier;
use async_trait::async_trait;
use rec_types::{Classifier, ClassifierError, Document, Metadata, ModelBlob, TrainingJob};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Semaphore;

/// `StringMatchClassifier` whose `fit` does not return until [`GatedClassifier::open`] is called.
pub struct GatedClassifier {
    inner: StringMatchClassifier,
    // Zero permits; closing it wakes every waiter.
    gate: Semaphore,
    fits: AtomicUsize,
}

impl GatedClassifier {
    pub fn new() -> Self {
        Self {
            inner: StringMatchClassifier::new(),
            gate: Semaphore::new(0),
            fits: AtomicUsize::new(0),
        }
    }

    /// Let every pending and future `fit` run to completion.
    pub fn open(&self) {
        self.gate.close();
    }

    /// Number of `fit` calls that have started.
    pub fn fit_calls(&self) -> usize {
        self.fits.load(Ordering::SeqCst)
    }
}

impl Default for GatedClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Classifier for GatedClassifier {
    async fn fit(&self, job: &TrainingJob) -> Result<Option<ModelBlob>, ClassifierError> {
        self.fits.fetch_add(1, Ordering::SeqCst);
        // Acquire only fails once the semaphore is closed.
        let _ = self.gate.acquire().await;
        self.inner.fit(job).await
    }

    async fn predict(
        &self,
        metadata: &Metadata,
        model: Option<&ModelBlob>,
        document: &mut Document,
    ) -> Result<(), ClassifierError> {
        self.inner.predict(metadata, model, document).await
    }
}

/// Training always fails, either with an error or with a panic.
pub struct FailingClassifier {
    panic: bool,
}

impl FailingClassifier {
    pub fn new() -> Self {
        Self { panic: false }
    }

    pub fn panicking() -> Self {
        Self { panic: true }
    }
}

impl Default for FailingClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Classifier for FailingClassifier {
    async fn fit(&self, job: &TrainingJob) -> Result<Option<ModelBlob>, ClassifierError> {
        if self.panic {
            panic!("fit panicked for {}", job.key);
        }
        Err(ClassifierError::Training(format!(
            "refusing to train {}",
            job.key
        )))
    }

    async fn predict(
        &self,
        _metadata: &Metadata,
        _model: Option<&ModelBlob>,
        _document: &mut Document,
    ) -> Result<(), ClassifierError> {
        Ok(())
    }
}
