//! Traits for classifiers and model storage, plus the values that cross them.

use crate::{Document, Metadata, ModelKey};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Serialized trained model. Opaque to everything except the classifier that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelBlob(serde_json::Value);

impl ModelBlob {
    pub fn encode<T: Serialize>(model: &T) -> Result<Self, ClassifierError> {
        serde_json::to_value(model)
            .map(Self)
            .map_err(|e| ClassifierError::Model(e.to_string()))
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, ClassifierError> {
        serde_json::from_value(self.0.clone()).map_err(|e| ClassifierError::Model(e.to_string()))
    }

    pub fn from_value(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }
}

/// Inputs of one background training run, copied out of the request at submission.
#[derive(Debug, Clone)]
pub struct TrainingJob {
    pub key: ModelKey,
    pub metadata: Metadata,
    pub documents: Vec<Document>,
}

/// A named recommender: learns from annotated documents and adds predictions to new ones.
///
/// Implementations are shared between concurrent predict calls and at most one fit per key,
/// so any state they keep must be safe for concurrent reads.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Whether `predict` wants the persisted model for the caller's key.
    fn needs_model(&self) -> bool {
        true
    }

    /// Train on the job's documents. `Ok(None)` means there is nothing to persist.
    async fn fit(&self, job: &TrainingJob) -> Result<Option<ModelBlob>, ClassifierError>;

    /// Append predictions to `document`. `model` is `None` when nothing has been trained yet.
    async fn predict(
        &self,
        metadata: &Metadata,
        model: Option<&ModelBlob>,
        document: &mut Document,
    ) -> Result<(), ClassifierError>;
}

/// Durable, atomic storage of one model per key.
///
/// Contract: `load` returns `Ok(None)` when no model was ever saved for the key, and an error
/// (never `Ok(None)`) when a file exists but cannot be read back.
#[async_trait]
pub trait ModelStore: Send + Sync {
    async fn load(&self, key: &ModelKey) -> Result<Option<ModelBlob>, StoreError>;

    async fn save(&self, key: &ModelKey, blob: &ModelBlob) -> Result<(), StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("training failed: {0}")]
    Training(String),
    #[error("prediction failed: {0}")]
    Prediction(String),
    #[error("model format: {0}")]
    Model(String),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("model store I/O on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("corrupt model file {path}: {reason}")]
    Corrupt { path: String, reason: String },
    #[error("model serialization: {0}")]
    Serialize(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn blob_decodes_what_it_encoded() {
        let mut m = BTreeMap::new();
        m.insert("paris".to_string(), "LOC".to_string());
        let blob = ModelBlob::encode(&m).unwrap();
        let back: BTreeMap<String, String> = blob.decode().unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn blob_decode_into_wrong_shape_is_model_error() {
        let blob = ModelBlob::from_value(serde_json::json!([1, 2, 3]));
        let err = blob.decode::<BTreeMap<String, String>>().unwrap_err();
        assert!(matches!(err, ClassifierError::Model(_)));
    }
}
