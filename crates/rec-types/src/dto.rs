//! Request and response DTOs for the train/predict endpoints.

use serde::{Deserialize, Serialize};

/// Target layer/feature and project of a train or predict call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub layer: String,
    pub feature: String,
    pub project_id: String,
}

/// One span annotation on a document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub layer: String,
    pub begin: usize,
    pub end: usize,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub is_prediction: bool,
}

impl Annotation {
    /// Build a prediction on `layer` covering `begin..end`.
    pub fn prediction(layer: &str, begin: usize, end: usize, label: &str) -> Self {
        Self {
            layer: layer.to_string(),
            begin,
            end,
            label: Some(label.to_string()),
            is_prediction: true,
        }
    }
}

/// A document as exchanged with the annotation tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub document_id: String,
    pub user_id: String,
    pub text: String,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

impl Document {
    /// Text covered by an annotation; `None` when the offsets are out of range or split a char.
    pub fn covered_text(&self, annotation: &Annotation) -> Option<&str> {
        if annotation.begin > annotation.end {
            return None;
        }
        self.text.get(annotation.begin..annotation.end)
    }

    /// Annotations on `layer`, predictions included.
    pub fn select<'a>(&'a self, layer: &'a str) -> impl Iterator<Item = &'a Annotation> + 'a {
        self.annotations.iter().filter(move |a| a.layer == layer)
    }
}

/// Training request (POST /{classifier}/train).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingRequest {
    pub metadata: Metadata,
    #[serde(default)]
    pub documents: Vec<Document>,
}

impl TrainingRequest {
    /// Training runs are per user; the user is the owner of the first document.
    pub fn user_id(&self) -> Option<&str> {
        self.documents.first().map(|d| d.user_id.as_str())
    }
}

/// Prediction request (POST /{classifier}/predict).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionRequest {
    pub metadata: Metadata,
    pub document: Document,
}

/// Prediction response: the request document with predictions appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResponse {
    pub document: Document,
}

/// Diagnostics for one (classifier, user) slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingStatusResponse {
    pub classifier: String,
    pub user_id: String,
    pub training: bool,
    pub has_model: bool,
}
