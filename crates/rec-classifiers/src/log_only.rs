use async_trait::async_trait;
use rec_types::{Classifier, ClassifierError, Document, Metadata, ModelBlob, TrainingJob};

/// Logs every call and never produces a model. Handy for wiring checks against a live client.
pub struct LogOnlyClassifier;

#[async_trait]
impl Classifier for LogOnlyClassifier {
    fn needs_model(&self) -> bool {
        false
    }

    async fn fit(&self, job: &TrainingJob) -> Result<Option<ModelBlob>, ClassifierError> {
        tracing::info!(
            classifier = %job.key.classifier(),
            user_id = %job.key.user_id(),
            layer = %job.metadata.layer,
            feature = %job.metadata.feature,
            project_id = %job.metadata.project_id,
            documents = job.documents.len(),
            "training triggered"
        );
        Ok(None)
    }

    async fn predict(
        &self,
        metadata: &Metadata,
        _model: Option<&ModelBlob>,
        document: &mut Document,
    ) -> Result<(), ClassifierError> {
        tracing::info!(
            document_id = %document.document_id,
            user_id = %document.user_id,
            layer = %metadata.layer,
            feature = %metadata.feature,
            project_id = %metadata.project_id,
            "prediction triggered"
        );
        Ok(())
    }
}
