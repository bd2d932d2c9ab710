//! Name -> classifier lookup used by the HTTP layer.

use rec_types::Classifier;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Classifiers registered at startup. Names are the `{classifier_name}` path segment.
#[derive(Clone, Default)]
pub struct ClassifierRegistry {
    classifiers: BTreeMap<String, Arc<dyn Classifier>>,
}

impl ClassifierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register under `name`, replacing any previous classifier with that name.
    pub fn register(&mut self, name: impl Into<String>, classifier: Arc<dyn Classifier>) {
        let name = name.into();
        tracing::info!(classifier = %name, "registered classifier");
        self.classifiers.insert(name, classifier);
    }

    pub fn with(mut self, name: impl Into<String>, classifier: Arc<dyn Classifier>) -> Self {
        self.register(name, classifier);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Classifier>> {
        self.classifiers.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.classifiers.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LogOnlyClassifier, StringMatchClassifier};

    #[test]
    fn lookup_by_name() {
        let registry = ClassifierRegistry::new()
            .with("log_only", Arc::new(LogOnlyClassifier))
            .with("string_match", Arc::new(StringMatchClassifier::new()));
        assert!(registry.get("log_only").is_some());
        assert!(!registry.get("log_only").unwrap().needs_model());
        assert!(registry.get("string_match").unwrap().needs_model());
        assert!(registry.get("missing").is_none());
        assert_eq!(
            registry.names().collect::<Vec<_>>(),
            vec!["log_only", "string_match"]
        );
    }
}
