//! Model identity: (classifier name, user id).

use std::fmt;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error("{field} contains a forbidden path component: {value:?}")]
    Unsafe { field: &'static str, value: String },
}

/// Identifies one trainable model slot. The classifier name is a directory and the user id is
/// embedded in `model_<user_id>`, so construction rejects anything that could leave that directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelKey {
    classifier: String,
    user_id: String,
}

impl ModelKey {
    pub fn new(classifier: impl Into<String>, user_id: impl Into<String>) -> Result<Self, KeyError> {
        let classifier = classifier.into();
        let user_id = user_id.into();
        check_component("classifier name", &classifier)?;
        if classifier.contains("..") {
            return Err(KeyError::Unsafe {
                field: "classifier name",
                value: classifier,
            });
        }
        // The `model_` prefix keeps a user id from ever being `.` or `..` on its own.
        check_component("user id", &user_id)?;
        Ok(Self {
            classifier,
            user_id,
        })
    }

    pub fn classifier(&self) -> &str {
        &self.classifier
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// File stem shared by the model file and its lock file.
    pub fn file_stem(&self) -> String {
        format!("model_{}", self.user_id)
    }
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.classifier, self.user_id)
    }
}

fn check_component(field: &'static str, value: &str) -> Result<(), KeyError> {
    if value.is_empty() {
        return Err(KeyError::Empty(field));
    }
    if value.contains(['/', '\\', '\0']) {
        return Err(KeyError::Unsafe {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}
