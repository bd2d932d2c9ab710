//! Built-in classifiers and the name -> classifier registry.

mod log_only;
#[cfg(feature = "test-util")]
pub mod mock;
mod registry;
mod string_match;

pub use log_only::LogOnlyClassifier;
pub use rec_types::{Classifier, ClassifierError};
pub use registry::ClassifierRegistry;
pub use string_match::StringMatchClassifier;

#[cfg(feature = "test-util")]
pub use mock::{FailingClassifier, GatedClassifier};
