//! Training coordination: accept or reject a training request without blocking, then run the
//! accepted job in the background while holding the key's training lock.

mod coordinator;
mod trait_;

pub use coordinator::TrainingCoordinator;
pub use trait_::{Coordinator, CoordinatorError, JobHandle, JobOutcome, SubmitOutcome};
