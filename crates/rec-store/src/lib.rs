//! Model store trait and filesystem implementation.

mod fs_store;

pub use fs_store::FsModelStore;
pub use rec_types::{ModelBlob, ModelKey, ModelStore, StoreError};
