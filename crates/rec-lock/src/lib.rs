//! Training locks: one advisory file lock per model key, visible to every process on the host.

mod file_lock;

pub use file_lock::{Acquire, FileLockManager, LockError, LockGuard};
