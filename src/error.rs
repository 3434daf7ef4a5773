//! Errors surfaced by table construction, insertion and locked scans.
//!
//! Absent keys are not errors: lookups return `None` and `delete`
//! returns `false`.

/// Failure modes of `ChainedTable`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, thiserror::Error)]
pub enum TableError {
    #[error("bucket count must be greater than zero")]
    ZeroBuckets,

    #[error("out of memory allocating {buckets} buckets")]
    OutOfMemory { buckets: usize },

    #[error("out of memory growing the chain of bucket {bucket}")]
    ChainOutOfMemory { bucket: usize },

    #[error("bucket {bucket} maps to lock {lock}, but only {locks} locks exist")]
    LockOutOfRange {
        bucket: usize,
        lock: usize,
        locks: usize,
    },
}
