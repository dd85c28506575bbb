#![forbid(unsafe_code)]

use thiserror::Error;

/// Errors surfaced to callers of the decision store.
///
/// Storage-tier faults are handled internally by descending the durability
/// chain and never propagate per-call; only the two variants below require
/// user-visible handling (an explicit warning, or a re-prompt).
#[derive(Debug, Error)]
pub enum StoreError {
    /// All backend tiers failed. Mutations are no-ops from here on.
    #[error("all storage tiers failed; decisions are not being saved")]
    StorageUnavailable,

    /// The bulk deletion callback failed. The queue was left intact and no
    /// category records were written.
    #[error("deletion failed for {failed} queued item(s): {reason}")]
    DeletionFailed { failed: usize, reason: String },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Fault reported by a single backend tier. Internal: a `BackendError` makes
/// the store descend to the next tier, it is never returned to callers.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("backend capacity exhausted")]
    CapacityExhausted,
}

pub type BackendResult<T> = Result<T, BackendError>;
