#![forbid(unsafe_code)]

//! # cull-store
//!
//! The decision store: a local, crash-resilient record of per-asset category
//! assignments with a bounded undo history and a cancellable pending-deletion
//! queue.
//!
//! ## Public contract
//!
//! The explicit public contract is [`CategoryStore`] plus [`DeleteQueue`].
//! The undo log is an implementation detail of the store and is not
//! independently addressable; callers reach it only through
//! [`CategoryStore::undo`] and the staging operations.
//!
//! ## Durability degradation chain
//!
//! The store never crashes, and never fails a mutation, because durable
//! storage is briefly unavailable. Instead it descends a one-directional
//! chain of backends:
//!
//! ```text
//! Sqlite (persistent) → Memory (in-process) → Emergency (fixed capacity) → Disabled
//! ```
//!
//! Each downgrade is logged once; the store never re-promotes itself within a
//! session. The current tier is observable via [`CategoryStore::durability`]
//! so the UI can warn once when progress is no longer being saved.

mod backend;
mod emergency;
mod error;
mod memory;
mod queue;
mod record;
mod sqlite;
mod store;
mod undo;

pub use error::{BackendError, BackendResult, StoreError, StoreResult};
pub use queue::DeleteQueue;
pub use record::{CategoryRecord, UndoEntry};
pub use store::{CategoryStore, Durability, StoreOptions, UNDO_CAP};

// Hidden re-exports for cross-crate tests; not end-user API.
#[doc(hidden)]
pub use backend::StoreBackend;
#[doc(hidden)]
pub use emergency::EmergencyBackend;
#[doc(hidden)]
pub use memory::MemoryBackend;
#[doc(hidden)]
pub use sqlite::SqliteBackend;
