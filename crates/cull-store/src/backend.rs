#![forbid(unsafe_code)]

//! Persistence backend contract for the decision store.
//!
//! The persisted layout is backend-agnostic: two tables, category records
//! keyed by asset id and undo entries keyed by insertion order. A backend
//! must tolerate being empty on first run; no migrations are required to
//! operate in the in-memory tiers.

use cull_core::{AssetId, Counts};

use crate::{
    error::BackendResult,
    record::{CategoryRecord, UndoEntry},
};

/// One tier of the durability chain.
///
/// Every method is synchronous and called under the store's write lock, so
/// implementations only need interior mutability, not cross-call ordering.
/// A returned error makes the store descend to the next tier and retry; it
/// is never surfaced per-call.
pub trait StoreBackend: Send + Sync {
    // ---- category records ----

    fn record(&self, id: &AssetId) -> BackendResult<Option<CategoryRecord>>;

    fn upsert(&self, record: &CategoryRecord) -> BackendResult<()>;

    fn remove(&self, id: &AssetId) -> BackendResult<()>;

    /// Batched removal. Must be a single backend round-trip regardless of
    /// batch size; callers remove thousands of entries at once.
    fn remove_many(&self, ids: &[AssetId]) -> BackendResult<()>;

    fn counts(&self) -> BackendResult<Counts>;

    fn clear_records(&self) -> BackendResult<()>;

    // ---- undo entries ----

    /// All persisted undo entries, oldest-first.
    fn load_undo(&self) -> BackendResult<Vec<UndoEntry>>;

    fn append_undo(&self, entry: &UndoEntry) -> BackendResult<()>;

    fn pop_undo(&self) -> BackendResult<Option<UndoEntry>>;

    /// Drop the oldest entries so that at most `keep` remain.
    fn trim_undo(&self, keep: usize) -> BackendResult<()>;

    fn remove_undo_for(&self, ids: &[AssetId]) -> BackendResult<()>;

    fn clear_undo(&self) -> BackendResult<()>;
}
