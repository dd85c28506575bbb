#![forbid(unsafe_code)]

//! Durable mapping from asset id to category, with derived counts, a lookup
//! cache and a bounded undo history.
//!
//! Single logical writer, concurrent readers: all state sits behind one
//! `RwLock`, mutations hold the write guard for the whole mutate+invalidate
//! unit, and readers only ever observe caches that are invalidated wholesale,
//! never partially updated.

use std::{collections::HashMap, path::PathBuf};

use cull_core::{AssetId, Category, Counts};
use parking_lot::RwLock;
use tracing::{debug, error, warn};

use crate::{
    backend::StoreBackend,
    emergency::EmergencyBackend,
    error::BackendResult,
    memory::MemoryBackend,
    record::{CategoryRecord, UndoEntry},
    sqlite::SqliteBackend,
    undo::UndoLog,
};

pub use crate::undo::UNDO_CAP;

/// How the store was asked to persist decisions.
#[derive(Clone, Debug, Default)]
pub struct StoreOptions {
    /// Database file for the persistent tier. `None` starts directly on the
    /// in-memory tier (useful for tests and ephemeral sessions).
    pub db_path: Option<PathBuf>,
}

impl StoreOptions {
    /// Persist to a SQLite database at `path`.
    pub fn persistent(path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: Some(path.into()),
        }
    }

    /// Skip the persistent tier entirely.
    pub fn in_memory() -> Self {
        Self { db_path: None }
    }
}

/// Current tier of the durability chain, for one-time UI surfacing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Durability {
    Persistent,
    InMemory,
    Emergency,
    Disabled,
}

enum Tier {
    Sqlite(SqliteBackend),
    Memory(MemoryBackend),
    Emergency(EmergencyBackend),
    Disabled,
    #[cfg(test)]
    Failing(crate::backend::testing::FailingBackend),
}

impl Tier {
    fn durability(&self) -> Durability {
        match self {
            Tier::Sqlite(_) => Durability::Persistent,
            Tier::Memory(_) => Durability::InMemory,
            Tier::Emergency(_) => Durability::Emergency,
            Tier::Disabled => Durability::Disabled,
            #[cfg(test)]
            Tier::Failing(_) => Durability::Persistent,
        }
    }

    fn backend(&self) -> Option<&dyn StoreBackend> {
        match self {
            Tier::Sqlite(backend) => Some(backend),
            Tier::Memory(backend) => Some(backend),
            Tier::Emergency(backend) => Some(backend),
            Tier::Disabled => None,
            #[cfg(test)]
            Tier::Failing(backend) => Some(backend),
        }
    }

    /// Next tier down. One-directional: there is no way back up within a
    /// session.
    fn descend(&self) -> Tier {
        match self {
            Tier::Sqlite(_) => Tier::Memory(MemoryBackend::new()),
            Tier::Memory(_) => Tier::Emergency(EmergencyBackend::new()),
            Tier::Emergency(_) | Tier::Disabled => Tier::Disabled,
            #[cfg(test)]
            Tier::Failing(_) => Tier::Emergency(EmergencyBackend::new()),
        }
    }
}

struct StoreState {
    tier: Tier,
    /// Lookup cache over backend records; caches negative results too, so a
    /// genuinely-unsorted asset does not hit the backend on every view.
    lookup: HashMap<AssetId, Option<Category>>,
    /// Aggregate counts, invalidated wholesale on every mutation.
    counts: Option<Counts>,
    undo: UndoLog,
}

impl StoreState {
    /// Run `op` against the active backend, descending the durability chain
    /// on failure and retrying on each successive tier. Once the chain is
    /// exhausted the op becomes a no-op and `fallback` is returned.
    fn with_backend<T>(
        &mut self,
        what: &str,
        fallback: T,
        op: impl Fn(&dyn StoreBackend) -> BackendResult<T>,
    ) -> T {
        loop {
            let result = match self.tier.backend() {
                None => return fallback,
                Some(backend) => op(backend),
            };
            match result {
                Ok(value) => return value,
                Err(err) => {
                    warn!(
                        op = what,
                        %err,
                        tier = ?self.tier.durability(),
                        "store backend failed; descending durability chain"
                    );
                    self.tier = self.tier.descend();
                    if matches!(self.tier, Tier::Disabled) {
                        error!("all storage tiers failed; decisions are no longer being saved");
                    }
                }
            }
        }
    }

    /// Resolve the current category of `id`, filling the lookup cache on
    /// miss (negative results included).
    fn current_category(&mut self, id: &AssetId) -> Option<Category> {
        if let Some(cached) = self.lookup.get(id) {
            return *cached;
        }
        let category = self
            .with_backend("record", None, |b| b.record(id))
            .map(|r| r.category);
        self.lookup.insert(id.clone(), category);
        category
    }

    fn push_undo(&mut self, entry: UndoEntry) {
        self.with_backend("append_undo", (), |b| b.append_undo(&entry));
        if self.undo.push(entry).is_some() {
            self.with_backend("trim_undo", (), |b| b.trim_undo(UNDO_CAP));
        }
    }

    fn apply_assign(
        &mut self,
        id: &AssetId,
        category: Category,
        previous: Option<Category>,
        record_undo: bool,
    ) {
        // Resolve the previous category before the upsert replaces it.
        let previous = if record_undo {
            previous.or_else(|| self.current_category(id))
        } else {
            None
        };
        let record = CategoryRecord::new(id.clone(), category);
        self.with_backend("upsert", (), |b| b.upsert(&record));
        if record_undo {
            self.push_undo(UndoEntry::new(id.clone(), previous, category));
        }
        self.lookup.insert(id.clone(), Some(category));
        self.counts = None;
    }

    fn apply_remove(&mut self, id: &AssetId) {
        self.with_backend("remove", (), |b| b.remove(id));
        self.lookup.insert(id.clone(), None);
        self.counts = None;
    }
}

/// The decision store. See the crate docs for the durability model.
pub struct CategoryStore {
    state: RwLock<StoreState>,
}

impl std::fmt::Debug for CategoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("CategoryStore")
            .field("durability", &state.tier.durability())
            .field("undo_len", &state.undo.len())
            .finish_non_exhaustive()
    }
}

impl CategoryStore {
    /// Open the store, preferring the persistent tier when a path is given.
    ///
    /// Never fails: a persistent tier that cannot be opened is logged and the
    /// store starts on the in-memory tier instead.
    pub fn open(options: StoreOptions) -> Self {
        let tier = match &options.db_path {
            Some(path) => match SqliteBackend::open(path) {
                Ok(backend) => Tier::Sqlite(backend),
                Err(err) => {
                    warn!(
                        %err,
                        path = %path.display(),
                        "persistent backend unavailable; continuing in memory"
                    );
                    Tier::Memory(MemoryBackend::new())
                }
            },
            None => Tier::Memory(MemoryBackend::new()),
        };

        let mut state = StoreState {
            tier,
            lookup: HashMap::new(),
            counts: None,
            undo: UndoLog::new(),
        };
        let entries = state.with_backend("load_undo", Vec::new(), |b| b.load_undo());
        state.undo = UndoLog::from_entries(entries);
        debug!(
            durability = ?state.tier.durability(),
            undo_len = state.undo.len(),
            "category store opened"
        );

        Self {
            state: RwLock::new(state),
        }
    }

    pub fn durability(&self) -> Durability {
        self.state.read().tier.durability()
    }

    /// Cached category lookup. `None` means Unsorted.
    pub fn category(&self, id: &AssetId) -> Option<Category> {
        if let Some(cached) = self.state.read().lookup.get(id) {
            return *cached;
        }
        let mut state = self.state.write();
        state.current_category(id)
    }

    /// Assign `category` to `id`, recording an undo entry.
    pub fn assign(&self, id: &AssetId, category: Category) {
        self.assign_with(id, category, None, true);
    }

    /// Assign without recording an undo entry. Used for undo replay and for
    /// terminal states that local undo must never revert.
    pub fn assign_silent(&self, id: &AssetId, category: Category) {
        self.assign_with(id, category, None, false);
    }

    /// General form of [`assign`](Self::assign). Supplying `previous` skips
    /// the read that would otherwise resolve it from the existing record.
    pub fn assign_with(
        &self,
        id: &AssetId,
        category: Category,
        previous: Option<Category>,
        record_undo: bool,
    ) {
        let mut state = self.state.write();
        state.apply_assign(id, category, previous, record_undo);
    }

    /// Delete the record for `id`; the asset returns to Unsorted.
    pub fn remove(&self, id: &AssetId) {
        let mut state = self.state.write();
        state.apply_remove(id);
    }

    /// Batched removal: one backend round-trip and one counts invalidation
    /// regardless of batch size.
    pub fn remove_many(&self, ids: &[AssetId]) {
        if ids.is_empty() {
            return;
        }
        let mut state = self.state.write();
        state.with_backend("remove_many", (), |b| b.remove_many(ids));
        for id in ids {
            state.lookup.insert(id.clone(), None);
        }
        state.counts = None;
    }

    /// Reverse the most recent undoable transition. Returns the affected
    /// asset, or `None` when the log is empty. Undo is not itself undoable.
    pub fn undo(&self) -> Option<AssetId> {
        let mut state = self.state.write();
        let entry = state.undo.pop_newest()?;
        state.with_backend("pop_undo", None, |b| b.pop_undo());
        match entry.previous {
            Some(previous) => state.apply_assign(&entry.asset, previous, None, false),
            None => state.apply_remove(&entry.asset),
        }
        Some(entry.asset)
    }

    pub fn can_undo(&self) -> bool {
        !self.state.read().undo.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.state.read().undo.len()
    }

    /// Aggregate counts, recomputed from the backend on demand and cached
    /// until the next mutation.
    pub fn counts(&self) -> Counts {
        if let Some(counts) = self.state.read().counts {
            return counts;
        }
        let mut state = self.state.write();
        if let Some(counts) = state.counts {
            return counts;
        }
        let counts = state.with_backend("counts", Counts::default(), |b| b.counts());
        state.counts = Some(counts);
        counts
    }

    /// Append an undo entry for a transition to `new` WITHOUT touching the
    /// record set. Staging uses this so that queuing an asset for deletion
    /// is undoable before any Delete record exists.
    pub fn log_transition(&self, id: &AssetId, new: Category) {
        let mut state = self.state.write();
        let previous = state.current_category(id);
        state.push_undo(UndoEntry::new(id.clone(), previous, new));
    }

    /// Remove and return every undo entry for the given assets,
    /// newest-first.
    pub fn discard_transitions(&self, ids: &[AssetId]) -> Vec<UndoEntry> {
        if ids.is_empty() {
            return Vec::new();
        }
        let mut state = self.state.write();
        let removed = state.undo.remove_for(ids);
        if !removed.is_empty() {
            state.with_backend("remove_undo_for", (), |b| b.remove_undo_for(ids));
        }
        removed
    }

    /// Delete all records and undo entries and clear every cache.
    /// Irreversible.
    pub fn reset(&self) {
        let mut state = self.state.write();
        state.with_backend("reset", (), |b| {
            b.clear_records()?;
            b.clear_undo()
        });
        state.lookup.clear();
        state.counts = None;
        state.undo.clear();
        debug!("category store reset");
    }
}
