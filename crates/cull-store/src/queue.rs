#![forbid(unsafe_code)]

//! Staging list for batched deletion.
//!
//! Physical deletion against the asset source is a single confirmable bulk
//! operation; staging lets the user swipe through dozens of items without
//! being prompted once per swipe. Staged items carry no Delete record — the
//! terminal record is only written once the bulk deletion has actually
//! happened, so a crash mid-queue can never mark an existing asset deleted.

use std::{collections::HashSet, fmt};

use cull_core::{AssetId, Category};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::{error::StoreError, record::UndoEntry, store::CategoryStore};

/// Assets staged for deletion but not yet committed.
///
/// Owned by the session façade; reads the [`CategoryStore`] at staging time
/// and writes through it only at commit time.
#[derive(Default)]
pub struct DeleteQueue {
    staged: Mutex<Vec<AssetId>>,
}

impl fmt::Debug for DeleteQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeleteQueue")
            .field("len", &self.staged.lock().len())
            .finish()
    }
}

impl DeleteQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage `id` for deletion. Records an undo entry capturing the
    /// pre-staging category; the record set is untouched. Re-staging an
    /// already staged id is a no-op.
    pub fn stage(&self, store: &CategoryStore, id: &AssetId) {
        let mut staged = self.staged.lock();
        if staged.contains(id) {
            return;
        }
        store.log_transition(id, Category::Delete);
        staged.push(id.clone());
    }

    /// Remove `id` from the queue and restore its pre-staging state.
    /// Unknown ids are a no-op.
    pub fn unstage(&self, store: &CategoryStore, id: &AssetId) {
        let mut staged = self.staged.lock();
        let Some(position) = staged.iter().position(|s| s == id) else {
            return;
        };
        staged.remove(position);
        drop(staged);
        restore(store, std::slice::from_ref(id));
    }

    /// Empty the queue, restoring every staged asset to its pre-staging
    /// state.
    pub fn clear(&self, store: &CategoryStore) {
        let ids: Vec<AssetId> = std::mem::take(&mut *self.staged.lock());
        if !ids.is_empty() {
            restore(store, &ids);
        }
    }

    /// Drop `id` from the queue without touching the store. The session
    /// calls this when a generic undo has already reverted the staging
    /// transition.
    pub fn discard(&self, id: &AssetId) -> bool {
        let mut staged = self.staged.lock();
        match staged.iter().position(|s| s == id) {
            Some(position) => {
                staged.remove(position);
                true
            }
            None => false,
        }
    }

    /// Empty the queue without touching the store (session reset).
    pub fn discard_all(&self) {
        self.staged.lock().clear();
    }

    pub fn contains(&self, id: &AssetId) -> bool {
        self.staged.lock().contains(id)
    }

    pub fn staged(&self) -> Vec<AssetId> {
        self.staged.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.staged.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.staged.lock().is_empty()
    }

    /// Commit the queue through the supplied physical-deletion operation.
    ///
    /// On success every affected asset gets a terminal, non-undoable Delete
    /// record and its staging undo entries are discarded — a physically
    /// deleted asset must never be resurrected by local undo. On failure the
    /// queue and all category state are left exactly as they were.
    ///
    /// An empty queue commits trivially without invoking `delete`.
    ///
    /// Returns the ids that were physically deleted.
    pub async fn commit<F, Fut, E>(
        &self,
        store: &CategoryStore,
        delete: F,
    ) -> Result<Vec<AssetId>, StoreError>
    where
        F: FnOnce(Vec<AssetId>) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: fmt::Display,
    {
        // Snapshot outside the lock; the delete callback may take a while
        // and new stages arriving meanwhile must survive a success.
        let ids: Vec<AssetId> = self.staged.lock().clone();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        match delete(ids.clone()).await {
            Ok(()) => {
                store.discard_transitions(&ids);
                for id in &ids {
                    store.assign_silent(id, Category::Delete);
                }
                let committed: HashSet<&AssetId> = ids.iter().collect();
                self.staged.lock().retain(|id| !committed.contains(id));
                debug!(count = ids.len(), "delete queue committed");
                Ok(ids)
            }
            Err(err) => {
                warn!(
                    %err,
                    count = ids.len(),
                    "bulk deletion failed; delete queue left intact"
                );
                Err(StoreError::DeletionFailed {
                    failed: ids.len(),
                    reason: err.to_string(),
                })
            }
        }
    }
}

/// Restore assets to their pre-staging state from their discarded staging
/// entries. Staging never wrote a record, so for `previous == None` this
/// re-asserts Unsorted and for `Some(prev)` it re-asserts `prev`.
fn restore(store: &CategoryStore, ids: &[AssetId]) {
    let entries: Vec<UndoEntry> = store.discard_transitions(ids);
    let mut seen: HashSet<AssetId> = HashSet::new();
    for entry in entries {
        // Entries arrive newest-first; the newest one per asset wins.
        if !seen.insert(entry.asset.clone()) {
            continue;
        }
        match entry.previous {
            Some(previous) => store.assign_with(&entry.asset, previous, Some(previous), false),
            None => store.remove(&entry.asset),
        }
    }
}
