#![forbid(unsafe_code)]

//! The UI-facing session: the decision-store façade plus the load engine,
//! driven by the swipe loop.
//!
//! One session per review sitting. The UI reads counts and category
//! lookups, issues mutations (assign, undo, stage, commit, reset) and calls
//! [`TriageSession::advance_to`] as the viewing position moves so the engine
//! can keep the next few items warm.

use std::{collections::HashMap, path::PathBuf, sync::Arc};

use cull_core::{AssetId, AssetMetadata, Category, Counts};
use cull_engine::{
    AssetCacheEngine, AssetSource, EngineOptions, Rendition, RenditionQuality, SourceError,
};
use cull_store::{CategoryStore, DeleteQueue, Durability, StoreError, StoreOptions};
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Configuration for one triage session.
#[derive(Clone, Debug, Default)]
pub struct SessionOptions {
    pub store: StoreOptions,
    pub engine: EngineOptions,
}

impl SessionOptions {
    /// Persist decisions to a SQLite database at `path`.
    pub fn persistent(path: impl Into<PathBuf>) -> Self {
        Self {
            store: StoreOptions::persistent(path),
            engine: EngineOptions::default(),
        }
    }

    /// Keep all decisions in memory (tests, ephemeral sessions).
    pub fn in_memory() -> Self {
        Self {
            store: StoreOptions::in_memory(),
            engine: EngineOptions::default(),
        }
    }

    pub fn with_engine(mut self, engine: EngineOptions) -> Self {
        self.engine = engine;
        self
    }
}

#[derive(Default)]
struct Roster {
    order: Vec<AssetId>,
    metadata: HashMap<AssetId, AssetMetadata>,
}

/// The media-triage session exposed to the UI layer.
pub struct TriageSession<S> {
    source: Arc<S>,
    store: CategoryStore,
    queue: DeleteQueue,
    engine: AssetCacheEngine<S>,
    roster: RwLock<Roster>,
    cancel: CancellationToken,
}

impl<S: AssetSource> TriageSession<S> {
    /// Open a session over `source`. Storage failures do not propagate;
    /// check [`durability`](Self::durability) once to warn the user when
    /// decisions are not being persisted.
    pub fn open(source: Arc<S>, options: SessionOptions) -> Self {
        let cancel = CancellationToken::new();
        let store = CategoryStore::open(options.store);
        if store.durability() != Durability::Persistent {
            warn!(durability = ?store.durability(), "session opened without persistent storage");
        }
        let engine = AssetCacheEngine::new(source.clone(), options.engine, cancel.child_token());
        Self {
            source,
            store,
            queue: DeleteQueue::new(),
            engine,
            roster: RwLock::new(Roster::default()),
            cancel,
        }
    }

    // ---- collection ----

    /// Enumerate the collection, capturing its order and metadata. Returns
    /// the number of items.
    pub async fn refresh(&self) -> Result<usize, SourceError> {
        let entries = self.source.fetch_all().await?;
        let mut roster = self.roster.write();
        roster.order = entries.iter().map(|entry| entry.id.clone()).collect();
        roster.metadata = entries
            .into_iter()
            .map(|entry| (entry.id, entry.metadata))
            .collect();
        debug!(items = roster.order.len(), "collection refreshed");
        Ok(roster.order.len())
    }

    pub fn len(&self) -> usize {
        self.roster.read().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roster.read().order.is_empty()
    }

    pub fn asset_at(&self, position: usize) -> Option<AssetId> {
        self.roster.read().order.get(position).cloned()
    }

    pub fn metadata(&self, id: &AssetId) -> Option<AssetMetadata> {
        self.roster.read().metadata.get(id).cloned()
    }

    // ---- decisions ----

    /// Cached category lookup; `None` means Unsorted.
    pub fn category(&self, id: &AssetId) -> Option<Category> {
        self.store.category(id)
    }

    pub fn assign(&self, id: &AssetId, category: Category) {
        self.store.assign(id, category);
    }

    /// Reverse the most recent undoable transition. When it was a staging
    /// transition, the asset also leaves the delete queue.
    pub fn undo(&self) -> Option<AssetId> {
        let id = self.store.undo()?;
        self.queue.discard(&id);
        Some(id)
    }

    pub fn can_undo(&self) -> bool {
        self.store.can_undo()
    }

    /// Aggregate counts over committed records. Staged-but-uncommitted
    /// deletions are NOT included; see
    /// [`pending_delete_count`](Self::pending_delete_count).
    pub fn counts(&self) -> Counts {
        self.store.counts()
    }

    /// Assets with a terminal Delete record (physically deleted).
    pub fn deleted_count(&self) -> u64 {
        self.store.counts().delete
    }

    /// Assets staged for deletion but not yet committed. The caller decides
    /// how (and whether) to combine this with [`deleted_count`](Self::deleted_count).
    pub fn pending_delete_count(&self) -> usize {
        self.queue.len()
    }

    // ---- delete queue ----

    pub fn stage(&self, id: &AssetId) {
        self.queue.stage(&self.store, id);
    }

    pub fn is_staged(&self, id: &AssetId) -> bool {
        self.queue.contains(id)
    }

    pub fn unstage(&self, id: &AssetId) {
        self.queue.unstage(&self.store, id);
    }

    pub fn unstage_all(&self) {
        self.queue.clear(&self.store);
    }

    /// Commit the delete queue through the source's bulk deletion. On
    /// success returns how many assets were deleted; on failure the queue
    /// is left intact and the error says how many items failed.
    pub async fn commit_delete_queue(&self) -> Result<usize, StoreError> {
        let source = self.source.clone();
        let deleted = self
            .queue
            .commit(&self.store, move |ids| async move {
                source.delete_many(&ids).await
            })
            .await?;
        if !deleted.is_empty() {
            let mut roster = self.roster.write();
            roster.order.retain(|id| !deleted.contains(id));
            for id in &deleted {
                roster.metadata.remove(id);
            }
        }
        Ok(deleted.len())
    }

    /// Drop every decision and empty the queue. Irreversible.
    pub fn reset(&self) {
        self.store.reset();
        self.queue.discard_all();
    }

    pub fn durability(&self) -> Durability {
        self.store.durability()
    }

    // ---- renditions ----

    /// Fetch a rendition for display. `None` means show a placeholder and
    /// retry on the next view.
    pub async fn load(&self, id: &AssetId, quality: RenditionQuality) -> Option<Rendition> {
        self.engine.load(id, quality).await
    }

    /// Tell the engine the viewing position moved.
    pub fn advance_to(&self, position: usize) {
        let roster = self.roster.read();
        self.engine.update_window(position, &roster.order);
    }

    /// Cancel all in-flight loads and release the session.
    pub fn shutdown(&self) {
        self.engine.shutdown();
        self.cancel.cancel();
    }
}

impl<S> Drop for TriageSession<S> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
