#![forbid(unsafe_code)]

//! Ties [`LoadRace`] and [`CacheWindow`] together over an [`AssetSource`].
//!
//! Renditions live in a bounded LRU cache; window moves warm/cool the source
//! and keep a few upcoming items preloading in the background with bounded
//! fan-out. Advancing past an item cancels its in-flight preload.

use std::{collections::HashMap, num::NonZeroUsize, sync::Arc};

use cull_core::AssetId;
use lru::LruCache;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::{
    race::{LoadRace, RaceOutcome},
    rendition::{DeadlineConfig, Rendition, RenditionQuality},
    source::AssetSource,
    window::{CacheWindow, DEFAULT_WINDOW_SIZE},
};

/// Default in-memory rendition cache capacity: the warm window at a couple
/// of qualities, plus slack for the items just behind the user.
const DEFAULT_CACHE_CAPACITY: NonZeroUsize = match NonZeroUsize::new(24) {
    Some(v) => v,
    None => unreachable!(),
};

/// Tuning for the cache/load engine.
#[derive(Clone, Debug)]
pub struct EngineOptions {
    /// How many upcoming items the warm window covers.
    pub window_size: usize,
    /// How many upcoming items get a background preview preload.
    pub preload_depth: usize,
    /// LRU capacity of the in-memory rendition cache.
    pub cache_capacity: NonZeroUsize,
    pub deadlines: DeadlineConfig,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            preload_depth: 3,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            deadlines: DeadlineConfig::default(),
        }
    }
}

impl EngineOptions {
    pub fn with_window_size(mut self, size: usize) -> Self {
        self.window_size = size;
        self
    }

    pub fn with_preload_depth(mut self, depth: usize) -> Self {
        self.preload_depth = depth;
        self
    }

    pub fn with_deadlines(mut self, deadlines: DeadlineConfig) -> Self {
        self.deadlines = deadlines;
        self
    }
}

type RenditionKey = (AssetId, RenditionQuality);

/// The asset cache/load engine.
///
/// All methods take `&self`; fetches run fully in parallel with each other.
/// The constructor takes the session's cancellation token; `shutdown` (or
/// cancelling that token upstream) releases every in-flight load.
pub struct AssetCacheEngine<S> {
    source: Arc<S>,
    options: EngineOptions,
    window: Mutex<CacheWindow>,
    renditions: Arc<Mutex<LruCache<RenditionKey, Rendition>>>,
    /// In-flight preload tasks by asset, each with its own child token.
    preloads: Arc<Mutex<HashMap<AssetId, CancellationToken>>>,
    cancel: CancellationToken,
}

impl<S> std::fmt::Debug for AssetCacheEngine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetCacheEngine")
            .field("cached", &self.renditions.lock().len())
            .field("preloading", &self.preloads.lock().len())
            .finish_non_exhaustive()
    }
}

impl<S: AssetSource> AssetCacheEngine<S> {
    pub fn new(source: Arc<S>, options: EngineOptions, cancel: CancellationToken) -> Self {
        let window = CacheWindow::new(options.window_size);
        Self {
            source,
            renditions: Arc::new(Mutex::new(LruCache::new(options.cache_capacity))),
            preloads: Arc::new(Mutex::new(HashMap::new())),
            window: Mutex::new(window),
            options,
            cancel,
        }
    }

    /// Fetch a rendition, racing the source against the quality-class
    /// deadline. `None` means nothing usable arrived in time; the caller
    /// shows a placeholder and retries on the next view.
    pub async fn load(&self, id: &AssetId, quality: RenditionQuality) -> Option<Rendition> {
        let key = (id.clone(), quality);
        if let Some(hit) = self.renditions.lock().get(&key) {
            trace!(asset = %id, %quality, "rendition cache hit");
            return Some(hit.clone());
        }

        let outcome = fetch(
            self.source.clone(),
            id.clone(),
            quality,
            self.options.deadlines,
            &self.cancel.child_token(),
        )
        .await;

        match outcome {
            RaceOutcome::Completed(rendition) => {
                self.renditions.lock().put(key, rendition.clone());
                Some(rendition)
            }
            RaceOutcome::TimedOut(Some(partial)) => {
                debug!(asset = %id, %quality, "deadline hit; serving partial rendition");
                Some(partial)
            }
            RaceOutcome::TimedOut(None) => {
                debug!(asset = %id, %quality, "deadline hit with nothing to show");
                None
            }
            RaceOutcome::Cancelled => {
                debug!(asset = %id, %quality, "load cancelled");
                None
            }
        }
    }

    /// Recompute the warm window for `position`, warm/cool the source
    /// accordingly, and keep the next few items preloading. Called on every
    /// viewing-position change.
    pub fn update_window(&self, position: usize, order: &[AssetId]) {
        let diff = self.window.lock().advance(position, order);

        if !diff.to_stop.is_empty() {
            self.source.stop_warming(&diff.to_stop);

            // Items that left the window: cancel their preloads and drop
            // their cached renditions.
            {
                let mut preloads = self.preloads.lock();
                for id in &diff.to_stop {
                    if let Some(token) = preloads.remove(id) {
                        token.cancel();
                    }
                }
            }
            let mut cache = self.renditions.lock();
            let stale: Vec<RenditionKey> = cache
                .iter()
                .map(|(key, _)| key.clone())
                .filter(|(id, _)| diff.to_stop.contains(id))
                .collect();
            for key in stale {
                cache.pop(&key);
            }
        }

        if !diff.to_start.is_empty() {
            self.source.start_warming(&diff.to_start);
        }

        self.spawn_preloads(position, order);
    }

    /// Opportunistically fetch preview renditions for the next few items so
    /// that advancing is usually a cache hit. Fan-out is bounded by
    /// `preload_depth` plus the one-task-per-asset dedup.
    fn spawn_preloads(&self, position: usize, order: &[AssetId]) {
        let upcoming = order
            .iter()
            .skip(position + 1)
            .take(self.options.preload_depth);

        for id in upcoming {
            let key = (id.clone(), RenditionQuality::Preview);
            if self.renditions.lock().contains(&key) {
                continue;
            }

            let token = self.cancel.child_token();
            {
                let mut preloads = self.preloads.lock();
                if preloads.contains_key(id) {
                    continue;
                }
                preloads.insert(id.clone(), token.clone());
            }

            trace!(asset = %id, "preloading preview rendition");
            let source = self.source.clone();
            let renditions = self.renditions.clone();
            let preloads = self.preloads.clone();
            let id = id.clone();
            let deadlines = self.options.deadlines;
            tokio::spawn(async move {
                let outcome = fetch(source, id.clone(), RenditionQuality::Preview, deadlines, &token).await;
                if let RaceOutcome::Completed(rendition) = outcome {
                    renditions
                        .lock()
                        .put((rendition.asset.clone(), rendition.quality), rendition);
                }
                preloads.lock().remove(&id);
            });
        }
    }

    /// Cancel every in-flight load and preload.
    pub fn shutdown(&self) {
        self.cancel.cancel();
        let stopped = self.window.lock().clear();
        if !stopped.is_empty() {
            self.source.stop_warming(&stopped);
        }
        self.preloads.lock().clear();
    }

    /// Whether a rendition for `(id, quality)` is already in the cache.
    /// Does not touch LRU recency.
    pub fn is_cached(&self, id: &AssetId, quality: RenditionQuality) -> bool {
        self.renditions.lock().contains(&(id.clone(), quality))
    }
}

/// One raced fetch against the source. Shared by `load` and the preload
/// tasks.
async fn fetch<S: AssetSource>(
    source: Arc<S>,
    id: AssetId,
    quality: RenditionQuality,
    deadlines: DeadlineConfig,
    cancel: &CancellationToken,
) -> RaceOutcome<Rendition> {
    let deadline = deadlines.deadline_for(quality);
    LoadRace::run(
        move |progress| async move {
            match source.load_rendition(&id, quality, progress).await {
                Ok(rendition) => Some(rendition),
                Err(err) => {
                    debug!(asset = %id, %quality, %err, "rendition load failed");
                    None
                }
            }
        },
        deadline,
        cancel,
    )
    .await
}
