#![forbid(unsafe_code)]

use std::{
    collections::{HashMap, HashSet},
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use cull_core::{AssetId, AssetMetadata};
use cull_engine::{AssetEntry, AssetSource, ProgressSink, Rendition, RenditionQuality, SourceError};
use parking_lot::Mutex;

#[derive(Default)]
struct Script {
    items: Vec<AssetEntry>,
    default_latency: Duration,
    latency: HashMap<AssetId, Duration>,
    /// Loads for these ids never complete (cancellation/deadline tests).
    stalled: HashSet<AssetId>,
    /// Loads for these ids fail outright.
    failing: HashSet<AssetId>,
    /// Ids whose loads publish a degraded partial before stalling.
    partial_then_stall: HashSet<AssetId>,
}

#[derive(Default)]
struct Journal {
    started: Vec<Vec<AssetId>>,
    stopped: Vec<Vec<AssetId>>,
    loads: Vec<(AssetId, RenditionQuality)>,
    deleted: Vec<AssetId>,
}

/// In-memory [`AssetSource`] driven by a per-test script.
#[derive(Default)]
pub struct ScriptedSource {
    script: Mutex<Script>,
    journal: Mutex<Journal>,
    fail_deletes: AtomicBool,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Source pre-populated with `n` photo assets named `asset-0..n`.
    pub fn with_photos(n: usize) -> Self {
        let source = Self::new();
        {
            let mut script = source.script.lock();
            script.items = (0..n)
                .map(|i| AssetEntry::new(format!("asset-{i}"), AssetMetadata::photo()))
                .collect();
        }
        source
    }

    pub fn id(n: usize) -> AssetId {
        AssetId::new(format!("asset-{n}"))
    }

    // ---- scripting ----

    pub fn push_entry(&self, entry: AssetEntry) {
        self.script.lock().items.push(entry);
    }

    pub fn set_default_latency(&self, latency: Duration) {
        self.script.lock().default_latency = latency;
    }

    pub fn set_latency(&self, id: AssetId, latency: Duration) {
        self.script.lock().latency.insert(id, latency);
    }

    /// Loads for `id` hang until cancelled or timed out.
    pub fn stall(&self, id: AssetId) {
        self.script.lock().stalled.insert(id);
    }

    /// Loads for `id` publish a degraded partial, then hang.
    pub fn partial_then_stall(&self, id: AssetId) {
        self.script.lock().partial_then_stall.insert(id);
    }

    /// Loads for `id` fail immediately.
    pub fn fail_loads(&self, id: AssetId) {
        self.script.lock().failing.insert(id);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    // ---- journals ----

    pub fn started_log(&self) -> Vec<Vec<AssetId>> {
        self.journal.lock().started.clone()
    }

    pub fn stopped_log(&self) -> Vec<Vec<AssetId>> {
        self.journal.lock().stopped.clone()
    }

    pub fn load_log(&self) -> Vec<(AssetId, RenditionQuality)> {
        self.journal.lock().loads.clone()
    }

    pub fn deleted_log(&self) -> Vec<AssetId> {
        self.journal.lock().deleted.clone()
    }

    /// Every id currently hinted warm (started minus stopped).
    pub fn currently_warm(&self) -> HashSet<AssetId> {
        let journal = self.journal.lock();
        let mut warm: HashSet<AssetId> = HashSet::new();
        for batch in &journal.started {
            warm.extend(batch.iter().cloned());
        }
        for batch in &journal.stopped {
            for id in batch {
                warm.remove(id);
            }
        }
        warm
    }

    fn payload(id: &AssetId, quality: RenditionQuality) -> Bytes {
        Bytes::from(format!("{id}:{quality}"))
    }
}

#[async_trait]
impl AssetSource for ScriptedSource {
    async fn fetch_all(&self) -> Result<Vec<AssetEntry>, SourceError> {
        Ok(self.script.lock().items.clone())
    }

    async fn load_rendition(
        &self,
        id: &AssetId,
        quality: RenditionQuality,
        progress: ProgressSink<Rendition>,
    ) -> Result<Rendition, SourceError> {
        let (latency, stalled, failing, partial) = {
            let script = self.script.lock();
            (
                script
                    .latency
                    .get(id)
                    .copied()
                    .unwrap_or(script.default_latency),
                script.stalled.contains(id),
                script.failing.contains(id),
                script.partial_then_stall.contains(id),
            )
        };
        self.journal.lock().loads.push((id.clone(), quality));

        if failing {
            return Err(SourceError::RenditionUnavailable(id.to_string()));
        }
        if partial {
            progress.publish(Rendition::new(
                id.clone(),
                RenditionQuality::Thumbnail,
                Self::payload(id, RenditionQuality::Thumbnail),
            ));
            std::future::pending::<()>().await;
        }
        if stalled {
            std::future::pending::<()>().await;
        }
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        Ok(Rendition::new(
            id.clone(),
            quality,
            Self::payload(id, quality),
        ))
    }

    fn start_warming(&self, ids: &[AssetId]) {
        self.journal.lock().started.push(ids.to_vec());
    }

    fn stop_warming(&self, ids: &[AssetId]) {
        self.journal.lock().stopped.push(ids.to_vec());
    }

    async fn delete_many(&self, ids: &[AssetId]) -> Result<(), SourceError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(SourceError::DeletionRejected("scripted failure".into()));
        }
        {
            let mut script = self.script.lock();
            script.items.retain(|entry| !ids.contains(&entry.id));
        }
        self.journal.lock().deleted.extend(ids.iter().cloned());
        Ok(())
    }
}
