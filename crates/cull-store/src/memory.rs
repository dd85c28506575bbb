#![forbid(unsafe_code)]

//! In-memory tier of the durability chain.
//!
//! Same two-table layout as the SQLite tier, held in a `HashMap` plus a
//! `VecDeque`. Growth goes through `try_reserve` so resource exhaustion
//! surfaces as [`BackendError::CapacityExhausted`] instead of aborting the
//! process; the store reacts by descending to the emergency tier.

use std::collections::{HashMap, VecDeque};

use cull_core::{AssetId, Counts};
use parking_lot::Mutex;

use crate::{
    backend::StoreBackend,
    error::{BackendError, BackendResult},
    record::{CategoryRecord, UndoEntry},
};

#[derive(Debug, Default)]
struct MemTables {
    records: HashMap<AssetId, CategoryRecord>,
    undo: VecDeque<UndoEntry>,
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    tables: Mutex<MemTables>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StoreBackend for MemoryBackend {
    fn record(&self, id: &AssetId) -> BackendResult<Option<CategoryRecord>> {
        Ok(self.tables.lock().records.get(id).cloned())
    }

    fn upsert(&self, record: &CategoryRecord) -> BackendResult<()> {
        let mut tables = self.tables.lock();
        if !tables.records.contains_key(&record.asset) {
            tables
                .records
                .try_reserve(1)
                .map_err(|_| BackendError::CapacityExhausted)?;
        }
        tables.records.insert(record.asset.clone(), record.clone());
        Ok(())
    }

    fn remove(&self, id: &AssetId) -> BackendResult<()> {
        self.tables.lock().records.remove(id);
        Ok(())
    }

    fn remove_many(&self, ids: &[AssetId]) -> BackendResult<()> {
        let mut tables = self.tables.lock();
        for id in ids {
            tables.records.remove(id);
        }
        Ok(())
    }

    fn counts(&self) -> BackendResult<Counts> {
        let tables = self.tables.lock();
        let mut counts = Counts::default();
        for record in tables.records.values() {
            counts.record(record.category);
        }
        Ok(counts)
    }

    fn clear_records(&self) -> BackendResult<()> {
        self.tables.lock().records.clear();
        Ok(())
    }

    fn load_undo(&self) -> BackendResult<Vec<UndoEntry>> {
        Ok(self.tables.lock().undo.iter().cloned().collect())
    }

    fn append_undo(&self, entry: &UndoEntry) -> BackendResult<()> {
        let mut tables = self.tables.lock();
        tables
            .undo
            .try_reserve(1)
            .map_err(|_| BackendError::CapacityExhausted)?;
        tables.undo.push_back(entry.clone());
        Ok(())
    }

    fn pop_undo(&self) -> BackendResult<Option<UndoEntry>> {
        Ok(self.tables.lock().undo.pop_back())
    }

    fn trim_undo(&self, keep: usize) -> BackendResult<()> {
        let mut tables = self.tables.lock();
        while tables.undo.len() > keep {
            tables.undo.pop_front();
        }
        Ok(())
    }

    fn remove_undo_for(&self, ids: &[AssetId]) -> BackendResult<()> {
        let mut tables = self.tables.lock();
        tables.undo.retain(|entry| !ids.contains(&entry.asset));
        Ok(())
    }

    fn clear_undo(&self) -> BackendResult<()> {
        self.tables.lock().undo.clear();
        Ok(())
    }
}
