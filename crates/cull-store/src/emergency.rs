#![forbid(unsafe_code)]

//! Emergency tier of the durability chain.
//!
//! Last resort before giving up entirely: a fixed-capacity map whose storage
//! is reserved up front, so it keeps working when the regular in-memory tier
//! has already hit resource exhaustion. Once the record cap is reached, new
//! inserts are dropped (logged once) rather than failing; this tier never
//! returns an error.

use std::{
    collections::{HashMap, VecDeque},
    sync::atomic::{AtomicBool, Ordering},
};

use cull_core::{AssetId, Counts};
use parking_lot::Mutex;
use tracing::warn;

use crate::{
    backend::StoreBackend,
    error::BackendResult,
    record::{CategoryRecord, UndoEntry},
    undo::UNDO_CAP,
};

/// Hard cap on retained category records.
const RECORD_CAP: usize = 4096;

#[derive(Debug)]
struct EmergencyTables {
    records: HashMap<AssetId, CategoryRecord>,
    undo: VecDeque<UndoEntry>,
}

#[derive(Debug)]
pub struct EmergencyBackend {
    tables: Mutex<EmergencyTables>,
    overflow_logged: AtomicBool,
}

impl EmergencyBackend {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(EmergencyTables {
                records: HashMap::with_capacity(RECORD_CAP),
                undo: VecDeque::with_capacity(UNDO_CAP),
            }),
            overflow_logged: AtomicBool::new(false),
        }
    }

    fn note_overflow(&self) {
        if !self.overflow_logged.swap(true, Ordering::Relaxed) {
            warn!(
                cap = RECORD_CAP,
                "emergency store is full; further assignments will not be retained"
            );
        }
    }
}

impl Default for EmergencyBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreBackend for EmergencyBackend {
    fn record(&self, id: &AssetId) -> BackendResult<Option<CategoryRecord>> {
        Ok(self.tables.lock().records.get(id).cloned())
    }

    fn upsert(&self, record: &CategoryRecord) -> BackendResult<()> {
        let mut tables = self.tables.lock();
        if !tables.records.contains_key(&record.asset) && tables.records.len() >= RECORD_CAP {
            drop(tables);
            self.note_overflow();
            return Ok(());
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
        if tables.undo.len() >= UNDO_CAP {
            tables.undo.pop_front();
        }
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

#[cfg(test)]
mod tests {
    use cull_core::Category;

    use super::*;

    #[test]
    fn drops_inserts_beyond_cap_without_failing() {
        let backend = EmergencyBackend::new();
        for n in 0..RECORD_CAP + 10 {
            backend
                .upsert(&CategoryRecord::new(
                    AssetId::new(format!("a{n}")),
                    Category::Keep,
                ))
                .unwrap();
        }

        assert_eq!(backend.counts().unwrap().keep, RECORD_CAP as u64);
        // Updates to existing records still land when full.
        backend
            .upsert(&CategoryRecord::new(AssetId::new("a0"), Category::Delete))
            .unwrap();
        assert_eq!(
            backend.record(&AssetId::new("a0")).unwrap().map(|r| r.category),
            Some(Category::Delete)
        );
    }

    #[test]
    fn undo_is_self_bounding() {
        let backend = EmergencyBackend::new();
        for n in 0..UNDO_CAP + 20 {
            backend
                .append_undo(&UndoEntry::new(
                    AssetId::new(format!("a{n}")),
                    None,
                    Category::Keep,
                ))
                .unwrap();
        }
        assert_eq!(backend.load_undo().unwrap().len(), UNDO_CAP);
    }
}
