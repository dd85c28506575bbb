#![forbid(unsafe_code)]

//! SQLite tier of the durability chain.
//!
//! Two tables, created on open, tolerant of being empty on first run:
//!
//! ```text
//! category_records(asset_id TEXT PRIMARY KEY, category TEXT, assigned_at INTEGER)
//! undo_entries(seq INTEGER PRIMARY KEY AUTOINCREMENT, asset_id TEXT,
//!              previous_category TEXT NULL, new_category TEXT, recorded_at INTEGER)
//! ```
//!
//! Timestamps are integer milliseconds since the Unix epoch.

use std::{
    path::Path,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use cull_core::{AssetId, Category, Counts};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};

use crate::{
    backend::StoreBackend,
    error::{BackendError, BackendResult},
    record::{CategoryRecord, UndoEntry},
};

pub struct SqliteBackend {
    // rusqlite's Connection is Send but not Sync; all calls already happen
    // under the store's write lock, the Mutex just satisfies the trait bound.
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend").finish_non_exhaustive()
    }
}

impl SqliteBackend {
    /// Open (or create) the database at `path` and ensure the schema exists.
    pub fn open(path: &Path) -> BackendResult<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS category_records (
                 asset_id    TEXT PRIMARY KEY,
                 category    TEXT NOT NULL,
                 assigned_at INTEGER NOT NULL
             );
             CREATE TABLE IF NOT EXISTS undo_entries (
                 seq               INTEGER PRIMARY KEY AUTOINCREMENT,
                 asset_id          TEXT NOT NULL,
                 previous_category TEXT,
                 new_category      TEXT NOT NULL,
                 recorded_at       INTEGER NOT NULL
             );",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn to_millis(t: SystemTime) -> i64 {
    t.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

fn from_millis(ms: i64) -> SystemTime {
    UNIX_EPOCH + Duration::from_millis(ms.max(0) as u64)
}

fn parse_category(s: &str) -> BackendResult<Category> {
    Category::parse(s).ok_or_else(|| BackendError::Corrupt(format!("unknown category `{s}`")))
}

fn parse_optional_category(s: Option<&str>) -> BackendResult<Option<Category>> {
    s.map(parse_category).transpose()
}

impl StoreBackend for SqliteBackend {
    fn record(&self, id: &AssetId) -> BackendResult<Option<CategoryRecord>> {
        let conn = self.conn.lock();
        let row: Option<(String, i64)> = conn
            .query_row(
                "SELECT category, assigned_at FROM category_records WHERE asset_id = ?1",
                params![id.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((category, assigned_at)) = row else {
            return Ok(None);
        };
        Ok(Some(CategoryRecord {
            asset: id.clone(),
            category: parse_category(&category)?,
            assigned_at: from_millis(assigned_at),
        }))
    }

    fn upsert(&self, record: &CategoryRecord) -> BackendResult<()> {
        self.conn.lock().execute(
            "INSERT INTO category_records (asset_id, category, assigned_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(asset_id) DO UPDATE SET
                 category = excluded.category,
                 assigned_at = excluded.assigned_at",
            params![
                record.asset.as_str(),
                record.category.as_str(),
                to_millis(record.assigned_at)
            ],
        )?;
        Ok(())
    }

    fn remove(&self, id: &AssetId) -> BackendResult<()> {
        self.conn.lock().execute(
            "DELETE FROM category_records WHERE asset_id = ?1",
            params![id.as_str()],
        )?;
        Ok(())
    }

    fn remove_many(&self, ids: &[AssetId]) -> BackendResult<()> {
        // One transaction for the whole batch: one durable round-trip no
        // matter how many ids are removed.
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare("DELETE FROM category_records WHERE asset_id = ?1")?;
            for id in ids {
                stmt.execute(params![id.as_str()])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn counts(&self) -> BackendResult<Counts> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT category, COUNT(*) FROM category_records GROUP BY category")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = Counts::default();
        for row in rows {
            let (category, n) = row?;
            match parse_category(&category)? {
                Category::Keep => counts.keep = n.max(0) as u64,
                Category::Delete => counts.delete = n.max(0) as u64,
                Category::Favorite => counts.favorite = n.max(0) as u64,
            }
        }
        Ok(counts)
    }

    fn clear_records(&self) -> BackendResult<()> {
        self.conn.lock().execute("DELETE FROM category_records", [])?;
        Ok(())
    }

    fn load_undo(&self) -> BackendResult<Vec<UndoEntry>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT asset_id, previous_category, new_category, recorded_at
             FROM undo_entries ORDER BY seq ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (asset, previous, new, recorded_at) = row?;
            entries.push(UndoEntry {
                asset: AssetId::new(asset),
                previous: parse_optional_category(previous.as_deref())?,
                new: parse_category(&new)?,
                recorded_at: from_millis(recorded_at),
            });
        }
        Ok(entries)
    }

    fn append_undo(&self, entry: &UndoEntry) -> BackendResult<()> {
        self.conn.lock().execute(
            "INSERT INTO undo_entries (asset_id, previous_category, new_category, recorded_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                entry.asset.as_str(),
                entry.previous.map(Category::as_str),
                entry.new.as_str(),
                to_millis(entry.recorded_at)
            ],
        )?;
        Ok(())
    }

    fn pop_undo(&self) -> BackendResult<Option<UndoEntry>> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let row: Option<(i64, String, Option<String>, String, i64)> = tx
            .query_row(
                "SELECT seq, asset_id, previous_category, new_category, recorded_at
                 FROM undo_entries ORDER BY seq DESC LIMIT 1",
                [],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                    ))
                },
            )
            .optional()?;

        let Some((seq, asset, previous, new, recorded_at)) = row else {
            tx.commit()?;
            return Ok(None);
        };
        tx.execute("DELETE FROM undo_entries WHERE seq = ?1", params![seq])?;
        tx.commit()?;

        Ok(Some(UndoEntry {
            asset: AssetId::new(asset),
            previous: parse_optional_category(previous.as_deref())?,
            new: parse_category(&new)?,
            recorded_at: from_millis(recorded_at),
        }))
    }

    fn trim_undo(&self, keep: usize) -> BackendResult<()> {
        self.conn.lock().execute(
            "DELETE FROM undo_entries WHERE seq NOT IN (
                 SELECT seq FROM undo_entries ORDER BY seq DESC LIMIT ?1
             )",
            params![keep as i64],
        )?;
        Ok(())
    }

    fn remove_undo_for(&self, ids: &[AssetId]) -> BackendResult<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare("DELETE FROM undo_entries WHERE asset_id = ?1")?;
            for id in ids {
                stmt.execute(params![id.as_str()])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn clear_undo(&self) -> BackendResult<()> {
        self.conn.lock().execute("DELETE FROM undo_entries", [])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_temp() -> (tempfile::TempDir, SqliteBackend) {
        let dir = tempfile::tempdir().unwrap();
        let backend = SqliteBackend::open(&dir.path().join("decisions.db")).unwrap();
        (dir, backend)
    }

    #[test]
    fn empty_on_first_run() {
        let (_dir, backend) = open_temp();
        assert!(backend.record(&AssetId::new("a")).unwrap().is_none());
        assert_eq!(backend.counts().unwrap(), Counts::default());
        assert!(backend.load_undo().unwrap().is_empty());
    }

    #[test]
    fn upsert_overwrites_existing_record() {
        let (_dir, backend) = open_temp();
        let id = AssetId::new("a");

        backend
            .upsert(&CategoryRecord::new(id.clone(), Category::Keep))
            .unwrap();
        backend
            .upsert(&CategoryRecord::new(id.clone(), Category::Favorite))
            .unwrap();

        let record = backend.record(&id).unwrap().unwrap();
        assert_eq!(record.category, Category::Favorite);
        assert_eq!(backend.counts().unwrap().total(), 1);
    }

    #[test]
    fn remove_many_in_one_pass() {
        let (_dir, backend) = open_temp();
        let ids: Vec<AssetId> = (0..10).map(|n| AssetId::new(format!("a{n}"))).collect();
        for id in &ids {
            backend
                .upsert(&CategoryRecord::new(id.clone(), Category::Keep))
                .unwrap();
        }

        backend.remove_many(&ids[..7]).unwrap();
        assert_eq!(backend.counts().unwrap().keep, 3);
    }

    #[test]
    fn undo_entries_pop_newest_and_trim_oldest() {
        let (_dir, backend) = open_temp();
        for n in 0..5 {
            backend
                .append_undo(&UndoEntry::new(
                    AssetId::new(format!("a{n}")),
                    None,
                    Category::Keep,
                ))
                .unwrap();
        }

        backend.trim_undo(3).unwrap();
        let entries = backend.load_undo().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].asset, AssetId::new("a2"));

        let popped = backend.pop_undo().unwrap().unwrap();
        assert_eq!(popped.asset, AssetId::new("a4"));
        assert_eq!(backend.load_undo().unwrap().len(), 2);
    }

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("decisions.db");
        let id = AssetId::new("persisted");

        {
            let backend = SqliteBackend::open(&path).unwrap();
            backend
                .upsert(&CategoryRecord::new(id.clone(), Category::Favorite))
                .unwrap();
            backend
                .append_undo(&UndoEntry::new(id.clone(), None, Category::Favorite))
                .unwrap();
        }

        let backend = SqliteBackend::open(&path).unwrap();
        assert_eq!(
            backend.record(&id).unwrap().map(|r| r.category),
            Some(Category::Favorite)
        );
        assert_eq!(backend.load_undo().unwrap().len(), 1);
    }

    #[test]
    fn previous_category_round_trips_as_null() {
        let (_dir, backend) = open_temp();
        backend
            .append_undo(&UndoEntry::new(
                AssetId::new("a"),
                Some(Category::Keep),
                Category::Delete,
            ))
            .unwrap();
        backend
            .append_undo(&UndoEntry::new(AssetId::new("b"), None, Category::Keep))
            .unwrap();

        let entries = backend.load_undo().unwrap();
        assert_eq!(entries[0].previous, Some(Category::Keep));
        assert_eq!(entries[1].previous, None);
    }
}
