use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row};
use tokio_util::sync::CancellationToken;

use super::{ensure_active, schema, Entity, EntityStore, StoreError, StoreResult};
use crate::models::{Capture, Collection};

/// Durable store backed by a single SQLite connection.
///
/// Cloning shares the connection. Read-modify-write operations hold the lock
/// for their whole duration, so concurrent updates cannot be lost.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open(path: PathBuf) -> Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Database path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_default() -> Result<Self> {
        Self::open(Self::default_path()?)
    }

    pub fn default_path() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("", "", "divergent-flow")
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        Ok(dirs.data_dir().join("divergent-flow.db"))
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.lock()?;
        schema::run_migrations(&conn)
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

// ============================================================
// Captures
// ============================================================

const CAPTURE_COLUMNS: &str = "id, text, created_at, inferred_type, type_confidence";

fn capture_from_row(row: &Row<'_>) -> rusqlite::Result<Capture> {
    Ok(Capture {
        id: row.get(0)?,
        text: row.get(1)?,
        created_at: row.get(2)?,
        inferred_type: row.get(3)?,
        type_confidence: row.get(4)?,
    })
}

fn find_capture(conn: &Connection, id: &str) -> StoreResult<Option<Capture>> {
    let capture = conn
        .query_row(
            &format!("SELECT {CAPTURE_COLUMNS} FROM captures WHERE id = ?"),
            [id],
            capture_from_row,
        )
        .optional()?;
    Ok(capture)
}

impl EntityStore<Capture> for SqliteStore {
    fn get_all(&self, cancel: &CancellationToken) -> StoreResult<Vec<Capture>> {
        ensure_active(cancel)?;
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare(&format!("SELECT {CAPTURE_COLUMNS} FROM captures ORDER BY rowid"))?;
        let captures = stmt
            .query_map([], capture_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(captures)
    }

    fn get_by_id(&self, id: &str, cancel: &CancellationToken) -> StoreResult<Option<Capture>> {
        ensure_active(cancel)?;
        let conn = self.lock()?;
        find_capture(&conn, id)
    }

    fn insert(&self, capture: Capture, cancel: &CancellationToken) -> StoreResult<Capture> {
        ensure_active(cancel)?;
        let conn = self.lock()?;
        if find_capture(&conn, &capture.id)?.is_some() {
            return Err(StoreError::DuplicateId {
                kind: Capture::KIND,
                id: capture.id,
            });
        }

        conn.execute(
            "INSERT INTO captures (id, text, created_at, inferred_type, type_confidence)
             VALUES (?, ?, ?, ?, ?)",
            (
                &capture.id,
                &capture.text,
                capture.created_at,
                &capture.inferred_type,
                capture.type_confidence,
            ),
        )?;

        Ok(capture)
    }

    fn update(
        &self,
        id: &str,
        changes: <Capture as Entity>::Changes,
        cancel: &CancellationToken,
    ) -> StoreResult<Option<Capture>> {
        ensure_active(cancel)?;
        let conn = self.lock()?;
        let Some(mut capture) = find_capture(&conn, id)? else {
            return Ok(None);
        };
        capture.apply(changes);

        conn.execute(
            "UPDATE captures SET text = ?, inferred_type = ?, type_confidence = ? WHERE id = ?",
            (
                &capture.text,
                &capture.inferred_type,
                capture.type_confidence,
                id,
            ),
        )?;

        Ok(Some(capture))
    }

    fn delete(&self, id: &str, cancel: &CancellationToken) -> StoreResult<bool> {
        ensure_active(cancel)?;
        let conn = self.lock()?;
        let rows = conn.execute("DELETE FROM captures WHERE id = ?", [id])?;
        Ok(rows > 0)
    }
}

// ============================================================
// Collections
// ============================================================

const COLLECTION_COLUMNS: &str = "id, name, item_ids, created_at";

/// `item_ids` is stored as a JSON array; decoding happens outside the row
/// closure so encoding errors surface as [`StoreError::Encoding`].
struct CollectionRow {
    id: String,
    name: String,
    item_ids: String,
    created_at: i64,
}

impl CollectionRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            item_ids: row.get(2)?,
            created_at: row.get(3)?,
        })
    }

    fn decode(self) -> StoreResult<Collection> {
        Ok(Collection {
            id: self.id,
            name: self.name,
            item_ids: serde_json::from_str(&self.item_ids)?,
            created_at: self.created_at,
        })
    }
}

fn find_collection(conn: &Connection, id: &str) -> StoreResult<Option<Collection>> {
    conn.query_row(
        &format!("SELECT {COLLECTION_COLUMNS} FROM collections WHERE id = ?"),
        [id],
        CollectionRow::read,
    )
    .optional()?
    .map(CollectionRow::decode)
    .transpose()
}

impl EntityStore<Collection> for SqliteStore {
    fn get_all(&self, cancel: &CancellationToken) -> StoreResult<Vec<Collection>> {
        ensure_active(cancel)?;
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLLECTION_COLUMNS} FROM collections ORDER BY rowid"
        ))?;
        let rows = stmt
            .query_map([], CollectionRow::read)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(CollectionRow::decode).collect()
    }

    fn get_by_id(&self, id: &str, cancel: &CancellationToken) -> StoreResult<Option<Collection>> {
        ensure_active(cancel)?;
        let conn = self.lock()?;
        find_collection(&conn, id)
    }

    fn insert(&self, collection: Collection, cancel: &CancellationToken) -> StoreResult<Collection> {
        ensure_active(cancel)?;
        let conn = self.lock()?;
        if find_collection(&conn, &collection.id)?.is_some() {
            return Err(StoreError::DuplicateId {
                kind: Collection::KIND,
                id: collection.id,
            });
        }

        conn.execute(
            "INSERT INTO collections (id, name, item_ids, created_at) VALUES (?, ?, ?, ?)",
            (
                &collection.id,
                &collection.name,
                serde_json::to_string(&collection.item_ids)?,
                collection.created_at,
            ),
        )?;

        Ok(collection)
    }

    fn update(
        &self,
        id: &str,
        changes: <Collection as Entity>::Changes,
        cancel: &CancellationToken,
    ) -> StoreResult<Option<Collection>> {
        ensure_active(cancel)?;
        let conn = self.lock()?;
        let Some(mut collection) = find_collection(&conn, id)? else {
            return Ok(None);
        };
        collection.apply(changes);

        conn.execute(
            "UPDATE collections SET name = ?, item_ids = ? WHERE id = ?",
            (
                &collection.name,
                serde_json::to_string(&collection.item_ids)?,
                id,
            ),
        )?;

        Ok(Some(collection))
    }

    fn delete(&self, id: &str, cancel: &CancellationToken) -> StoreResult<bool> {
        ensure_active(cancel)?;
        let conn = self.lock()?;
        let rows = conn.execute("DELETE FROM collections WHERE id = ?", [id])?;
        Ok(rows > 0)
    }
}
