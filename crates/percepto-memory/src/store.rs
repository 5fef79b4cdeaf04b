use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use percepto_core::{PerceptoError, Result};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::record::{MemoryKind, MemoryRecord, RecordFilter, ScoredRecord};
use crate::similarity::{cosine_similarity, from_blob, to_blob};

fn db_err(e: impl std::fmt::Display) -> PerceptoError {
    PerceptoError::Memory(e.to_string())
}

/// Embedding-indexed memory records, one named collection per store.
///
/// All collections share the `memory_records` table. The live collection is
/// only ever replaced through a [`ShadowCollection`] commit.
#[derive(Clone)]
pub struct MemoryStore {
    db: Arc<Mutex<Connection>>,
    collection: String,
}

impl MemoryStore {
    /// Open or create the memory database at the given path.
    pub fn open(path: &Path, collection: &str) -> Result<Self> {
        info!(?path, collection, "opening memory store");
        let conn = Connection::open(path).map_err(db_err)?;
        Self::init(conn, collection)
    }

    /// Open an in-memory database (for tests).
    pub fn open_in_memory(collection: &str) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::init(conn, collection)
    }

    fn init(conn: Connection, collection: &str) -> Result<Self> {
        // Enable WAL mode for concurrent reads
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(db_err)?;
        // The memory and transcript stores share one file through separate connections.
        conn.busy_timeout(std::time::Duration::from_secs(5))
            .map_err(db_err)?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS memory_records (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                content TEXT NOT NULL,
                embedding BLOB NOT NULL,
                dims INTEGER NOT NULL,
                kind TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE(collection, id)
            );
            CREATE INDEX IF NOT EXISTS idx_memory_order
                ON memory_records(collection, created_at, seq);
            ",
        )
        .map_err(db_err)?;

        // Shadows left behind by an interrupted consolidation are never committed.
        let stale = conn
            .execute(
                "DELETE FROM memory_records WHERE collection GLOB ?1",
                params![format!("{}__shadow_*", collection)],
            )
            .map_err(db_err)?;
        if stale > 0 {
            warn!(rows = stale, "removed abandoned shadow collection rows");
        }

        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
            collection: collection.to_string(),
        })
    }

    /// Name of the live collection.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Append a record to the live collection.
    pub fn insert(&self, record: &MemoryRecord) -> Result<()> {
        let db = self.db.lock();
        insert_row(&db, &self.collection, record)?;
        debug!(id = %record.id, kind = %record.kind, "memory record inserted");
        Ok(())
    }

    /// The `k` records most similar to `query`, best first.
    pub fn similarity_search(
        &self,
        query: &[f32],
        k: usize,
        filter: RecordFilter,
    ) -> Result<Vec<ScoredRecord>> {
        if k == 0 {
            return Ok(vec![]);
        }
        let records = {
            let db = self.db.lock();
            fetch_rows(&db, &self.collection, filter)?
        };
        let mut scored: Vec<ScoredRecord> = records
            .into_iter()
            .map(|record| {
                let score = cosine_similarity(query, &record.embedding);
                ScoredRecord { record, score }
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    /// All matching records, oldest first (insertion order breaks ties).
    pub fn bulk_fetch(&self, filter: RecordFilter) -> Result<Vec<MemoryRecord>> {
        let db = self.db.lock();
        fetch_rows(&db, &self.collection, filter)
    }

    /// Number of matching records in the live collection.
    pub fn count(&self, filter: RecordFilter) -> Result<usize> {
        let db = self.db.lock();
        let (clause, kind) = filter.sql();
        let sql = format!("SELECT COUNT(*) FROM memory_records WHERE collection = ?1{clause}");
        let count: i64 = match kind {
            Some(k) => db.query_row(&sql, params![self.collection, k], |r| r.get(0)),
            None => db.query_row(&sql, params![self.collection], |r| r.get(0)),
        }
        .map_err(db_err)?;
        Ok(count as usize)
    }

    /// Whether a record with exactly this content and kind exists.
    pub fn contains(&self, content: &str, kind: MemoryKind) -> Result<bool> {
        let db = self.db.lock();
        let found: Option<i64> = db
            .query_row(
                "SELECT seq FROM memory_records WHERE collection = ?1 AND kind = ?2 AND content = ?3 LIMIT 1",
                params![self.collection, kind.as_str(), content],
                |r| r.get(0),
            )
            .optional()
            .map_err(db_err)?;
        Ok(found.is_some())
    }

    /// Highest insertion sequence in the live collection (0 when empty).
    pub fn watermark(&self) -> Result<i64> {
        let db = self.db.lock();
        db.query_row(
            "SELECT COALESCE(MAX(seq), 0) FROM memory_records WHERE collection = ?1",
            params![self.collection],
            |r| r.get(0),
        )
        .map_err(db_err)
    }

    /// Start building a replacement for the live collection.
    ///
    /// On commit, live rows up to `watermark` are replaced by the shadow's
    /// rows; rows inserted after it are kept.
    pub fn begin_shadow(&self, watermark: i64) -> Result<ShadowCollection> {
        let name = format!("{}__shadow_{}", self.collection, Uuid::new_v4().simple());
        debug!(shadow = %name, watermark, "shadow collection started");
        Ok(ShadowCollection {
            db: Arc::clone(&self.db),
            live: self.collection.clone(),
            name,
            watermark,
            committed: false,
        })
    }
}

/// A replacement collection under construction.
///
/// Invisible to readers of the live collection. Dropping it without
/// committing deletes its rows.
pub struct ShadowCollection {
    db: Arc<Mutex<Connection>>,
    live: String,
    name: String,
    watermark: i64,
    committed: bool,
}

impl ShadowCollection {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Copy records verbatim (id, content, embedding, kind, timestamp).
    pub fn copy_from(&mut self, records: &[MemoryRecord]) -> Result<usize> {
        let db = self.db.lock();
        for record in records {
            insert_row(&db, &self.name, record)?;
        }
        Ok(records.len())
    }

    pub fn insert(&mut self, record: &MemoryRecord) -> Result<()> {
        let db = self.db.lock();
        insert_row(&db, &self.name, record)
    }

    /// Check the shadow holds `expected_rows` rows of a single dimensionality.
    pub fn validate(&self, expected_rows: usize) -> Result<()> {
        let db = self.db.lock();
        let (rows, dims): (i64, i64) = db
            .query_row(
                "SELECT COUNT(*), COUNT(DISTINCT dims) FROM memory_records WHERE collection = ?1",
                params![self.name],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .map_err(db_err)?;
        if rows as usize != expected_rows {
            return Err(PerceptoError::Memory(format!(
                "shadow collection has {} rows, expected {}",
                rows, expected_rows
            )));
        }
        if dims > 1 {
            return Err(PerceptoError::Memory(format!(
                "shadow collection mixes {} embedding dimensions",
                dims
            )));
        }
        Ok(())
    }

    /// Atomically replace the live collection with this one.
    /// Returns the number of rows moved into the live collection.
    pub fn commit(mut self) -> Result<usize> {
        let (evicted, moved) = {
            let mut db = self.db.lock();
            let tx = db.transaction().map_err(db_err)?;
            let evicted = tx
                .execute(
                    "DELETE FROM memory_records WHERE collection = ?1 AND seq <= ?2",
                    params![self.live, self.watermark],
                )
                .map_err(db_err)?;
            let moved = tx
                .execute(
                    "UPDATE memory_records SET collection = ?1 WHERE collection = ?2",
                    params![self.live, self.name],
                )
                .map_err(db_err)?;
            tx.commit().map_err(db_err)?;
            (evicted, moved)
        };
        self.committed = true;
        info!(collection = %self.live, evicted, moved, "memory collection replaced");
        Ok(moved)
    }
}

impl Drop for ShadowCollection {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        let db = self.db.lock();
        match db.execute(
            "DELETE FROM memory_records WHERE collection = ?1",
            params![self.name],
        ) {
            Ok(rows) => debug!(shadow = %self.name, rows, "shadow collection abandoned"),
            Err(e) => warn!(shadow = %self.name, error = %e, "failed to clean up shadow collection"),
        }
    }
}

fn insert_row(conn: &Connection, collection: &str, record: &MemoryRecord) -> Result<()> {
    if record.embedding.is_empty() {
        return Err(PerceptoError::Memory(format!(
            "record {} has an empty embedding",
            record.id
        )));
    }
    let existing: Option<i64> = conn
        .query_row(
            "SELECT dims FROM memory_records WHERE collection = ?1 LIMIT 1",
            params![collection],
            |r| r.get(0),
        )
        .optional()
        .map_err(db_err)?;
    if let Some(dims) = existing
        && dims as usize != record.embedding.len()
    {
        return Err(PerceptoError::Memory(format!(
            "embedding dimension {} does not match collection dimension {}",
            record.embedding.len(),
            dims
        )));
    }

    conn.execute(
        "INSERT INTO memory_records (collection, id, content, embedding, dims, kind, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            collection,
            record.id,
            record.content,
            to_blob(&record.embedding),
            record.embedding.len() as i64,
            record.kind.as_str(),
            record.created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
        ],
    )
    .map_err(db_err)?;
    Ok(())
}

type RawRow = (String, String, Vec<u8>, String, String);

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn fetch_rows(conn: &Connection, collection: &str, filter: RecordFilter) -> Result<Vec<MemoryRecord>> {
    let (clause, kind) = filter.sql();
    let sql = format!(
        "SELECT id, content, embedding, kind, created_at FROM memory_records
         WHERE collection = ?1{clause} ORDER BY created_at, seq"
    );
    let mut stmt = conn.prepare(&sql).map_err(db_err)?;
    let rows = match kind {
        Some(k) => stmt.query_map(params![collection, k], read_row),
        None => stmt.query_map(params![collection], read_row),
    }
    .map_err(db_err)?
    .collect::<rusqlite::Result<Vec<RawRow>>>()
    .map_err(db_err)?;

    rows.into_iter()
        .map(|(id, content, blob, kind, created_at)| {
            let embedding = from_blob(&blob)
                .ok_or_else(|| PerceptoError::Memory(format!("record {id} has a corrupt embedding")))?;
            let kind = MemoryKind::parse(&kind)
                .ok_or_else(|| PerceptoError::Memory(format!("record {id} has unknown kind '{kind}'")))?;
            let created_at = DateTime::parse_from_rfc3339(&created_at)
                .map_err(db_err)?
                .with_timezone(&Utc);
            Ok(MemoryRecord {
                id,
                content,
                embedding,
                kind,
                created_at,
            })
        })
        .collect()
}
