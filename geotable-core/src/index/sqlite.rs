//! SQLite-backed reference index for inputs larger than the memory budget.
//!
//! Each element kind lives in its own database file with a single
//! `entries(id TEXT PRIMARY KEY, geometry BLOB)` table. Geometries are stored
//! as `bincode` blobs. Writes are grouped into transactions of
//! [`WRITE_BATCH`] statements; reads on the same connection observe pending
//! writes.
#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};

use geo::Geometry;
use log::debug;
use rusqlite::{Connection, OptionalExtension, Params, params};

use super::{IndexError, ReferenceIndex};
use crate::element::ElementKind;

/// Number of writes grouped into one transaction.
pub const WRITE_BATCH: usize = 50_000;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS entries (
    id TEXT PRIMARY KEY NOT NULL,
    geometry BLOB
) WITHOUT ROWID";

/// Disk-backed [`ReferenceIndex`] for one element kind.
pub struct SqliteIndex {
    kind: ElementKind,
    path: PathBuf,
    connection: Connection,
    pending_writes: usize,
}

impl SqliteIndex {
    /// Open or create the database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Open`] when the database cannot be opened or the
    /// schema cannot be created.
    pub fn open(kind: ElementKind, path: &Path) -> Result<Self, IndexError> {
        let open_error = |source| IndexError::Open {
            kind,
            path: path.to_path_buf(),
            source,
        };
        let connection = Connection::open(path).map_err(open_error)?;
        // Scratch data: durability is irrelevant, the file dies with the job.
        connection
            .pragma_update_and_check(None, "journal_mode", "OFF", |row| row.get::<_, String>(0))
            .map_err(open_error)?;
        connection
            .pragma_update(None, "synchronous", "OFF")
            .map_err(open_error)?;
        connection.execute_batch(SCHEMA).map_err(open_error)?;
        debug!("Opened {kind} index at {}", path.display());
        Ok(Self {
            kind,
            path: path.to_path_buf(),
            connection,
            pending_writes: 0,
        })
    }

    /// Database file backing this index.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn query_error(&self) -> impl Fn(rusqlite::Error) -> IndexError {
        let kind = self.kind;
        move |source| IndexError::Query { kind, source }
    }

    fn write<P: Params>(&mut self, sql: &str, params: P) -> Result<(), IndexError> {
        if self.pending_writes == 0 {
            self.connection
                .execute_batch("BEGIN")
                .map_err(self.query_error())?;
        }
        self.connection
            .prepare_cached(sql)
            .and_then(|mut statement| statement.execute(params))
            .map_err(self.query_error())?;
        self.pending_writes += 1;
        if self.pending_writes >= WRITE_BATCH {
            self.commit()?;
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<(), IndexError> {
        if self.pending_writes > 0 {
            self.connection
                .execute_batch("COMMIT")
                .map_err(self.query_error())?;
            self.pending_writes = 0;
        }
        Ok(())
    }
}

impl ReferenceIndex for SqliteIndex {
    fn register(&mut self, id: &str) -> Result<(), IndexError> {
        self.write(
            "INSERT OR IGNORE INTO entries (id, geometry) VALUES (?1, NULL)",
            params![id],
        )
    }

    fn contains(&self, id: &str) -> Result<bool, IndexError> {
        self.connection
            .prepare_cached("SELECT 1 FROM entries WHERE id = ?1")
            .and_then(|mut statement| statement.exists(params![id]))
            .map_err(self.query_error())
    }

    fn resolve(&mut self, id: &str, geometry: &Geometry<f64>) -> Result<(), IndexError> {
        let blob = bincode::serialize(geometry).map_err(|source| IndexError::Encode {
            kind: self.kind,
            id: id.to_owned(),
            source,
        })?;
        self.write(
            "UPDATE entries SET geometry = ?2 WHERE id = ?1",
            params![id, blob],
        )
    }

    fn get(&self, id: &str) -> Result<Option<Geometry<f64>>, IndexError> {
        let blob: Option<Option<Vec<u8>>> = self
            .connection
            .prepare_cached("SELECT geometry FROM entries WHERE id = ?1")
            .and_then(|mut statement| statement.query_row(params![id], |row| row.get(0)).optional())
            .map_err(self.query_error())?;
        let Some(Some(bytes)) = blob else {
            return Ok(None);
        };
        bincode::deserialize(&bytes)
            .map(Some)
            .map_err(|source| IndexError::Decode {
                kind: self.kind,
                id: id.to_owned(),
                source,
            })
    }

    fn len(&self) -> Result<u64, IndexError> {
        let count: i64 = self
            .connection
            .query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))
            .map_err(self.query_error())?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    fn clear(&mut self) -> Result<(), IndexError> {
        self.write("DELETE FROM entries", [])?;
        self.commit()
    }
}

impl std::fmt::Debug for SqliteIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteIndex")
            .field("kind", &self.kind)
            .field("path", &self.path)
            .field("pending_writes", &self.pending_writes)
            .finish_non_exhaustive()
    }
}
