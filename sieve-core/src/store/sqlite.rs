//! SQLite-backed key-value store.
#![forbid(unsafe_code)]

use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use rusqlite::{Connection, OptionalExtension};

use super::{KvStore, StoreError, WriteBatch};

const CREATE_SCHEMA: &str = "CREATE TABLE IF NOT EXISTS entries (
    key BLOB PRIMARY KEY,
    value BLOB NOT NULL
) WITHOUT ROWID";
const UPSERT: &str = "INSERT OR REPLACE INTO entries (key, value) VALUES (?1, ?2)";

/// A key-value store kept in a single SQLite table.
///
/// Each [`WriteBatch`] is applied inside one transaction with
/// `INSERT OR REPLACE`, so writing the same batch twice leaves the store
/// unchanged. Parent directories are created on open.
///
/// # Examples
/// ```no_run
/// use camino::Utf8Path;
/// use sieve_core::store::{KvStore, SqliteKvStore, WriteBatch};
///
/// # fn main() -> Result<(), sieve_core::store::StoreError> {
/// let mut store = SqliteKvStore::open(Utf8Path::new("out/index.sqlite"))?;
/// let mut batch = WriteBatch::new();
/// batch.put(b"W100".to_vec(), vec![1, 2, 3]);
/// store.write(&batch)?;
/// store.close()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SqliteKvStore {
    connection: Connection,
    path: Utf8PathBuf,
}

impl SqliteKvStore {
    /// Open (or create) the store at `path`.
    pub fn open(path: &Utf8Path) -> Result<Self, StoreError> {
        sieve_fs::ensure_parent_dir(path).map_err(|source| StoreError::CreateDirectory {
            path: path.to_path_buf(),
            source,
        })?;
        let connection =
            Connection::open(path.as_std_path()).map_err(|source| StoreError::Open {
                path: path.to_path_buf(),
                source: Box::new(source),
            })?;
        // The store is rebuilt from scratch after any failure, so durability
        // of individual batches is not required.
        connection
            .pragma_update(None, "synchronous", "OFF")
            .and_then(|()| connection.execute(CREATE_SCHEMA, []).map(|_| ()))
            .map_err(|source| StoreError::Schema {
                path: path.to_path_buf(),
                source: Box::new(source),
            })?;
        debug!("Opened SQLite store at {path}");
        Ok(Self {
            connection,
            path: path.to_path_buf(),
        })
    }

    /// Location of the underlying database file.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Fetch the value stored under `key`.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        self.connection
            .query_row("SELECT value FROM entries WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()
            .map_err(|source| StoreError::Read {
                source: Box::new(source),
            })
    }

    /// Every stored entry, ordered by key.
    pub fn entries(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        let read_error = |source: rusqlite::Error| StoreError::Read {
            source: Box::new(source),
        };
        let mut statement = self
            .connection
            .prepare("SELECT key, value FROM entries ORDER BY key")
            .map_err(read_error)?;
        let rows = statement
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .map_err(read_error)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(read_error)
    }
}

impl KvStore for SqliteKvStore {
    fn write(&mut self, batch: &WriteBatch) -> Result<(), StoreError> {
        let entries = batch.len();
        let write_error = |source: rusqlite::Error| StoreError::Write {
            entries,
            source: Box::new(source),
        };
        let transaction = self.connection.transaction().map_err(write_error)?;
        {
            let mut statement = transaction.prepare_cached(UPSERT).map_err(write_error)?;
            for (key, value) in batch.iter() {
                statement.execute((key, value)).map_err(write_error)?;
            }
        }
        transaction.commit().map_err(write_error)
    }

    fn close(self) -> Result<(), StoreError> {
        let path = self.path;
        self.connection
            .close()
            .map_err(|(_, source)| StoreError::Close {
                source: Box::new(source),
            })?;
        debug!("Closed SQLite store at {path}");
        Ok(())
    }
}
