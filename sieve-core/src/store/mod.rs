//! Persistent key-value output of the extraction pass.
//!
//! Keys follow a fixed layout:
//!
//! | Element   | Key                  | Value                                  |
//! |-----------|----------------------|----------------------------------------|
//! | point     | decimal ID           | point bits (see [`crate::PointLayout`]) |
//! | polyline  | `W` + decimal ID     | encoded [`crate::Record`]              |
//! | composite | `R` + decimal ID     | encoded [`crate::Record`]              |
//!
//! Writes go through [`WriteBatch`] so the caller controls how many bytes are
//! buffered before the store sees them.

use std::error::Error as StdError;
use std::io;

use camino::Utf8PathBuf;
use thiserror::Error;

use crate::element::ElementKind;

#[cfg(feature = "store-sqlite")]
mod sqlite;

#[cfg(feature = "store-sqlite")]
pub use sqlite::SqliteKvStore;

/// Boxed error raised by a store backend.
pub type BackendError = Box<dyn StdError + Send + Sync + 'static>;

/// Build the persisted key for an element.
///
/// # Examples
/// ```
/// use sieve_core::{ElementKind, store::record_key};
///
/// assert_eq!(record_key(ElementKind::Point, 1), b"1");
/// assert_eq!(record_key(ElementKind::Polyline, 100), b"W100");
/// assert_eq!(record_key(ElementKind::Composite, -900), b"R-900");
/// ```
#[must_use]
pub fn record_key(kind: ElementKind, id: i64) -> Vec<u8> {
    format!("{}{id}", kind.key_prefix()).into_bytes()
}

/// Pending puts flushed to a store as one unit.
///
/// Tracks the accumulated byte size (keys plus values) so callers can bound
/// memory use.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    entries: Vec<(Vec<u8>, Vec<u8>)>,
    size_bytes: usize,
}

impl WriteBatch {
    /// Create an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a put of `value` under `key`.
    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.size_bytes = self
            .size_bytes
            .saturating_add(key.len())
            .saturating_add(value.len());
        self.entries.push((key, value));
    }

    /// Accumulated size of every queued key and value.
    #[must_use]
    pub const fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    /// Number of queued puts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Report whether nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over queued puts in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &[u8])> + '_ {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_slice(), value.as_slice()))
    }

    /// Drop every queued put, keeping the allocation.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.size_bytes = 0;
    }
}

/// A persistent key-value store receiving extraction output.
///
/// Dropping a store releases it; [`KvStore::close`] releases it and reports
/// any failure to do so.
pub trait KvStore {
    /// Apply every put in `batch`. Later puts win over earlier ones for the
    /// same key.
    fn write(&mut self, batch: &WriteBatch) -> Result<(), StoreError>;

    /// Release the store.
    fn close(self) -> Result<(), StoreError>
    where
        Self: Sized,
    {
        Ok(())
    }
}

/// Errors raised by store backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Creating the store's parent directory failed.
    #[error("failed to create parent directory for store at {path:?}")]
    CreateDirectory {
        /// Store location.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// Opening the store failed.
    #[error("failed to open store at {path:?}")]
    Open {
        /// Store location.
        path: Utf8PathBuf,
        /// Underlying backend error.
        #[source]
        source: BackendError,
    },
    /// Preparing the store schema failed.
    #[error("failed to prepare store schema at {path:?}")]
    Schema {
        /// Store location.
        path: Utf8PathBuf,
        /// Underlying backend error.
        #[source]
        source: BackendError,
    },
    /// Writing a batch failed.
    #[error("failed to write batch of {entries} entries")]
    Write {
        /// Number of puts in the rejected batch.
        entries: usize,
        /// Underlying backend error.
        #[source]
        source: BackendError,
    },
    /// Reading back from the store failed.
    #[error("failed to read from store")]
    Read {
        /// Underlying backend error.
        #[source]
        source: BackendError,
    },
    /// Closing the store failed.
    #[error("failed to close store")]
    Close {
        /// Underlying backend error.
        #[source]
        source: BackendError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ElementKind::Point, 1, "1")]
    #[case(ElementKind::Point, -7, "-7")]
    #[case(ElementKind::Polyline, 100, "W100")]
    #[case(ElementKind::Composite, 900, "R900")]
    #[case(ElementKind::Composite, i64::MAX, "R9223372036854775807")]
    fn keys_follow_layout(#[case] kind: ElementKind, #[case] id: i64, #[case] expected: &str) {
        assert_eq!(record_key(kind, id), expected.as_bytes());
    }

    #[rstest]
    fn batch_tracks_key_and_value_bytes() {
        let mut batch = WriteBatch::new();
        batch.put(b"W100".to_vec(), vec![0; 10]);
        batch.put(b"1".to_vec(), vec![0; 8]);
        assert_eq!(batch.size_bytes(), 4 + 10 + 1 + 8);
        assert_eq!(batch.len(), 2);
        let keys: Vec<&[u8]> = batch.iter().map(|(key, _)| key).collect();
        assert_eq!(keys, vec![b"W100".as_slice(), b"1".as_slice()]);

        batch.clear();
        assert!(batch.is_empty());
        assert_eq!(batch.size_bytes(), 0);
    }
}
