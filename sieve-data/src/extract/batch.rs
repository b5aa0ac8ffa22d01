//! Size-bounded batching in front of a [`KvStore`].

use log::debug;
use sieve_core::store::{KvStore, StoreError, WriteBatch};

/// Totals reported once a [`BatchWriter`] finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchTotals {
    /// Batches handed to the store.
    pub batches: u64,
    /// Key and value bytes handed to the store.
    pub bytes: u64,
}

/// Accumulates puts and flushes them once their size exceeds a threshold.
///
/// A flushed batch is never larger than the threshold plus the last put.
#[derive(Debug)]
pub struct BatchWriter<'s, S: ?Sized> {
    store: &'s mut S,
    batch: WriteBatch,
    threshold: usize,
    totals: BatchTotals,
}

impl<'s, S> BatchWriter<'s, S>
where
    S: KvStore + ?Sized,
{
    /// Buffer writes to `store`, flushing above `threshold` bytes.
    #[must_use]
    pub fn new(store: &'s mut S, threshold: usize) -> Self {
        Self {
            store,
            batch: WriteBatch::new(),
            threshold,
            totals: BatchTotals::default(),
        }
    }

    /// Queue a put, flushing when the batch grows past the threshold.
    ///
    /// # Errors
    /// Returns the store's error when a flush is rejected.
    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<(), StoreError> {
        self.batch.put(key, value);
        if self.batch.size_bytes() > self.threshold {
            self.flush()?;
        }
        Ok(())
    }

    /// Bytes queued but not yet written.
    #[must_use]
    pub const fn pending_bytes(&self) -> usize {
        self.batch.size_bytes()
    }

    /// Write whatever is queued.
    ///
    /// # Errors
    /// Returns the store's error when the batch is rejected.
    pub fn flush(&mut self) -> Result<(), StoreError> {
        if self.batch.is_empty() {
            return Ok(());
        }
        self.store.write(&self.batch)?;
        let size = self.batch.size_bytes() as u64;
        self.totals.batches += 1;
        self.totals.bytes += size;
        debug!(
            "Flushed batch {} ({} entries, {size} bytes)",
            self.totals.batches,
            self.batch.len()
        );
        self.batch.clear();
        Ok(())
    }

    /// Flush the remainder and report totals.
    ///
    /// # Errors
    /// Returns the store's error when the final batch is rejected.
    pub fn finish(mut self) -> Result<BatchTotals, StoreError> {
        self.flush()?;
        Ok(self.totals)
    }

    /// Drop queued puts without writing them, reporting what was written.
    #[must_use]
    pub fn abandon(self) -> BatchTotals {
        if !self.batch.is_empty() {
            debug!(
                "Discarding {} unflushed entries ({} bytes)",
                self.batch.len(),
                self.batch.size_bytes()
            );
        }
        self.totals
    }
}
