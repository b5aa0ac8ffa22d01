//! In-memory collaborators for exercising the extraction passes without
//! binary fixtures.

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::codec::{CodecError, ElementCodec, RecordCodec};
use crate::element::Record;
use crate::source::{ElementSink, ElementSource, SourceError};
use crate::store::{KvStore, StoreError, WriteBatch};
use crate::Element;

const MEMORY_LOCATION: &str = "<memory>";

/// Replays a fixed element sequence on every [`ElementSource::parse`] call.
#[derive(Debug, Default)]
pub struct MemorySource {
    elements: Vec<Element>,
    fail_after: Option<usize>,
    parses: AtomicUsize,
    delivered: AtomicUsize,
}

impl MemorySource {
    /// Create a source replaying `elements` in order.
    #[must_use]
    pub fn new<I>(elements: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Element>,
    {
        Self {
            elements: elements.into_iter().map(Into::into).collect(),
            fail_after: None,
            parses: AtomicUsize::new(0),
            delivered: AtomicUsize::new(0),
        }
    }

    /// Abort every traversal with a decode error after `count` elements.
    #[must_use]
    pub fn failing_after(mut self, count: usize) -> Self {
        self.fail_after = Some(count);
        self
    }

    /// Number of traversals started so far.
    #[must_use]
    pub fn parse_count(&self) -> usize {
        self.parses.load(Ordering::SeqCst)
    }

    /// Elements handed to sinks across every traversal.
    #[must_use]
    pub fn delivered_count(&self) -> usize {
        self.delivered.load(Ordering::SeqCst)
    }
}

impl ElementSource for MemorySource {
    fn parse(&self, sink: &mut dyn ElementSink) -> Result<(), SourceError> {
        self.parses.fetch_add(1, Ordering::SeqCst);
        for (index, element) in self.elements.iter().enumerate() {
            if self.fail_after == Some(index) {
                return Err(SourceError::Decode {
                    path: PathBuf::from(MEMORY_LOCATION),
                    source: Box::new(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("injected decode failure at element {index}"),
                    )),
                });
            }
            self.delivered.fetch_add(1, Ordering::SeqCst);
            if sink.on_element(element.clone()).is_break() {
                break;
            }
        }
        Ok(())
    }

    fn location(&self) -> String {
        MEMORY_LOCATION.to_owned()
    }
}

/// A store that keeps entries in memory and records every batch it sees.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MemoryStore {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
    batch_sizes: Vec<usize>,
    fail_on_batch: Option<usize>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the batch with the given zero-based index.
    #[must_use]
    pub fn failing_on_batch(mut self, index: usize) -> Self {
        self.fail_on_batch = Some(index);
        self
    }

    /// Persisted entries, ordered by key.
    #[must_use]
    pub const fn entries(&self) -> &BTreeMap<Vec<u8>, Vec<u8>> {
        &self.entries
    }

    /// Value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    /// Persisted keys as UTF-8 strings.
    #[must_use]
    pub fn keys(&self) -> BTreeSet<String> {
        self.entries
            .keys()
            .map(|key| String::from_utf8_lossy(key).into_owned())
            .collect()
    }

    /// Byte size of every batch written, in order.
    #[must_use]
    pub fn batch_sizes(&self) -> &[usize] {
        &self.batch_sizes
    }
}

impl KvStore for MemoryStore {
    fn write(&mut self, batch: &WriteBatch) -> Result<(), StoreError> {
        if self.fail_on_batch == Some(self.batch_sizes.len()) {
            return Err(StoreError::Write {
                entries: batch.len(),
                source: Box::new(io::Error::other("injected write failure")),
            });
        }
        for (key, value) in batch.iter() {
            self.entries.insert(key.to_vec(), value.to_vec());
        }
        self.batch_sizes.push(batch.size_bytes());
        Ok(())
    }
}

impl KvStore for &mut MemoryStore {
    fn write(&mut self, batch: &WriteBatch) -> Result<(), StoreError> {
        (**self).write(batch)
    }
}

/// Delegates to [`ElementCodec`] but fails for chosen element identifiers.
#[derive(Debug, Default, Clone)]
pub struct RejectingCodec {
    rejected: BTreeSet<i64>,
}

impl RejectingCodec {
    /// Fail to encode any record whose element has one of `ids`.
    #[must_use]
    pub fn rejecting<I: IntoIterator<Item = i64>>(ids: I) -> Self {
        Self {
            rejected: ids.into_iter().collect(),
        }
    }
}

impl RecordCodec for RejectingCodec {
    fn encode(&self, record: &Record) -> Result<Vec<u8>, CodecError> {
        let id = record.element.id();
        if self.rejected.contains(&id) {
            return Err(CodecError::Encode {
                id,
                source: Box::new(bincode::ErrorKind::Custom(format!(
                    "injected encode failure for {id}"
                ))),
            });
        }
        ElementCodec.encode(record)
    }
}
