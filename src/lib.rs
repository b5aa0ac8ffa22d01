//! Facade crate for the sieve selective extractor.
//!
//! This crate re-exports the core domain types and exposes the PBF passes and
//! the SQLite store behind feature flags.

#![forbid(unsafe_code)]

pub use sieve_core::store::{KvStore, StoreError, WriteBatch, record_key};
pub use sieve_core::{
    CodecError, Composite, CompositeSelector, Element, ElementCodec, ElementKind, ElementSink,
    ElementSource, FrozenMasks, IdMask, MaskCounts, MaskSet, Member, MembershipMasks, Point,
    PointLayout, Polyline, Record, RecordCodec, Role, SelectorError, SourceError, TagSelector,
    Tags,
};

#[cfg(feature = "store-sqlite")]
pub use sieve_core::store::SqliteKvStore;

#[cfg(feature = "pbf")]
pub use sieve_data::{
    ExtractionOptions, ExtractionReport, ExtractionStats, Pass, PassState, PbfSource,
    PipelineError, SelectiveIndexer,
};

#[cfg(feature = "test-support")]
pub use sieve_core::test_support;
