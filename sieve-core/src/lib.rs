//! Core types for selective extraction of OSM-style datasets.
//!
//! Responsibilities:
//! - Model decoded points, polylines and composites.
//! - Track which identifiers must survive extraction ([`MembershipMasks`]).
//! - Define the decoder boundary ([`ElementSource`], [`ElementSink`]) and the
//!   output boundary ([`store::KvStore`]).
//! - Encode persisted values ([`ElementCodec`], [`PointLayout`]).
//!
//! Boundaries:
//! - No file-format decoding here (lives in `sieve-data`).
//! - No pass orchestration here (lives in `sieve-data`).
//!
//! Invariants:
//! - Membership sets only grow, and are read-only once frozen.
//! - No global mutable state.
#![forbid(unsafe_code)]

pub mod codec;
pub mod element;
pub mod masks;
pub mod select;
pub mod source;
pub mod store;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use codec::{CodecError, ElementCodec, ParsePointLayoutError, PointLayout, RecordCodec};
pub use element::{Composite, Element, ElementKind, Member, Point, Polyline, Record, Role, Tags};
pub use masks::{FrozenMasks, IdMask, MaskCounts, MaskSet, MembershipMasks};
pub use select::{CompositeSelector, SelectorError, TagSelector};
pub use source::{DecoderError, ElementSink, ElementSource, SourceError};
