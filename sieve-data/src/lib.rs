//! Selective extraction passes over OSM-style datasets.
//!
//! Responsibilities:
//! - Adapt `.osm.pbf` files to the decoder boundary ([`PbfSource`]).
//! - Pass 1: discover selected composites and point references
//!   ([`discover_membership`]).
//! - Pass 2: expand nested composites into concrete membership
//!   ([`expand_membership`]).
//! - Pass 3: stream the source again and persist retained elements through
//!   size-bounded batches ([`extract_selected`]).
//! - Run the three passes in order ([`SelectiveIndexer`]).
//!
//! Boundaries:
//! - Element types, membership sets, codecs and stores come from
//!   `sieve-core`.
//!
//! Invariants:
//! - Passes never overlap; masks are frozen before extraction starts.
//! - Extraction is a pure filter: it never persists an element absent from
//!   the source.
#![forbid(unsafe_code)]

mod expand;
mod extract;
mod index;
mod pbf;
mod pipeline;

pub use expand::{ExpansionStats, MembershipExpander, expand_membership, resolve_nested};
pub use extract::{
    BatchTotals, BatchWriter, DEFAULT_FLUSH_THRESHOLD_BYTES, ExtractError, ExtractionOptions,
    ExtractionStats, KindCounts, extract_selected,
};
pub use index::{
    Discovery, DiscoveryStats, ExpansionPlan, MembershipIndexBuilder, discover_membership,
};
pub use pbf::PbfSource;
pub use pipeline::{
    ExtractionReport, Pass, PassState, PassStates, PipelineError, SelectiveIndexer,
};
