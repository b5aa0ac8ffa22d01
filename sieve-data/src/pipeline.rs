//! Sequential three-pass runner.
//!
//! Runs discovery, expansion and extraction strictly in order, each as one
//! full scan of the source, and tracks every pass through
//! [`PassState`]. The store is opened only once the masks are frozen and is
//! released on every exit path: closed explicitly on success, dropped on
//! failure.

use std::fmt;

use log::{error, info};
use sieve_core::store::{KvStore, StoreError};
use sieve_core::{
    CompositeSelector, ElementCodec, ElementSource, MaskCounts, RecordCodec, SourceError,
};
use thiserror::Error;

use crate::expand::{ExpansionStats, expand_membership};
use crate::extract::{ExtractError, ExtractionOptions, ExtractionStats, extract_selected};
use crate::index::{DiscoveryStats, discover_membership};

/// One full scan of the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pass {
    /// Pass 1: membership discovery.
    Discovery,
    /// Pass 2: membership expansion.
    Expansion,
    /// Pass 3: streaming extraction.
    Extraction,
}

impl Pass {
    /// Every pass, in execution order.
    pub const ALL: [Self; 3] = [Self::Discovery, Self::Expansion, Self::Extraction];
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Discovery => "discovery",
            Self::Expansion => "expansion",
            Self::Extraction => "extraction",
        })
    }
}

/// Lifecycle of a single pass.
///
/// `NotStarted -> Scanning -> Completed | Failed`; `Failed` is terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PassState {
    /// The pass has not begun.
    #[default]
    NotStarted,
    /// The pass is scanning the source.
    Scanning,
    /// The pass finished successfully.
    Completed,
    /// The pass aborted the run.
    Failed,
}

/// State of every pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStates {
    discovery: PassState,
    expansion: PassState,
    extraction: PassState,
}

impl PassStates {
    /// State of `pass`.
    #[must_use]
    pub const fn get(&self, pass: Pass) -> PassState {
        match pass {
            Pass::Discovery => self.discovery,
            Pass::Expansion => self.expansion,
            Pass::Extraction => self.extraction,
        }
    }

    const fn slot(&mut self, pass: Pass) -> &mut PassState {
        match pass {
            Pass::Discovery => &mut self.discovery,
            Pass::Expansion => &mut self.expansion,
            Pass::Extraction => &mut self.extraction,
        }
    }

    fn begin(&mut self, pass: Pass) {
        info!("Starting {pass} pass");
        *self.slot(pass) = PassState::Scanning;
    }

    fn complete(&mut self, pass: Pass) {
        info!("Completed {pass} pass");
        *self.slot(pass) = PassState::Completed;
    }

    fn fail(&mut self, pass: Pass) {
        error!("The {pass} pass failed");
        *self.slot(pass) = PassState::Failed;
    }
}

/// Summary of a successful run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionReport {
    /// Membership set sizes once expansion completed.
    pub masks: MaskCounts,
    /// Pass 1 counters.
    pub discovery: DiscoveryStats,
    /// Pass 2 counters.
    pub expansion: ExpansionStats,
    /// Pass 3 counters.
    pub extraction: ExtractionStats,
    /// Final state of every pass.
    pub passes: PassStates,
}

/// Fatal failures of a run.
///
/// Store contents written before the failure are not rolled back and must
/// be treated as invalid.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The source failed to open or decode.
    #[error("{pass} pass failed to read the source")]
    Source {
        /// Pass that was scanning.
        pass: Pass,
        /// Underlying source error.
        #[source]
        source: SourceError,
    },
    /// The store could not be opened.
    #[error("failed to open the output store")]
    OpenStore(#[source] StoreError),
    /// The store rejected extraction output.
    #[error("failed to write extraction output")]
    Store(#[source] StoreError),
    /// The store could not be closed after a successful extraction.
    #[error("failed to close the output store")]
    CloseStore(#[source] StoreError),
    /// The extraction consumer panicked.
    #[error("extraction consumer panicked")]
    ConsumerPanicked,
}

impl PipelineError {
    /// Pass that was running when the run failed.
    #[must_use]
    pub const fn pass(&self) -> Pass {
        match self {
            Self::Source { pass, .. } => *pass,
            Self::OpenStore(_) | Self::Store(_) | Self::CloseStore(_) | Self::ConsumerPanicked => {
                Pass::Extraction
            }
        }
    }
}

impl From<ExtractError> for PipelineError {
    fn from(value: ExtractError) -> Self {
        match value {
            ExtractError::Source(source) => Self::Source {
                pass: Pass::Extraction,
                source,
            },
            ExtractError::Store(source) => Self::Store(source),
            ExtractError::ConsumerPanicked => Self::ConsumerPanicked,
        }
    }
}

/// Builds a selective index from a source in three scans.
///
/// # Examples
/// ```
/// use sieve_core::test_support::{MemorySource, MemoryStore};
/// use sieve_core::{Composite, Element, ElementKind, Member, Point, Polyline, Role};
/// use sieve_data::SelectiveIndexer;
///
/// let source = MemorySource::new(vec![
///     Element::from(Point::new(1, 10.0, 0.0)),
///     Polyline::new(100, vec![1]).into(),
///     Composite::new(900, vec![Member::new(ElementKind::Polyline, 100, Role::Outer)]).into(),
/// ]);
/// let selector = |composite: &Composite| composite.id == 900;
/// let mut store = MemoryStore::new();
/// let output = &mut store;
/// let report = SelectiveIndexer::new(&source, &selector).run(move || Ok(output))?;
/// assert_eq!(report.extraction.persisted.total(), 3);
/// assert_eq!(source.parse_count(), 3);
/// # Ok::<(), sieve_data::PipelineError>(())
/// ```
#[derive(Debug)]
pub struct SelectiveIndexer<'a, Src: ?Sized, Sel: ?Sized, C = ElementCodec> {
    source: &'a Src,
    selector: &'a Sel,
    codec: C,
    options: ExtractionOptions,
}

impl<'a, Src, Sel> SelectiveIndexer<'a, Src, Sel>
where
    Src: ElementSource + ?Sized,
    Sel: CompositeSelector + ?Sized,
{
    /// Index `source`, keeping the composites `selector` accepts.
    #[must_use]
    pub fn new(source: &'a Src, selector: &'a Sel) -> Self {
        Self {
            source,
            selector,
            codec: ElementCodec,
            options: ExtractionOptions::default(),
        }
    }
}

impl<'a, Src, Sel, C> SelectiveIndexer<'a, Src, Sel, C>
where
    Src: ElementSource + ?Sized,
    Sel: CompositeSelector + ?Sized,
    C: RecordCodec + Sync,
{
    /// Replace the extraction options.
    #[must_use]
    pub const fn with_options(mut self, options: ExtractionOptions) -> Self {
        self.options = options;
        self
    }

    /// Encode polylines and composites with `codec`.
    #[must_use]
    pub fn with_codec<D: RecordCodec + Sync>(self, codec: D) -> SelectiveIndexer<'a, Src, Sel, D> {
        SelectiveIndexer {
            source: self.source,
            selector: self.selector,
            codec,
            options: self.options,
        }
    }

    /// Run all three passes, opening the store with `open_store` once the
    /// membership masks are complete.
    ///
    /// # Errors
    /// Returns [`PipelineError`] naming the failing pass when the source,
    /// the store or the extraction consumer fails. Nothing is retried.
    pub fn run<S, F>(&self, open_store: F) -> Result<ExtractionReport, PipelineError>
    where
        S: KvStore + Send,
        F: FnOnce() -> Result<S, StoreError>,
    {
        let mut passes = PassStates::default();
        info!("Indexing {}", self.source.location());

        passes.begin(Pass::Discovery);
        let mut discovery = discover_membership(self.source, self.selector)
            .map_err(|source| Self::source_failure(&mut passes, Pass::Discovery, source))?;
        passes.complete(Pass::Discovery);

        passes.begin(Pass::Expansion);
        let expansion = expand_membership(self.source, &mut discovery)
            .map_err(|source| Self::source_failure(&mut passes, Pass::Expansion, source))?;
        passes.complete(Pass::Expansion);

        let masks = discovery.masks.freeze();
        let counts = masks.counts();
        info!("Membership frozen: {counts}");

        passes.begin(Pass::Extraction);
        let mut store = open_store().map_err(|source| {
            passes.fail(Pass::Extraction);
            PipelineError::OpenStore(source)
        })?;
        let extraction =
            extract_selected(self.source, &masks, &mut store, &self.codec, &self.options)
                .map_err(|err| {
                    passes.fail(Pass::Extraction);
                    PipelineError::from(err)
                })?;
        store.close().map_err(|source| {
            passes.fail(Pass::Extraction);
            PipelineError::CloseStore(source)
        })?;
        passes.complete(Pass::Extraction);

        Ok(ExtractionReport {
            masks: counts,
            discovery: discovery.stats,
            expansion,
            extraction,
            passes,
        })
    }

    fn source_failure(passes: &mut PassStates, pass: Pass, source: SourceError) -> PipelineError {
        passes.fail(pass);
        PipelineError::Source { pass, source }
    }
}
