//! Pass 3: stream the source again and persist every retained element.
//!
//! The decoder runs on the calling thread and hands each element to a
//! consumer thread over a zero-capacity channel, so the decoder blocks until
//! the consumer has taken the previous element. The consumer filters
//! against [`FrozenMasks`], encodes matches and feeds a [`BatchWriter`].
//!
//! When the consumer stops on a store error the sink breaks, so the decoder
//! ends the scan instead of reading the rest of the file.
//!
//! The producer closes the stream with an explicit end marker. Only then is
//! the last partial batch written: when decoding fails the consumer sees the
//! channel close without the marker and drops what it has not flushed.

mod batch;

use std::ops::ControlFlow;
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::thread;

use log::{debug, error, info, warn};
use sieve_core::store::{KvStore, StoreError, record_key};
use sieve_core::{
    Composite, Element, ElementKind, ElementSink, ElementSource, FrozenMasks, Point, PointLayout,
    Polyline, Record, RecordCodec, SourceError,
};
use thiserror::Error;

pub use batch::{BatchTotals, BatchWriter};

/// Flush threshold used when none is configured: 64 MiB.
pub const DEFAULT_FLUSH_THRESHOLD_BYTES: usize = 64 * 1024 * 1024;

/// Tunables for one extraction run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionOptions {
    /// Flush a batch once its keys and values exceed this many bytes.
    pub flush_threshold_bytes: usize,
    /// Value layout for persisted points.
    pub point_layout: PointLayout,
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        Self {
            flush_threshold_bytes: DEFAULT_FLUSH_THRESHOLD_BYTES,
            point_layout: PointLayout::default(),
        }
    }
}

impl ExtractionOptions {
    /// Replace the flush threshold.
    #[must_use]
    pub const fn with_flush_threshold(mut self, bytes: usize) -> Self {
        self.flush_threshold_bytes = bytes;
        self
    }

    /// Replace the point value layout.
    #[must_use]
    pub const fn with_point_layout(mut self, layout: PointLayout) -> Self {
        self.point_layout = layout;
        self
    }
}

/// A counter per element kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KindCounts {
    /// Points counted.
    pub points: u64,
    /// Polylines counted.
    pub polylines: u64,
    /// Composites counted.
    pub composites: u64,
}

impl KindCounts {
    /// Count for one kind.
    #[must_use]
    pub const fn get(&self, kind: ElementKind) -> u64 {
        match kind {
            ElementKind::Point => self.points,
            ElementKind::Polyline => self.polylines,
            ElementKind::Composite => self.composites,
        }
    }

    /// Sum over every kind.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.points + self.polylines + self.composites
    }

    const fn increment(&mut self, kind: ElementKind) {
        match kind {
            ElementKind::Point => self.points += 1,
            ElementKind::Polyline => self.polylines += 1,
            ElementKind::Composite => self.composites += 1,
        }
    }
}

/// Outcome of a completed extraction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionStats {
    /// Elements received from the source.
    pub scanned: KindCounts,
    /// Elements written to the store.
    pub persisted: KindCounts,
    /// Retained elements skipped because they failed to encode.
    pub failures: KindCounts,
    /// Batches written.
    pub batches: u64,
    /// Key and value bytes written.
    pub bytes_written: u64,
}

impl ExtractionStats {
    const fn with_totals(mut self, totals: BatchTotals) -> Self {
        self.batches = totals.batches;
        self.bytes_written = totals.bytes;
        self
    }
}

/// Fatal extraction failures.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The source failed while streaming.
    #[error("source failed during extraction")]
    Source(#[source] SourceError),
    /// The store rejected a batch.
    #[error("store rejected extraction output")]
    Store(#[source] StoreError),
    /// The consumer thread panicked.
    #[error("extraction consumer panicked")]
    ConsumerPanicked,
}

enum Handoff {
    Element(Element),
    End,
}

/// Producer side of the handoff, driven by the decoder.
struct HandoffSink {
    sender: SyncSender<Handoff>,
    open: bool,
}

impl HandoffSink {
    const fn new(sender: SyncSender<Handoff>) -> Self {
        Self { sender, open: true }
    }

    fn send(&mut self, message: Handoff) -> ControlFlow<()> {
        if !self.open {
            return ControlFlow::Break(());
        }
        if self.sender.send(message).is_err() {
            debug!("Extraction consumer stopped; ending the scan early");
            self.open = false;
            return ControlFlow::Break(());
        }
        ControlFlow::Continue(())
    }

    fn end(mut self) {
        if self.send(Handoff::End).is_break() {
            debug!("Extraction consumer stopped before the end marker");
        }
    }
}

impl ElementSink for HandoffSink {
    fn on_point(&mut self, point: Point) -> ControlFlow<()> {
        self.send(Handoff::Element(point.into()))
    }

    fn on_polyline(&mut self, polyline: Polyline) -> ControlFlow<()> {
        self.send(Handoff::Element(polyline.into()))
    }

    fn on_composite(&mut self, composite: Composite) -> ControlFlow<()> {
        self.send(Handoff::Element(composite.into()))
    }
}

/// Consumer side: filter, encode and batch.
struct Consumer<'a, S: ?Sized, C: ?Sized> {
    masks: &'a FrozenMasks,
    codec: &'a C,
    layout: PointLayout,
    writer: BatchWriter<'a, S>,
    stats: ExtractionStats,
}

impl<'a, S, C> Consumer<'a, S, C>
where
    S: KvStore + ?Sized,
    C: RecordCodec + ?Sized,
{
    fn new(
        masks: &'a FrozenMasks,
        codec: &'a C,
        options: &ExtractionOptions,
        store: &'a mut S,
    ) -> Self {
        Self {
            masks,
            codec,
            layout: options.point_layout,
            writer: BatchWriter::new(store, options.flush_threshold_bytes),
            stats: ExtractionStats::default(),
        }
    }

    fn retains(&self, kind: ElementKind, id: i64) -> bool {
        match kind {
            ElementKind::Point => self.masks.retains_point(id),
            ElementKind::Polyline => self.masks.retains_polyline(id),
            ElementKind::Composite => self.masks.retains_composite(id),
        }
    }

    fn accept(&mut self, element: Element) -> Result<(), StoreError> {
        let kind = element.kind();
        let id = element.id();
        self.stats.scanned.increment(kind);
        if !self.retains(kind, id) {
            return Ok(());
        }
        let value = match element {
            Element::Point(point) => self.layout.encode(&point),
            other => match self.codec.encode(&Record::new(other)) {
                Ok(bytes) => bytes,
                Err(err) => {
                    warn!("Skipping {kind} {id}: {err}");
                    self.stats.failures.increment(kind);
                    return Ok(());
                }
            },
        };
        self.writer.put(record_key(kind, id), value)?;
        self.stats.persisted.increment(kind);
        Ok(())
    }

    fn consume(mut self, receiver: Receiver<Handoff>) -> Result<ExtractionStats, StoreError> {
        for message in receiver {
            match message {
                Handoff::Element(element) => self.accept(element)?,
                Handoff::End => {
                    let totals = self.writer.finish()?;
                    return Ok(self.stats.with_totals(totals));
                }
            }
        }
        let totals = self.writer.abandon();
        Ok(self.stats.with_totals(totals))
    }
}

/// Run pass 3: stream `source` and persist what `masks` retains.
///
/// Points are written as `options.point_layout` bytes; polylines and
/// composites as `codec`-encoded [`Record`]s. Elements that fail to encode
/// are counted and skipped.
///
/// # Errors
/// Returns [`ExtractError::Source`] when decoding fails,
/// [`ExtractError::Store`] when the store rejects a batch, and
/// [`ExtractError::ConsumerPanicked`] when the consumer thread panics. Output
/// already written is left in the store.
pub fn extract_selected<Src, S, C>(
    source: &Src,
    masks: &FrozenMasks,
    store: &mut S,
    codec: &C,
    options: &ExtractionOptions,
) -> Result<ExtractionStats, ExtractError>
where
    Src: ElementSource + ?Sized,
    S: KvStore + Send + ?Sized,
    C: RecordCodec + Sync + ?Sized,
{
    let location = source.location();
    debug!(
        "Extracting from {location} with a {} byte flush threshold",
        options.flush_threshold_bytes
    );
    let (produced, consumed) = thread::scope(|scope| {
        let (sender, receiver) = mpsc::sync_channel(0);
        let consumer = Consumer::new(masks, codec, options, store);
        let handle = scope.spawn(move || consumer.consume(receiver));
        let mut sink = HandoffSink::new(sender);
        let produced = source.parse(&mut sink);
        if produced.is_ok() {
            sink.end();
        } else {
            drop(sink);
        }
        (produced, handle.join())
    });

    let stats = match (produced, consumed) {
        (_, Err(_)) => {
            error!("Extraction consumer panicked while reading {location}");
            return Err(ExtractError::ConsumerPanicked);
        }
        (_, Ok(Err(err))) => return Err(ExtractError::Store(err)),
        (Err(err), Ok(Ok(_))) => return Err(ExtractError::Source(err)),
        (Ok(()), Ok(Ok(stats))) => stats,
    };
    info!(
        "Extraction persisted {} points, {} polylines, {} composites from {location} in {} batches ({} bytes); {} encode failures",
        stats.persisted.points,
        stats.persisted.polylines,
        stats.persisted.composites,
        stats.batches,
        stats.bytes_written,
        stats.failures.total()
    );
    Ok(stats)
}
