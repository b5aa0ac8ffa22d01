//! The decoder boundary: a forward-only source that pushes decoded elements
//! into a sink.
//!
//! Every pass implements [`ElementSink`] and calls [`ElementSource::parse`]
//! once. A source must deliver elements in file order and must not be read
//! by more than one pass at a time.

use std::error::Error as StdError;
use std::ops::ControlFlow;
use std::path::PathBuf;

use thiserror::Error;

use crate::element::{Composite, Element, Point, Polyline};

/// Boxed error raised by a concrete decoder.
pub type DecoderError = Box<dyn StdError + Send + Sync + 'static>;

/// Receives decoded elements in source order.
///
/// Every callback returns [`ControlFlow::Break`] once the sink wants no more
/// elements. Sources stop delivering at the next opportunity and return
/// `Ok(())`.
pub trait ElementSink {
    /// Called once per decoded point.
    fn on_point(&mut self, point: Point) -> ControlFlow<()>;

    /// Called once per decoded polyline.
    fn on_polyline(&mut self, polyline: Polyline) -> ControlFlow<()>;

    /// Called once per decoded composite.
    fn on_composite(&mut self, composite: Composite) -> ControlFlow<()>;

    /// Route an [`Element`] to the matching callback.
    fn on_element(&mut self, element: Element) -> ControlFlow<()> {
        match element {
            Element::Point(point) => self.on_point(point),
            Element::Polyline(polyline) => self.on_polyline(polyline),
            Element::Composite(composite) => self.on_composite(composite),
        }
    }
}

/// A dataset that can be traversed from start to end, once per call.
pub trait ElementSource {
    /// Traverse the whole dataset, invoking `sink` for every element.
    ///
    /// Format and I/O failures abort the traversal and are returned to the
    /// caller. Elements delivered before the failure are not retracted. A
    /// sink that breaks ends the traversal early without an error.
    fn parse(&self, sink: &mut dyn ElementSink) -> Result<(), SourceError>;

    /// Human-readable location of the dataset, used in logs.
    fn location(&self) -> String;
}

/// Errors surfaced by an [`ElementSource`].
#[derive(Debug, Error)]
pub enum SourceError {
    /// The dataset could not be opened.
    #[error("failed to open source at {path:?}")]
    Open {
        /// Location of the dataset.
        path: PathBuf,
        /// Underlying decoder error.
        #[source]
        source: DecoderError,
    },
    /// The dataset could not be decoded.
    #[error("failed to decode source at {path:?}")]
    Decode {
        /// Location of the dataset.
        path: PathBuf,
        /// Underlying decoder error.
        #[source]
        source: DecoderError,
    },
}
