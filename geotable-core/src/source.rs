//! Re-traversable element streams.

use std::path::PathBuf;

use thiserror::Error;

use crate::element::Element;

/// Boxed error produced by a decoder backend.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// One traversal of an element source, in file order.
pub type ElementStream<'a> = Box<dyn Iterator<Item = Result<Element, SourceError>> + 'a>;

/// A source of decoded elements that can be traversed from the start any
/// number of times.
///
/// Malformed individual elements are logged and skipped by implementations;
/// the stream only yields an error for structural failures that make the rest
/// of the traversal meaningless.
pub trait ElementSource {
    /// Start a new traversal from the first element.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Open`] when the underlying input cannot be
    /// (re)opened.
    fn elements(&mut self) -> Result<ElementStream<'_>, SourceError>;

    /// Human-readable description used in log messages.
    fn describe(&self) -> String;
}

/// Errors raised while traversing an element source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Opening the input failed.
    #[error("failed to open element source at {path:?}")]
    Open {
        /// Input path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: BoxError,
    },
    /// Decoding the input failed part way through a traversal.
    #[error("failed to decode element source at {path:?} (offset {offset})")]
    Decode {
        /// Input path.
        path: PathBuf,
        /// Byte offset or block number where decoding stopped.
        offset: u64,
        /// Underlying error.
        #[source]
        source: BoxError,
    },
}

/// Element source backed by a vector, yielding clones on every traversal.
///
/// # Examples
///
/// ```
/// use geotable_core::{Element, ElementSource, MemorySource, Node, Tags};
///
/// let node = Node { id: "1".into(), lon: 0.0, lat: 0.0, tags: Tags::new() };
/// let mut source = MemorySource::new(vec![Element::Node(node)]);
/// assert_eq!(source.elements().expect("stream").count(), 1);
/// assert_eq!(source.traversals(), 1);
/// ```
#[derive(Debug, Default, Clone)]
pub struct MemorySource {
    elements: Vec<Element>,
    traversals: u32,
}

impl MemorySource {
    /// Wrap `elements`, which are yielded in vector order.
    #[must_use]
    pub const fn new(elements: Vec<Element>) -> Self {
        Self {
            elements,
            traversals: 0,
        }
    }

    /// Number of traversals started so far.
    #[must_use]
    pub const fn traversals(&self) -> u32 {
        self.traversals
    }
}

impl FromIterator<Element> for MemorySource {
    fn from_iter<T: IntoIterator<Item = Element>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl ElementSource for MemorySource {
    fn elements(&mut self) -> Result<ElementStream<'_>, SourceError> {
        self.traversals += 1;
        Ok(Box::new(self.elements.iter().cloned().map(Ok)))
    }

    fn describe(&self) -> String {
        format!("in-memory source of {} elements", self.elements.len())
    }
}
