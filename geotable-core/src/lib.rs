//! Core engine of the geotable converter.
//!
//! Turns a stream of OpenStreetMap elements into flat, named and categorized
//! records. References between elements are resolved with a selective
//! [`ReferenceIndex`] filled over several traversals of a re-traversable
//! [`ElementSource`], so inputs larger than memory can be converted with the
//! disk-backed index.
#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod builder;
pub mod classify;
pub mod coordinator;
pub mod element;
pub mod geometry;
pub mod index;
pub mod queue;
pub mod record;
pub mod sink;
pub mod source;

pub use builder::{RecordBuilder, Rejection};
pub use classify::{CategoryPath, Classifier, SUBCATEGORY_SEPARATOR, Unclassified};
pub use coordinator::{
    ConversionOptions, DEFAULT_PROGRESS_INTERVAL, JobError, JobStats, Phase, ScanCoordinator,
    keep_references,
};
pub use element::{Element, ElementId, ElementKind, Member, NAME_TAG, Node, Relation, Tags, Way};
#[cfg(feature = "store-sqlite")]
pub use index::SqliteIndex;
pub use index::{IndexError, IndexSet, IndexSizes, IndexStrategy, MemoryIndex, ReferenceIndex};
pub use queue::IncompleteRelationQueue;
pub use record::{AttributeColumn, AttributeColumns, Record, WGS84_SRID};
pub use sink::{RecordSink, SinkError};
pub use source::{BoxError, ElementSource, ElementStream, MemorySource, SourceError};
