//! Facade crate for the geotable OpenStreetMap conversion engine.
//!
//! This crate re-exports the core domain types and exposes the file decoders,
//! classification loader and table writer behind feature flags.

#![forbid(unsafe_code)]

pub use geotable_core::{
    AttributeColumn, AttributeColumns, CategoryPath, Classifier, ConversionOptions, Element,
    ElementId, ElementKind, ElementSource, IncompleteRelationQueue, IndexError, IndexSet,
    IndexStrategy, JobError, JobStats, MemorySource, Record, RecordBuilder, RecordSink,
    ReferenceIndex, Rejection, ScanCoordinator, SinkError, SourceError, Unclassified, WGS84_SRID,
};

#[cfg(feature = "store-sqlite")]
pub use geotable_core::SqliteIndex;

#[cfg(feature = "decoders")]
pub use geotable_data::{
    ClassificationScheme, CsvRecordSink, InputFormat, PbfSource, RunReport, XmlSource,
    load_attribute_columns, open_source, report_path,
};
