//! File formats for the geotable converter.
//!
//! Responsibilities:
//! - Decode OpenStreetMap XML (plain or bzip2) and PBF files into
//!   re-traversable element sources.
//! - Load classification schemes and attribute column maps.
//! - Write records as pipe-delimited tables and runs as metadata reports.
//!
//! Boundaries:
//! - Do not encode conversion rules (live in `geotable-core`).
//!
//! Invariants:
//! - Malformed elements are logged and skipped; only structural failures
//!   surface as errors.
//! - No global mutable state.

pub mod attributes;
pub mod classification;
pub mod csv;
pub mod report;
pub mod source;

pub use attributes::{AttributeMapError, load_attribute_columns};
pub use classification::{ClassificationError, ClassificationScheme, TagFilter};
pub use csv::{CsvRecordSink, OTHER_TAGS_COLUMN, sanitize_field};
pub use report::{ReportError, RunReport, report_path};
pub use source::{InputFormat, PbfSource, XmlSource, open_source};
