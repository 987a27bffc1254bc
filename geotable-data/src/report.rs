//! Run metadata reports written next to each output table.

use std::io::{self, Write};
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use geo::Rect;
use geotable_core::{IndexStrategy, JobStats, WGS84_SRID};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Suffix appended to the table stem to name its report.
pub const REPORT_SUFFIX: &str = "_metadata.json";

/// Errors raised while writing a report.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Creating or writing the report file failed.
    #[error("failed to write run report {path}")]
    Io {
        /// Report path.
        path: Utf8PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// Serializing the report failed.
    #[error("failed to serialize run report {path}")]
    Serialize {
        /// Report path.
        path: Utf8PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
}

/// Path of the report for the table at `output`: the table stem followed by
/// [`REPORT_SUFFIX`], in the same directory.
///
/// ```
/// use camino::Utf8Path;
/// use geotable_data::report_path;
///
/// assert_eq!(report_path(Utf8Path::new("out/rome.csv")), "out/rome_metadata.json");
/// ```
#[must_use]
pub fn report_path(output: &Utf8Path) -> Utf8PathBuf {
    let stem = output.file_stem().unwrap_or_default();
    output.with_file_name(format!("{stem}{REPORT_SUFFIX}"))
}

/// Counters and timings of one conversion job.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExecutionMetadata {
    /// Converted input file.
    #[serde(rename = "Input file")]
    pub input_file: String,
    /// Wall-clock duration of the job.
    #[serde(rename = "Execution time (ms)")]
    pub execution_time_ms: u64,
    /// Named elements encountered.
    #[serde(rename = "Input entities count")]
    pub entities: u64,
    /// Records written.
    #[serde(rename = "Input entities transformed")]
    pub transformed: u64,
    /// Named elements without a record.
    #[serde(rename = "Input entities excluded")]
    pub excluded: u64,
    /// Nodes decoded.
    #[serde(rename = "Nodes")]
    pub nodes: u64,
    /// Ways decoded.
    #[serde(rename = "Ways")]
    pub ways: u64,
    /// Relations decoded.
    #[serde(rename = "Relations")]
    pub relations: u64,
    /// Relations deferred to the retry.
    #[serde(rename = "Incomplete relations")]
    pub incomplete_relations: u64,
    /// Deferred relations recovered by the retry.
    #[serde(rename = "Recovered relations")]
    pub recovered_relations: u64,
    /// Deferred relations dropped.
    #[serde(rename = "Dropped relations")]
    pub dropped_relations: u64,
    /// Traversals of the input.
    #[serde(rename = "Traversals")]
    pub traversals: u32,
    /// Reference index strategy used.
    #[serde(rename = "Index strategy")]
    pub index_strategy: IndexStrategy,
    /// Output coordinate reference system.
    #[serde(rename = "Output CRS")]
    pub output_crs: String,
    /// Written table.
    #[serde(rename = "Output file")]
    pub output_file: String,
}

/// Minimum bounding rectangle of the output geometries.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Western edge.
    #[serde(rename = "X_min")]
    pub x_min: f64,
    /// Southern edge.
    #[serde(rename = "Y_min")]
    pub y_min: f64,
    /// Eastern edge.
    #[serde(rename = "X_max")]
    pub x_max: f64,
    /// Northern edge.
    #[serde(rename = "Y_max")]
    pub y_max: f64,
}

impl From<Rect<f64>> for BoundingBox {
    fn from(rect: Rect<f64>) -> Self {
        Self {
            x_min: rect.min().x,
            y_min: rect.min().y,
            x_max: rect.max().x,
            y_max: rect.max().y,
        }
    }
}

/// Report of one conversion job.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Job counters.
    #[serde(rename = "Execution Metadata")]
    pub execution: ExecutionMetadata,
    /// Extent of the output, absent when no record was written.
    #[serde(
        rename = "MBR of transformed geometries (WGS84)",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub bounds: Option<BoundingBox>,
}

impl RunReport {
    /// Summarise a finished job.
    #[must_use]
    pub fn new(
        input: &Utf8Path,
        output: &Utf8Path,
        strategy: IndexStrategy,
        stats: &JobStats,
        elapsed: Duration,
    ) -> Self {
        Self {
            execution: ExecutionMetadata {
                input_file: input.to_string(),
                execution_time_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                entities: stats.named_entities,
                transformed: stats.records,
                excluded: stats.rejected,
                nodes: stats.nodes,
                ways: stats.ways,
                relations: stats.relations,
                incomplete_relations: stats.incomplete_relations,
                recovered_relations: stats.recovered_relations,
                dropped_relations: stats.dropped_relations,
                traversals: stats.traversals,
                index_strategy: strategy,
                output_crs: format!("EPSG:{WGS84_SRID}"),
                output_file: output.to_string(),
            },
            bounds: stats.bounds.map(BoundingBox::from),
        }
    }

    /// Write the report as pretty-printed JSON to `path`, creating parent
    /// directories.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError`] when the file cannot be created or written.
    pub fn write(&self, path: &Utf8Path) -> Result<(), ReportError> {
        let io_error = |source| ReportError::Io {
            path: path.to_path_buf(),
            source,
        };
        let mut file = io::BufWriter::new(geotable_fs::create_utf8_file(path).map_err(io_error)?);
        serde_json::to_writer_pretty(&mut file, self).map_err(|source| {
            ReportError::Serialize {
                path: path.to_path_buf(),
                source,
            }
        })?;
        file.flush().map_err(io_error)
    }
}
