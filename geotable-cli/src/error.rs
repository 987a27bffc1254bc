//! Error types emitted by the geotable CLI.
//!
//! Keep this error type reasonably small, as many CLI helpers return
//! `Result<_, CliError>` and the workspace enables `clippy::result_large_err`.

use std::sync::Arc;

use camino::Utf8PathBuf;
use geotable_core::{IndexError, JobError, SourceError};
use geotable_data::{AttributeMapError, ClassificationError, ReportError};
use thiserror::Error;

/// Errors emitted by the geotable CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        field: &'static str,
        env: &'static str,
    },
    /// A numeric option is out of range.
    #[error("invalid {field}: {reason}")]
    InvalidArgument {
        field: &'static str,
        reason: &'static str,
    },
    /// Reprojection is not supported; output is always WGS84.
    #[error("unsupported target SRID {srid}; only EPSG:4326 is supported")]
    UnsupportedSrid { srid: u32 },
    /// A referenced input path does not exist on disk.
    #[error("{field} path {path:?} does not exist")]
    MissingSourceFile {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// A referenced input path exists but is not a file.
    #[error("{field} path {path:?} exists but is not a file")]
    SourcePathNotFile {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// A referenced input path could not be inspected due to an IO error.
    #[error("failed to inspect {field} path {path:?}: {source}")]
    InspectSourcePath {
        field: &'static str,
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The output directory exists but is not a directory.
    #[error("output directory {path:?} is not a directory")]
    OutputDirectoryNotDirectory { path: Utf8PathBuf },
    /// Creating an output or scratch directory failed.
    #[error("failed to create directory {path:?}: {source}")]
    CreateDirectory {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Loading the classification scheme failed.
    #[error(transparent)]
    Classification(#[from] ClassificationError),
    /// Loading the attribute column map failed.
    #[error(transparent)]
    AttributeMap(#[from] AttributeMapError),
    /// No decoder handles the input file.
    #[error("failed to open input {path:?}: {source}")]
    OpenSource {
        path: Utf8PathBuf,
        #[source]
        source: SourceError,
    },
    /// Opening the reference indices failed.
    #[error("failed to open reference indices for {path:?}: {source}")]
    OpenIndex {
        path: Utf8PathBuf,
        #[source]
        source: IndexError,
    },
    /// Creating the output table failed.
    #[error("failed to create output table {path:?}: {source}")]
    CreateOutput {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The conversion job failed.
    #[error("failed to convert {path:?}: {source}")]
    Job {
        path: Utf8PathBuf,
        #[source]
        source: Box<JobError>,
    },
    /// Writing the run report failed.
    #[error(transparent)]
    Report(#[from] ReportError),
}
