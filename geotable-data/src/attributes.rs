//! Attribute column maps loaded from JSON.
//!
//! ```json
//! [
//!   {"column": "PHONE", "tags": ["phone", "contact:phone"]},
//!   {"column": "WEBSITE", "tags": ["website"]}
//! ]
//! ```

use std::collections::BTreeSet;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use geotable_core::{AttributeColumn, AttributeColumns};
use thiserror::Error;

use crate::csv::{FIXED_COLUMNS, OTHER_TAGS_COLUMN};

/// Errors raised while loading an attribute column map.
#[derive(Debug, Error)]
pub enum AttributeMapError {
    /// Reading the map file failed.
    #[error("failed to read attribute map {path}")]
    Io {
        /// Map path.
        path: Utf8PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// The map is not a JSON array of column definitions.
    #[error("failed to parse attribute map {path}")]
    Parse {
        /// Map path.
        path: Utf8PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
    /// A column has an empty name.
    #[error("attribute column {position} has an empty name")]
    EmptyColumn {
        /// Zero-based position in the map.
        position: usize,
    },
    /// A column name repeats another column or a fixed output column.
    #[error("attribute column {column} is defined more than once")]
    DuplicateColumn {
        /// Offending column name.
        column: String,
    },
    /// A column lists no tag keys.
    #[error("attribute column {column} lists no tags")]
    NoTags {
        /// Offending column name.
        column: String,
    },
}

/// Load and validate the attribute columns defined at `path`.
///
/// # Errors
///
/// Returns [`AttributeMapError`] when the file cannot be read or parsed, or
/// when a column is unnamed, duplicated or lists no tags.
pub fn load_attribute_columns(path: &Utf8Path) -> Result<AttributeColumns, AttributeMapError> {
    let file = geotable_fs::open_utf8_file(path).map_err(|source| AttributeMapError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let columns: Vec<AttributeColumn> =
        serde_json::from_reader(io::BufReader::new(file)).map_err(|source| {
            AttributeMapError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })?;
    validate(columns)
}

/// Validate column definitions parsed from any source.
///
/// Column names are trimmed and upper-cased to match the fixed headers.
///
/// # Errors
///
/// See [`load_attribute_columns`].
pub fn validate(columns: Vec<AttributeColumn>) -> Result<AttributeColumns, AttributeMapError> {
    let mut seen: BTreeSet<String> = FIXED_COLUMNS
        .iter()
        .chain([&OTHER_TAGS_COLUMN])
        .map(|&name| name.to_owned())
        .collect();
    let mut validated = Vec::with_capacity(columns.len());
    for (position, column) in columns.into_iter().enumerate() {
        let name = column.column.trim().to_uppercase();
        if name.is_empty() {
            return Err(AttributeMapError::EmptyColumn { position });
        }
        if !seen.insert(name.clone()) {
            return Err(AttributeMapError::DuplicateColumn { column: name });
        }
        let tags: Vec<String> = column
            .tags
            .iter()
            .map(|key| key.trim())
            .filter(|key| !key.is_empty())
            .map(str::to_owned)
            .collect();
        if tags.is_empty() {
            return Err(AttributeMapError::NoTags { column: name });
        }
        validated.push(AttributeColumn { column: name, tags });
    }
    Ok(AttributeColumns::new(validated))
}
