//! Element sources backed by OpenStreetMap files.
//!
//! Every source reopens its file at the start of each traversal, so the
//! coordinator can scan an input several times without holding it in memory.

use std::fmt;

use camino::Utf8Path;
use geotable_core::{ElementSource, SourceError};
use thiserror::Error;

mod pbf;
mod xml;

pub use pbf::PbfSource;
pub use xml::XmlSource;

/// Encoding of an input file, derived from its extension.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InputFormat {
    /// Plain OSM XML (`.osm`, `.xml`).
    Xml,
    /// Bzip2-compressed OSM XML (`.bz2`).
    XmlBzip2,
    /// OSM protocol buffer binary format (`.pbf`).
    Pbf,
}

impl InputFormat {
    /// Detect the format from the final extension of `path`.
    ///
    /// ```
    /// use camino::Utf8Path;
    /// use geotable_data::InputFormat;
    ///
    /// assert_eq!(InputFormat::from_path(Utf8Path::new("a.osm.bz2")), Some(InputFormat::XmlBzip2));
    /// assert_eq!(InputFormat::from_path(Utf8Path::new("a.OSM.PBF")), Some(InputFormat::Pbf));
    /// assert_eq!(InputFormat::from_path(Utf8Path::new("a.geojson")), None);
    /// ```
    #[must_use]
    pub fn from_path(path: &Utf8Path) -> Option<Self> {
        let extension = path.extension()?.to_ascii_lowercase();
        match extension.as_str() {
            "osm" | "xml" => Some(Self::Xml),
            "bz2" => Some(Self::XmlBzip2),
            "pbf" => Some(Self::Pbf),
            _ => None,
        }
    }
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Xml => "OSM XML",
            Self::XmlBzip2 => "bzip2 OSM XML",
            Self::Pbf => "OSM PBF",
        })
    }
}

/// Raised when no decoder handles a file extension.
#[derive(Debug, Error)]
#[error("unsupported input format; expected .osm, .xml, .bz2 or .pbf")]
pub struct UnsupportedFormat;

/// Open the decoder matching the extension of `path`.
///
/// The file itself is opened lazily by the first traversal.
///
/// # Errors
///
/// Returns [`SourceError::Open`] when the extension is not recognised.
pub fn open_source(path: &Utf8Path) -> Result<Box<dyn ElementSource>, SourceError> {
    match InputFormat::from_path(path) {
        Some(InputFormat::Xml) => Ok(Box::new(XmlSource::new(path))),
        Some(InputFormat::XmlBzip2) => Ok(Box::new(XmlSource::bzip2(path))),
        Some(InputFormat::Pbf) => Ok(Box::new(PbfSource::new(path))),
        None => Err(SourceError::Open {
            path: path.as_std_path().to_path_buf(),
            source: Box::new(UnsupportedFormat),
        }),
    }
}

fn open_error(path: &Utf8Path, source: impl Into<geotable_core::BoxError>) -> SourceError {
    SourceError::Open {
        path: path.as_std_path().to_path_buf(),
        source: source.into(),
    }
}

fn decode_error(
    path: &Utf8Path,
    offset: u64,
    source: impl Into<geotable_core::BoxError>,
) -> SourceError {
    SourceError::Decode {
        path: path.as_std_path().to_path_buf(),
        offset,
        source: source.into(),
    }
}
