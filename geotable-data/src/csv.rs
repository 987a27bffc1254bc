//! Pipe-delimited record tables.

use std::io::{self, Write};

use camino::Utf8Path;
use geotable_core::{AttributeColumns, Record, RecordSink, SinkError};

/// Leading columns present in every table.
pub const FIXED_COLUMNS: [&str; 8] = [
    "ID",
    "NAME",
    "CATEGORY",
    "SUBCATEGORY",
    "LON",
    "LAT",
    "SRID",
    "WKT",
];

/// Trailing column holding the residual tags as JSON.
pub const OTHER_TAGS_COLUMN: &str = "OTHER_TAGS";

const DELIMITER: u8 = b'|';
const DELIMITER_REPLACEMENT: &str = ";";

/// Make `value` safe for an unquoted pipe-delimited field.
///
/// ```
/// use geotable_data::sanitize_field;
///
/// assert_eq!(sanitize_field(" Caf\u{e9}|Bar\r\nTerrace "), "Caf\u{e9};Bar  Terrace");
/// ```
#[must_use]
pub fn sanitize_field(value: &str) -> String {
    value
        .replace(['\r', '\n'], " ")
        .replace(char::from(DELIMITER), DELIMITER_REPLACEMENT)
        .trim()
        .to_owned()
}

/// [`RecordSink`] writing one table row per record.
pub struct CsvRecordSink<W: Write> {
    writer: csv::Writer<W>,
    written: u64,
}

impl CsvRecordSink<cap_std::fs_utf8::File> {
    /// Create the table at `path`, creating parent directories and writing
    /// the header.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the file cannot be created or the header
    /// cannot be written.
    pub fn create(path: &Utf8Path, columns: &AttributeColumns) -> io::Result<Self> {
        let file = geotable_fs::create_utf8_file(path)?;
        Self::new(file, columns).map_err(io::Error::from)
    }
}

impl<W: Write> CsvRecordSink<W> {
    /// Wrap `writer` and write the header for `columns`.
    ///
    /// # Errors
    ///
    /// Returns a CSV error when the header cannot be written.
    pub fn new(writer: W, columns: &AttributeColumns) -> csv::Result<Self> {
        let mut table = csv::WriterBuilder::new()
            .delimiter(DELIMITER)
            .quote_style(csv::QuoteStyle::Never)
            .from_writer(writer);
        let header: Vec<String> = FIXED_COLUMNS
            .iter()
            .copied()
            .chain(columns.names())
            .chain([OTHER_TAGS_COLUMN])
            .map(sanitize_field)
            .collect();
        table.write_record(&header)?;
        Ok(Self {
            writer: table,
            written: 0,
        })
    }

    /// Number of records written so far.
    #[must_use]
    pub const fn written(&self) -> u64 {
        self.written
    }

    /// Flush and return the underlying writer.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Flush`] when buffered rows cannot be written.
    pub fn into_inner(self) -> Result<W, SinkError> {
        self.writer.into_inner().map_err(|err| SinkError::Flush {
            source: Box::new(err.into_error()),
        })
    }
}

impl<W: Write> RecordSink for CsvRecordSink<W> {
    fn accept(&mut self, record: Record) -> Result<(), SinkError> {
        let write_error = |source: geotable_core::BoxError| SinkError::Write {
            id: record.id.clone(),
            source,
        };
        let other_tags =
            serde_json::to_string(&record.other_tags).map_err(|err| write_error(Box::new(err)))?;
        let row: Vec<String> = [
            record.id.as_str(),
            record.name.as_str(),
            record.category.as_str(),
            record.subcategory.as_str(),
            &record.lon.to_string(),
            &record.lat.to_string(),
            &record.srid.to_string(),
            record.wkt.as_str(),
        ]
        .into_iter()
        .chain(record.attributes.iter().map(String::as_str))
        .chain([other_tags.as_str()])
        .map(sanitize_field)
        .collect();
        self.writer
            .write_record(&row)
            .map_err(|err| write_error(Box::new(err)))?;
        self.written = self.written.saturating_add(1);
        Ok(())
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        self.writer.flush().map_err(|err| SinkError::Flush {
            source: Box::new(err),
        })
    }
}
