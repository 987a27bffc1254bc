//! Destination of built records.

use log::info;
use thiserror::Error;

use crate::record::Record;
use crate::source::BoxError;

/// Consumer of records produced by a conversion job.
pub trait RecordSink {
    /// Accept one record.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] when the record cannot be stored; the job aborts.
    fn accept(&mut self, record: Record) -> Result<(), SinkError>;

    /// Progress hook called every configured number of records.
    fn progress(&mut self, records: u64) {
        info!("Processed {records} records");
    }

    /// Flush buffered output once the job has finished.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Flush`] when buffered output cannot be written.
    fn finish(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Errors raised by record sinks.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Writing one record failed.
    #[error("failed to write record {id}")]
    Write {
        /// Display id of the record.
        id: String,
        /// Underlying error.
        #[source]
        source: BoxError,
    },
    /// Flushing buffered records failed.
    #[error("failed to flush records")]
    Flush {
        /// Underlying error.
        #[source]
        source: BoxError,
    },
}

impl RecordSink for Vec<Record> {
    fn accept(&mut self, record: Record) -> Result<(), SinkError> {
        self.push(record);
        Ok(())
    }

    fn progress(&mut self, _records: u64) {}
}
