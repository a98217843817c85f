//! CSV file sink.

use super::ResultSink;
use crate::error::SinkError;
use crate::output::{csv_record, CSV_HEADER};
use crate::scanner::{ProbeResult, ScanSession};
use crate::types::ScanTarget;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Appends one row per result as it arrives, in completion order.
pub struct CsvSink {
    path: PathBuf,
    target: ScanTarget,
    writer: csv::Writer<File>,
}

impl CsvSink {
    /// Create (or truncate) the file and write the header row.
    pub fn create(path: impl AsRef<Path>, target: &ScanTarget) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        let mut writer = csv::Writer::from_path(&path)?;
        writer.write_record(CSV_HEADER)?;
        writer.flush()?;

        Ok(Self {
            path,
            target: target.clone(),
            writer,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ResultSink for CsvSink {
    fn name(&self) -> &str {
        "csv"
    }

    fn on_result(&mut self, result: &ProbeResult) -> Result<(), SinkError> {
        self.writer.write_record(csv_record(&self.target, result))?;
        Ok(())
    }

    fn on_complete(&mut self, _session: &ScanSession) -> Result<(), SinkError> {
        self.writer.flush()?;
        Ok(())
    }
}
