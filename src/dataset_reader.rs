//! CSV reader turning uploaded fuel price files into datasets

use crate::config::CsvConfig;
use crate::types::Dataset;
use csv::{ReaderBuilder, StringRecord};
use polars::prelude::PolarsError;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors raised while reading a CSV file.
#[derive(Error, Debug)]
pub enum ReadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid CSV file: {0}")]
    InvalidFormat(String),

    #[error("Data frame error: {0}")]
    Frame(#[from] PolarsError),
}

/// Reads delimited text into a [`Dataset`].
///
/// Lines with more fields than the header are skipped; lines with fewer
/// fields are padded with missing values. Cells matching a missing marker
/// (`NA`, `n/a`, `<NA>`, ...) become nulls.
#[derive(Debug, Clone)]
pub struct DatasetReader {
    delimiter: u8,
}

impl DatasetReader {
    pub fn new(delimiter: u8) -> Self {
        Self { delimiter }
    }

    pub fn from_config(config: &CsvConfig) -> Result<Self, ReadError> {
        if !config.delimiter.is_ascii() {
            return Err(ReadError::InvalidFormat(format!(
                "delimiter {:?} is not a single-byte character",
                config.delimiter
            )));
        }
        Ok(Self::new(config.delimiter as u8))
    }

    /// Read a CSV file from disk
    pub fn read_path<P: AsRef<Path>>(&self, path: P) -> Result<Dataset, ReadError> {
        let file = File::open(path.as_ref())?;
        self.read(file)
    }

    /// Read CSV content held in memory
    pub fn read_str(&self, content: &str) -> Result<Dataset, ReadError> {
        self.read(content.as_bytes())
    }

    pub fn read<R: Read>(&self, reader: R) -> Result<Dataset, ReadError> {
        let mut rdr = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers = rdr.headers()?.clone();
        if headers.is_empty() || headers.iter().all(|h| h.trim().is_empty()) {
            return Err(ReadError::InvalidFormat("no columns to parse".to_string()));
        }

        let width = headers.len();
        let mut rows: Vec<StringRecord> = Vec::new();
        let mut skipped = 0usize;

        for result in rdr.records() {
            let record = result?;

            if record.len() > width {
                skipped += 1;
                let line = record.position().map(|p| p.line()).unwrap_or(0);
                debug!(line = line, fields = record.len(), expected = width, "Skipping malformed line");
                continue;
            }

            rows.push(record);
        }

        if skipped > 0 {
            warn!(skipped = skipped, "Skipped malformed CSV lines");
        }

        let dataset = Dataset::from_rows(headers.iter(), rows.iter())?;
        debug!(rows = dataset.row_count(), columns = ?dataset.columns(), "CSV read");
        Ok(dataset)
    }
}

impl Default for DatasetReader {
    fn default() -> Self {
        Self::new(b';')
    }
}
