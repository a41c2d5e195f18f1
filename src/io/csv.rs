//! CSV row source.
//!
//! Reads a CSV stream with the `csv` crate and yields each record as raw bytes.
//! One `ByteRecord` is reused for every read and its fields are copied into
//! the pipeline's [`RowBuffer`], so a long file is streamed without a per-row
//! allocation.
//!
//! Standard CSV has no null, so an optional null token (for example `\N`)
//! marks fields that should be exported as null.

use crate::error::SourceError;
use crate::io::compression::{DynRead, auto_detect_reader};
use crate::row::RowBuffer;
use crate::source::RowSource;
use anyhow::{Context, Result};
use csv::{ByteRecord, ReaderBuilder};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Options for [`CsvSource`].
#[derive(Clone, Debug)]
pub struct CsvSourceOptions {
    /// Input field delimiter.
    pub delimiter: u8,
    /// Whether the first record holds column names. Without one, columns are
    /// named `column_1`, `column_2`, ...
    pub has_headers: bool,
    /// Field value that is read as null.
    pub null_token: Option<Vec<u8>>,
}

impl Default for CsvSourceOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            has_headers: true,
            null_token: None,
        }
    }
}

pub struct CsvSource<R: Read> {
    reader: csv::Reader<R>,
    columns: Vec<String>,
    record: ByteRecord,
    // First record, already read to size the columns of a headerless file.
    pending: bool,
    null_token: Option<Vec<u8>>,
}

impl<R: Read + Send> CsvSource<R> {
    /// Source over `reader` with default options.
    ///
    /// # Errors
    /// Returns an error if the header record cannot be read.
    pub fn new(reader: R) -> Result<Self, SourceError> {
        Self::with_options(reader, CsvSourceOptions::default())
    }

    /// # Errors
    /// Returns an error if the header (or, without headers, the first record)
    /// cannot be read.
    pub fn with_options(reader: R, options: CsvSourceOptions) -> Result<Self, SourceError> {
        let mut reader = ReaderBuilder::new()
            .delimiter(options.delimiter)
            .has_headers(options.has_headers)
            .flexible(false)
            .from_reader(reader);
        let mut record = ByteRecord::new();
        let (columns, pending) = if options.has_headers {
            let columns = reader
                .byte_headers()?
                .iter()
                .map(|h| String::from_utf8_lossy(h).into_owned())
                .collect();
            (columns, false)
        } else {
            let pending = reader.read_byte_record(&mut record)?;
            let columns = (1..=record.len()).map(|i| format!("column_{i}")).collect();
            (columns, pending)
        };
        Ok(Self {
            reader,
            columns,
            record,
            pending,
            null_token: options.null_token,
        })
    }
}

impl CsvSource<DynRead> {
    /// Open a CSV file, decompressing it when needed.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or its header read.
    pub fn from_path(path: impl AsRef<Path>, options: CsvSourceOptions) -> Result<Self> {
        let path = path.as_ref();
        let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
        let rdr = auto_detect_reader(f, path)
            .with_context(|| format!("setup decompression for {}", path.display()))?;
        Self::with_options(rdr, options)
            .with_context(|| format!("read CSV header of {}", path.display()))
    }
}

impl<R: Read + Send> RowSource for CsvSource<R> {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn next_row(&mut self, row: &mut RowBuffer) -> Result<bool, SourceError> {
        if self.pending {
            self.pending = false;
        } else if !self.reader.read_byte_record(&mut self.record)? {
            return Ok(false);
        }
        row.clear();
        for field in &self.record {
            match &self.null_token {
                Some(token) if field == token.as_slice() => row.push_null(),
                _ => row.push_field(field),
            }
        }
        Ok(true)
    }
}
