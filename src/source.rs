//! Row sources.
//!
//! A [`RowSource`] is anything that can produce rows into a caller-supplied
//! [`RowBuffer`]. Sources overwrite the buffer on every call, the same way a
//! database cursor reuses its scan buffer; the pipeline coordinator makes sure
//! nobody is still reading the previous row when that happens.
//!
//! File-backed sources live in [`crate::io`].

use crate::error::SourceError;
use crate::row::RowBuffer;

pub trait RowSource: Send {
    /// Column names, in output order. Fixed for the lifetime of the source.
    fn columns(&self) -> &[String];

    /// Fetch the next row into `row`, replacing whatever it held.
    ///
    /// Returns `Ok(true)` when `row` now holds a row and `Ok(false)` at the end
    /// of the stream.
    ///
    /// # Errors
    /// Any [`SourceError`] ends the export.
    fn next_row(&mut self, row: &mut RowBuffer) -> Result<bool, SourceError>;
}

impl<S: RowSource + ?Sized> RowSource for Box<S> {
    fn columns(&self) -> &[String] {
        (**self).columns()
    }

    fn next_row(&mut self, row: &mut RowBuffer) -> Result<bool, SourceError> {
        (**self).next_row(row)
    }
}

/// Owned in-memory rows. `None` is a null field.
#[derive(Clone, Debug, Default)]
pub struct VecSource {
    columns: Vec<String>,
    rows: std::vec::IntoIter<Vec<Option<Vec<u8>>>>,
    fetched: u64,
}

impl VecSource {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Option<Vec<u8>>>>) -> Self {
        Self {
            columns,
            rows: rows.into_iter(),
            fetched: 0,
        }
    }

    /// Build from string data; convenient in tests and examples.
    pub fn from_strs(columns: &[&str], rows: &[&[Option<&str>]]) -> Self {
        Self::new(
            columns.iter().map(|c| (*c).to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|v| v.map(|s| s.as_bytes().to_vec())).collect())
                .collect(),
        )
    }
}

impl RowSource for VecSource {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn next_row(&mut self, row: &mut RowBuffer) -> Result<bool, SourceError> {
        let Some(values) = self.rows.next() else {
            return Ok(false);
        };
        self.fetched += 1;
        if !self.columns.is_empty() && values.len() != self.columns.len() {
            return Err(SourceError::RowWidth {
                row: self.fetched,
                expected: self.columns.len(),
                got: values.len(),
            });
        }
        row.clear();
        for v in &values {
            row.push(v.as_deref());
        }
        Ok(true)
    }
}
