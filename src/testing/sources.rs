//! Instrumented row sources.

use super::{Event, EventLog};
use crate::error::SourceError;
use crate::row::RowBuffer;
use crate::source::RowSource;

/// Single-column source that rewrites the caller's buffer in place.
///
/// When the buffer already holds one field of the right length, `next_row`
/// overwrites those bytes instead of rebuilding the row, the way a database
/// cursor reuses its scan buffer. Anyone still reading the previous row
/// through the same storage would see it change.
#[derive(Debug)]
pub struct MutatingSource {
    columns: Vec<String>,
    values: std::vec::IntoIter<Vec<u8>>,
    fetched: u64,
    in_place: u64,
    log: Option<EventLog>,
}

impl MutatingSource {
    pub fn new<I, V>(column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Vec<u8>>,
    {
        Self {
            columns: vec![column.to_string()],
            values: values.into_iter().map(Into::into).collect::<Vec<_>>().into_iter(),
            fetched: 0,
            in_place: 0,
            log: None,
        }
    }

    /// Record an [`Event::Fetched`] for every row produced.
    #[must_use]
    pub fn with_log(mut self, log: EventLog) -> Self {
        self.log = Some(log);
        self
    }

    /// Rows produced by overwriting the previous row's bytes.
    #[must_use]
    pub fn in_place_rewrites(&self) -> u64 {
        self.in_place
    }
}

impl RowSource for MutatingSource {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn next_row(&mut self, row: &mut RowBuffer) -> Result<bool, SourceError> {
        let Some(value) = self.values.next() else {
            return Ok(false);
        };
        self.fetched += 1;
        if row.len() == 1 && row.overwrite_field(0, &value) {
            self.in_place += 1;
        } else {
            row.clear();
            row.push_field(&value);
        }
        if let Some(log) = &self.log {
            log.record(Event::Fetched(self.fetched));
        }
        Ok(true)
    }
}

/// Source that yields `ok_rows` rows and then fails.
#[derive(Debug)]
pub struct FailingSource {
    columns: Vec<String>,
    ok_rows: u64,
    fetched: u64,
}

impl FailingSource {
    #[must_use]
    pub fn new(columns: &[&str], ok_rows: u64) -> Self {
        Self {
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
            ok_rows,
            fetched: 0,
        }
    }
}

impl RowSource for FailingSource {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn next_row(&mut self, row: &mut RowBuffer) -> Result<bool, SourceError> {
        if self.fetched == self.ok_rows {
            return Err(SourceError::Other(format!(
                "injected fetch failure after {} rows",
                self.ok_rows
            )));
        }
        self.fetched += 1;
        row.clear();
        let value = format!("row{}", self.fetched);
        for _ in &self.columns {
            row.push_field(value.as_bytes());
        }
        Ok(true)
    }
}

/// Source that never ends. Every row is `columns` copies of `value`.
#[derive(Debug)]
pub struct EndlessSource {
    columns: Vec<String>,
    value: Vec<u8>,
}

impl EndlessSource {
    #[must_use]
    pub fn new(columns: &[&str], value: &[u8]) -> Self {
        Self {
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
            value: value.to_vec(),
        }
    }
}

impl RowSource for EndlessSource {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn next_row(&mut self, row: &mut RowBuffer) -> Result<bool, SourceError> {
        row.clear();
        for _ in &self.columns {
            row.push_field(&self.value);
        }
        Ok(true)
    }
}
