//! JSON Lines row source.
//!
//! Each non-blank line is one JSON object. The first object fixes the column
//! list (in document order); every later object is read by key, so key order
//! may vary between lines. A missing key or a JSON `null` becomes a null field,
//! strings are exported as their raw UTF-8 bytes, and any other value is
//! exported as compact JSON text.

use crate::error::SourceError;
use crate::io::compression::{DynRead, auto_detect_reader};
use crate::row::RowBuffer;
use crate::source::RowSource;
use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

pub struct JsonlSource<R: BufRead> {
    reader: R,
    columns: Vec<String>,
    line: String,
    line_no: u64,
    pending: Option<Map<String, Value>>,
    scratch: Vec<u8>,
}

impl<R: BufRead + Send> JsonlSource<R> {
    /// Source over `reader`. Reads the first object to learn the columns.
    ///
    /// # Errors
    /// Returns an error if the first non-blank line is not a JSON object.
    pub fn new(reader: R) -> Result<Self, SourceError> {
        let mut src = Self {
            reader,
            columns: Vec::new(),
            line: String::new(),
            line_no: 0,
            pending: None,
            scratch: Vec::new(),
        };
        if let Some(first) = src.read_object()? {
            src.columns = first.keys().cloned().collect();
            src.pending = Some(first);
        }
        Ok(src)
    }

    fn read_object(&mut self) -> Result<Option<Map<String, Value>>, SourceError> {
        loop {
            self.line.clear();
            if self.reader.read_line(&mut self.line)? == 0 {
                return Ok(None);
            }
            self.line_no += 1;
            if self.line.trim().is_empty() {
                continue;
            }
            let value: Value =
                serde_json::from_str(&self.line).map_err(|source| SourceError::Json {
                    line: self.line_no,
                    source,
                })?;
            return match value {
                Value::Object(map) => Ok(Some(map)),
                _ => Err(SourceError::NotAnObject { line: self.line_no }),
            };
        }
    }
}

impl JsonlSource<BufReader<DynRead>> {
    /// Open a JSONL file, decompressing it when needed.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or its first line parsed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
        let rdr = auto_detect_reader(f, path)
            .with_context(|| format!("setup decompression for {}", path.display()))?;
        Self::new(BufReader::new(rdr))
            .with_context(|| format!("read first JSONL record of {}", path.display()))
    }
}

impl<R: BufRead + Send> RowSource for JsonlSource<R> {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn next_row(&mut self, row: &mut RowBuffer) -> Result<bool, SourceError> {
        let object = match self.pending.take() {
            Some(object) => object,
            None => match self.read_object()? {
                Some(object) => object,
                None => return Ok(false),
            },
        };
        row.clear();
        for column in &self.columns {
            match object.get(column) {
                None | Some(Value::Null) => row.push_null(),
                Some(Value::String(s)) => row.push_field(s.as_bytes()),
                Some(other) => {
                    self.scratch.clear();
                    serde_json::to_writer(&mut self.scratch, other).map_err(|source| {
                        SourceError::Json {
                            line: self.line_no,
                            source,
                        }
                    })?;
                    row.push_field(&self.scratch);
                }
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_follow_first_object() {
        let src = JsonlSource::new(&b"{\"b\":1,\"a\":\"x\"}\n"[..]).unwrap();
        assert_eq!(src.columns(), ["b", "a"]);
    }

    #[test]
    fn values_are_rendered_per_type() {
        let input = b"{\"s\":\"a\\\"b\",\"n\":1.5,\"z\":null,\"o\":{\"k\":[1,2]}}\n\n{\"n\":true}\n";
        let mut src = JsonlSource::new(&input[..]).unwrap();
        let mut row = RowBuffer::new();

        assert!(src.next_row(&mut row).unwrap());
        assert_eq!(
            row.to_owned_fields(),
            vec![
                Some(b"a\"b".to_vec()),
                Some(b"1.5".to_vec()),
                None,
                Some(b"{\"k\":[1,2]}".to_vec()),
            ]
        );

        assert!(src.next_row(&mut row).unwrap());
        assert_eq!(
            row.to_owned_fields(),
            vec![None, Some(b"true".to_vec()), None, None]
        );
        assert!(!src.next_row(&mut row).unwrap());
    }

    #[test]
    fn non_object_line_is_an_error() {
        let mut src = JsonlSource::new(&b"{\"a\":1}\n[1]\n"[..]).unwrap();
        let mut row = RowBuffer::new();
        assert!(src.next_row(&mut row).unwrap());
        assert!(matches!(
            src.next_row(&mut row),
            Err(SourceError::NotAnObject { line: 2 })
        ));
    }

    #[test]
    fn empty_input_has_no_columns_or_rows() {
        let mut src = JsonlSource::new(&b""[..]).unwrap();
        let mut row = RowBuffer::new();
        assert!(src.columns().is_empty());
        assert!(!src.next_row(&mut row).unwrap());
    }
}
