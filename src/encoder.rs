//! Binary-safe row encoder.
//!
//! Turns one row of raw fields into MySQL-style delimited text:
//!
//! * fields are joined by the delimiter;
//! * a null field is the escape symbol followed by `N`, never quoted;
//! * a non-null field is wrapped in the quote symbol when one is configured;
//! * inside a field, the quote and escape symbols are preceded by the escape
//!   symbol, NUL becomes escape + `0`, and the delimiter is escaped only when
//!   quoting is disabled;
//! * the terminator closes the row and is written verbatim.
//!
//! Line feeds inside a field are written as is. The enclosing quotes already
//! delimit the field, and readers that want them escaped can pick a terminator
//! that does not occur in the data.
//!
//! ```
//! use rawcsv::encoder::Encoder;
//! use rawcsv::config::EncoderConfig;
//! use rawcsv::row::Field;
//!
//! let mut enc = Encoder::new(EncoderConfig::default(), Vec::new());
//! enc.write_row([Field::from("abc"), Field::null(), Field::from("a\"b")]).unwrap();
//! assert_eq!(enc.finish().unwrap(), b"\"abc\",\\N,\"a\\\"b\"\n");
//! ```

use crate::config::EncoderConfig;
use crate::error::WriteError;
use crate::row::{Field, RowBuffer};
use crate::sink::BufferedSink;
use std::io::Write;

/// Writes encoded rows into a [`BufferedSink`].
pub struct Encoder<W: Write> {
    config: EncoderConfig,
    sink: BufferedSink<W>,
}

impl<W: Write> Encoder<W> {
    /// Encoder writing into a fresh sink around `inner`.
    pub fn new(config: EncoderConfig, inner: W) -> Self {
        Self::with_sink(config, BufferedSink::new(inner))
    }

    pub fn with_sink(config: EncoderConfig, sink: BufferedSink<W>) -> Self {
        Self { config, sink }
    }

    #[must_use]
    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    #[must_use]
    pub fn sink(&self) -> &BufferedSink<W> {
        &self.sink
    }

    /// Encode one row and append it to the sink.
    ///
    /// Returns the number of bytes now pending in the sink buffer, which the
    /// caller compares against its flush threshold.
    ///
    /// # Errors
    /// Returns the sink's sticky [`WriteError`] as soon as any append fails.
    pub fn write_row<'a, I>(&mut self, fields: I) -> Result<usize, WriteError>
    where
        I: IntoIterator<Item = Field<'a>>,
    {
        let sink = &mut self.sink;
        let cfg = &self.config;
        for (n, field) in fields.into_iter().enumerate() {
            if n > 0 {
                sink.write_byte(cfg.delimiter())?;
            }
            match field.value() {
                None => sink.write(&cfg.null_marker())?,
                Some(bytes) => encode_field(sink, cfg, bytes)?,
            }
        }
        sink.write(cfg.terminator())?;
        Ok(sink.pending())
    }

    /// Encode the row currently held in `row`.
    ///
    /// # Errors
    /// See [`Encoder::write_row`].
    pub fn write_buffer(&mut self, row: &RowBuffer) -> Result<usize, WriteError> {
        self.write_row(row.fields())
    }

    /// Encode every row in `rows`, then flush.
    ///
    /// # Errors
    /// Stops at the first [`WriteError`].
    pub fn write_all<'a, R, I>(&mut self, rows: R) -> Result<(), WriteError>
    where
        R: IntoIterator<Item = I>,
        I: IntoIterator<Item = Field<'a>>,
    {
        for row in rows {
            self.write_row(row)?;
        }
        self.flush()
    }

    /// Push pending bytes downstream.
    ///
    /// # Errors
    /// Returns the sticky [`WriteError`].
    pub fn flush(&mut self) -> Result<(), WriteError> {
        self.sink.flush()
    }

    /// Report the sticky error, if any, without writing.
    ///
    /// # Errors
    /// Returns the first recorded [`WriteError`].
    pub fn error(&self) -> Result<(), WriteError> {
        self.sink.error()
    }

    /// Bytes pending in the sink buffer.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.sink.pending()
    }

    /// Final flush; hands back the destination.
    ///
    /// # Errors
    /// Returns the sticky [`WriteError`] or the failure of the final flush.
    pub fn finish(self) -> Result<W, WriteError> {
        self.sink.finish()
    }
}

/// Write one non-null field, quoted when configured.
///
/// Runs of bytes that need no escaping are appended as one slice.
fn encode_field<W: Write>(
    sink: &mut BufferedSink<W>,
    cfg: &EncoderConfig,
    bytes: &[u8],
) -> Result<(), WriteError> {
    let quote = cfg.quote();
    let escape = cfg.escape();
    let delimiter = cfg.delimiter();

    if let Some(q) = quote {
        sink.write_byte(q)?;
    }

    let mut run = 0;
    for (i, &b) in bytes.iter().enumerate() {
        let replacement = if b == 0 {
            Some(b'0')
        } else if Some(b) == quote || b == escape {
            Some(b)
        } else if b == delimiter && quote.is_none() {
            Some(b)
        } else {
            None
        };
        if let Some(r) = replacement {
            sink.write(&bytes[run..i])?;
            sink.write(&[escape, r])?;
            run = i + 1;
        }
    }
    sink.write(&bytes[run..])?;

    if let Some(q) = quote {
        sink.write_byte(q)?;
    }
    Ok(())
}
