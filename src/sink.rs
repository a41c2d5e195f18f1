//! Buffered output sink with a sticky first error.
//!
//! [`BufferedSink`] sits between the encoder and the real destination. Encoded
//! bytes accumulate in memory until [`flush`](BufferedSink::flush) pushes them
//! downstream; the pipeline decides when to flush based on
//! [`pending`](BufferedSink::pending). The first destination failure is kept
//! and returned by every later write, flush, and [`error`](BufferedSink::error)
//! probe; the failed operation is never retried.
//!
//! The destination always gets a final flush: either through
//! [`finish`](BufferedSink::finish), or best effort when the sink is dropped.

use crate::error::WriteError;
use std::io::Write;
use tracing::{debug, warn};

const DEFAULT_CAPACITY: usize = 64 * 1024;

pub struct BufferedSink<W: Write> {
    // `None` only after `finish` has handed the destination back.
    inner: Option<W>,
    buf: Vec<u8>,
    error: Option<WriteError>,
    written: u64,
    flushes: u64,
}

impl<W: Write> BufferedSink<W> {
    pub fn new(inner: W) -> Self {
        Self::with_capacity(DEFAULT_CAPACITY, inner)
    }

    /// A sink whose buffer starts with room for `capacity` bytes. The buffer
    /// grows past this if callers flush less often.
    pub fn with_capacity(capacity: usize, inner: W) -> Self {
        Self {
            inner: Some(inner),
            buf: Vec::with_capacity(capacity),
            error: None,
            written: 0,
            flushes: 0,
        }
    }

    /// Append bytes to the buffer.
    ///
    /// # Errors
    /// Returns the sticky error if an earlier flush failed.
    #[inline]
    pub fn write(&mut self, bytes: &[u8]) -> Result<(), WriteError> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    /// Append a single byte.
    ///
    /// # Errors
    /// Returns the sticky error if an earlier flush failed.
    #[inline]
    pub fn write_byte(&mut self, b: u8) -> Result<(), WriteError> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        self.buf.push(b);
        Ok(())
    }

    /// Push every buffered byte to the destination, then flush the destination.
    ///
    /// With nothing buffered no bytes are written downstream.
    ///
    /// # Errors
    /// Returns the first failure, which also becomes the sticky error.
    pub fn flush(&mut self) -> Result<(), WriteError> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        let Some(inner) = self.inner.as_mut() else {
            return Ok(());
        };
        let result = if self.buf.is_empty() {
            inner.flush()
        } else {
            inner.write_all(&self.buf).and_then(|()| inner.flush())
        };
        match result {
            Ok(()) => {
                if !self.buf.is_empty() {
                    debug!(bytes = self.buf.len(), "flushed sink");
                    self.written += self.buf.len() as u64;
                    self.flushes += 1;
                    self.buf.clear();
                }
                Ok(())
            }
            Err(e) => {
                let err = WriteError::from(e);
                warn!(error = %err, "sink write failed");
                self.error = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Zero-length probe that reports the sticky error, if any, without writing.
    ///
    /// # Errors
    /// Returns the first recorded failure.
    pub fn error(&self) -> Result<(), WriteError> {
        match &self.error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    /// Bytes buffered and not yet pushed downstream.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Bytes successfully pushed downstream so far.
    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    /// Number of flushes that pushed at least one byte.
    #[must_use]
    pub fn flush_count(&self) -> u64 {
        self.flushes
    }

    /// The destination, for inspection.
    pub fn get_ref(&self) -> Option<&W> {
        self.inner.as_ref()
    }

    /// Final flush, then hand back the destination.
    ///
    /// # Errors
    /// Returns the sticky error or the failure of the final flush.
    pub fn finish(mut self) -> Result<W, WriteError> {
        self.flush()?;
        self.inner
            .take()
            .ok_or_else(|| WriteError::from(std::io::Error::other("sink already finished")))
    }
}

impl<W: Write> Drop for BufferedSink<W> {
    fn drop(&mut self) {
        if self.inner.is_some() && self.error.is_none() && !self.buf.is_empty() {
            let _ = self.flush();
        }
    }
}
