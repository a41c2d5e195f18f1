//! Mock destinations and temporary files.
//!
//! Writers here stand in for the real export destination: one that counts
//! what reaches it, one that always fails, one whose bytes can be read back
//! from another thread, and one that records each write in an [`EventLog`].

use super::{Event, EventLog};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tempfile::{NamedTempFile, TempDir};

/// A temporary file that is deleted when dropped.
pub struct TempFilePath {
    _file: NamedTempFile,
    path: PathBuf,
}

impl TempFilePath {
    /// # Errors
    /// Returns an error if the temporary file cannot be created.
    pub fn new() -> io::Result<Self> {
        let file = NamedTempFile::new()?;
        let path = file.path().to_path_buf();
        Ok(Self { _file: file, path })
    }

    /// A temporary file whose name ends in `.{extension}`, so format and
    /// compression detection see it.
    ///
    /// # Errors
    /// Returns an error if the temporary file cannot be created.
    pub fn with_extension(extension: &str) -> io::Result<Self> {
        let file = tempfile::Builder::new()
            .suffix(&format!(".{extension}"))
            .tempfile()?;
        let path = file.path().to_path_buf();
        Ok(Self { _file: file, path })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// A temporary directory that is deleted with its contents when dropped.
pub struct TempDirPath {
    _dir: TempDir,
    path: PathBuf,
}

impl TempDirPath {
    /// # Errors
    /// Returns an error if the temporary directory cannot be created.
    pub fn new() -> io::Result<Self> {
        let dir = TempDir::new()?;
        let path = dir.path().to_path_buf();
        Ok(Self { _dir: dir, path })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A path inside this directory. The file is not created.
    #[must_use]
    pub fn file_path(&self, filename: &str) -> PathBuf {
        self.path.join(filename)
    }
}

/// Writer that discards data but counts bytes and `write` calls.
///
/// Clones share their counters, so a test can keep one handle while the
/// sink owns another.
#[derive(Clone, Debug, Default)]
pub struct CountingWriter {
    bytes: Arc<AtomicU64>,
    writes: Arc<AtomicU64>,
    flushes: Arc<AtomicU64>,
}

impl CountingWriter {
    #[must_use]
    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn write_calls(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn flush_calls(&self) -> u64 {
        self.flushes.load(Ordering::SeqCst)
    }
}

impl Write for CountingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.fetch_add(buf.len() as u64, Ordering::SeqCst);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Writer that fails with a fixed error kind once `budget` bytes are accepted.
#[derive(Debug)]
pub struct FailingWriter {
    kind: io::ErrorKind,
    budget: usize,
    accepted: Vec<u8>,
}

impl FailingWriter {
    /// Fails on the first write.
    #[must_use]
    pub fn new(kind: io::ErrorKind) -> Self {
        Self::after(kind, 0)
    }

    /// Accepts `budget` bytes, then fails.
    #[must_use]
    pub fn after(kind: io::ErrorKind, budget: usize) -> Self {
        Self {
            kind,
            budget,
            accepted: Vec::new(),
        }
    }

    /// Bytes accepted before the failure.
    #[must_use]
    pub fn accepted(&self) -> &[u8] {
        &self.accepted
    }
}

impl Write for FailingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let room = self.budget - self.accepted.len();
        if room == 0 {
            return Err(io::Error::new(self.kind, "injected write failure"));
        }
        let n = room.min(buf.len());
        self.accepted.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// In-memory destination readable from another handle.
#[derive(Clone, Debug, Default)]
pub struct SharedBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far.
    #[must_use]
    pub fn contents(&self) -> Vec<u8> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// [`contents`](Self::contents) as UTF-8, lossily.
    #[must_use]
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.contents()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Writer that records every non-empty write as [`Event::Written`].
#[derive(Clone, Debug)]
pub struct EventWriter {
    log: EventLog,
}

impl EventWriter {
    #[must_use]
    pub fn new(log: EventLog) -> Self {
        Self { log }
    }
}

impl Write for EventWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !buf.is_empty() {
            self.log.record(Event::Written(buf.to_vec()));
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
