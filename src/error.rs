//! Error types for configuration, sources, sinks, and the export pipeline.
//!
//! Every error in this module is fatal to an export. There is no row-level
//! recovery: a partially written file is treated the same as a failed one.

use std::io;
use std::sync::Arc;
use thiserror::Error;

/// Invalid encoder or export configuration, detected before streaming starts.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A delimiter, quote, or escape symbol that is not exactly one single-byte character.
    #[error("{name} must be exactly one single-byte character, got {value:?}")]
    InvalidSymbol { name: &'static str, value: String },

    /// Two symbols that must differ were configured with the same byte.
    #[error("{first} and {second} must differ, both are {value:?}")]
    ConflictingSymbols {
        first: &'static str,
        second: &'static str,
        value: char,
    },

    /// The flush threshold was zero.
    #[error("flush threshold must be greater than zero")]
    ZeroFlushThreshold,

    /// The settings file could not be read.
    #[error("read settings {path}: {source}")]
    SettingsIo {
        path: String,
        #[source]
        source: io::Error,
    },

    /// The settings file is not valid JSON for [`Settings`](crate::config::Settings).
    #[error("parse settings {path}: {source}")]
    SettingsParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// A failed write to the destination behind a [`BufferedSink`](crate::sink::BufferedSink).
///
/// The first failure is recorded and every later write, flush, or probe returns
/// a clone of it, so the underlying `io::Error` is shared.
#[derive(Error, Debug, Clone)]
#[error("write to sink failed: {source}")]
pub struct WriteError {
    #[source]
    source: Arc<io::Error>,
}

impl WriteError {
    /// The I/O error kind of the original failure.
    #[must_use]
    pub fn kind(&self) -> io::ErrorKind {
        self.source.kind()
    }
}

impl From<io::Error> for WriteError {
    fn from(err: io::Error) -> Self {
        Self {
            source: Arc::new(err),
        }
    }
}

/// A failed fetch from a [`RowSource`](crate::source::RowSource).
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[cfg(feature = "io-csv")]
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error on line {line}: {source}")]
    Json {
        line: u64,
        #[source]
        source: serde_json::Error,
    },

    /// A record that is not a JSON object.
    #[error("line {line} is not a JSON object")]
    NotAnObject { line: u64 },

    /// A row whose field count differs from the column count.
    #[error("row {row} has {got} fields, expected {expected}")]
    RowWidth {
        row: u64,
        expected: usize,
        got: usize,
    },

    /// Any other failure reported by a custom source.
    #[error("{0}")]
    Other(String),
}

/// Failure of a whole export run.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error("fetch row: {0}")]
    Source(#[from] SourceError),

    /// An advance signal acknowledged a different row than the one in flight.
    /// The coordinator cannot produce this by construction; seeing it is a bug.
    #[error("protocol violation: advance for row {got} while row {expected} was in flight")]
    ProtocolViolation { expected: u64, got: u64 },

    #[error("export cancelled")]
    Cancelled,

    #[error("row producer panicked")]
    ProducerPanicked,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_error_clones_share_kind() {
        let err = WriteError::from(io::Error::new(io::ErrorKind::BrokenPipe, "gone"));
        let again = err.clone();
        assert_eq!(again.kind(), io::ErrorKind::BrokenPipe);
        assert!(again.to_string().contains("gone"));
    }

    #[test]
    fn export_error_wraps_source_error() {
        let err: ExportError = SourceError::Other("cursor reset".into()).into();
        assert_eq!(err.to_string(), "fetch row: cursor reset");
    }
}
