//! # rawcsv
//!
//! A **binary-safe delimited-text exporter** in the style of MySQL's
//! `SELECT ... INTO OUTFILE`. rawcsv takes rows of raw bytes from a row source
//! and writes them as quoted, escaped text without corrupting any byte, nulls
//! and NULs included.
//!
//! ## Key Features
//!
//! - **Byte-exact encoding** - configurable delimiter, quote, escape and
//!   terminator; nulls written as `\N`; NUL bytes written as `\0`
//! - **Lock-step streaming** - sources may reuse one row buffer for every
//!   fetch; the pipeline never lets a fetch overwrite a row still being encoded
//! - **Bounded memory** - output is buffered and flushed once a threshold is
//!   passed (25 MiB by default)
//! - **Fail-fast** - the first fetch or write error stops the whole export
//! - **Inputs** - in-memory rows, CSV, and JSON Lines (optional via feature flags)
//! - **Transparent compression** - gzip, zstd, bzip2 and xz by file extension
//!
//! ## Quick Start
//!
//! ```
//! use rawcsv::{Coordinator, ExportOptions, VecSource};
//!
//! # fn main() -> anyhow::Result<()> {
//! let source = VecSource::from_strs(
//!     &["id", "note"],
//!     &[&[Some("1"), Some("a\"b")], &[Some("2"), None]],
//! );
//! let out = Coordinator::new(ExportOptions::default()).run_to_vec(source)?;
//! assert_eq!(out, b"\"id\",\"note\"\n\"1\",\"a\\\"b\"\n\"2\",\\N\n");
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Concepts
//!
//! ### Rows and fields
//!
//! A [`RowBuffer`] is reusable storage for one row; a [`Field`] is a borrowed
//! view of one value in it. A [`RowSource`] fills the buffer on every fetch.
//!
//! ### Encoder and sink
//!
//! The [`Encoder`] escapes fields per its [`EncoderConfig`] and appends the
//! result to a [`BufferedSink`], which keeps the first write failure and
//! reports it on every later call.
//!
//! ### Coordinator
//!
//! The [`Coordinator`] runs the source on a producer thread and the encoder on
//! the calling thread. The row buffer moves to the consumer with each row and
//! comes back with each advance, so a row can only be overwritten after it is
//! fully encoded. A [`CancelToken`] unblocks both sides.
//!
//! ## Configuration
//!
//! [`ExportOptions`] can be built directly, or from a [`Settings`] document
//! loaded from JSON and layered with command-line values.
//!
//! ## Testing
//!
//! The [`testing`] module has mock destinations, instrumented sources and an
//! event log for asserting the order of fetches and writes.

pub mod config;
pub mod coordinator;
pub mod encoder;
pub mod error;
pub mod io;
pub mod metrics;
pub mod row;
pub mod shutdown;
pub mod sink;
pub mod source;
pub mod testing;

pub use config::{EncoderConfig, ExportOptions, Settings, DEFAULT_FLUSH_THRESHOLD};
pub use coordinator::{CancelToken, Coordinator, ExportSummary};
pub use encoder::Encoder;
pub use error::{ConfigError, ExportError, SourceError, WriteError};
pub use metrics::ExportMetrics;
pub use row::{Field, RowBuffer};
pub use sink::BufferedSink;
pub use source::{RowSource, VecSource};

#[cfg(feature = "io-csv")]
pub use io::csv::{CsvSource, CsvSourceOptions};
#[cfg(feature = "io-jsonl")]
pub use io::jsonl::JsonlSource;

/// Crate version, fixed at build time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Export `source` to `dest` with `options`.
///
/// Shorthand for `Coordinator::new(options).run(source, dest)`.
///
/// # Errors
/// Returns the first [`ExportError`].
pub fn export<S, W>(source: S, dest: W, options: ExportOptions) -> Result<ExportSummary, ExportError>
where
    S: RowSource,
    W: std::io::Write,
{
    Coordinator::new(options).run(source, dest)
}
