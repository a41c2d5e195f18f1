//! Input formats, output destinations, and compression.

pub mod compression;

#[cfg_attr(docsrs, doc(cfg(feature = "io-jsonl")))]
#[cfg(feature = "io-jsonl")]
pub mod jsonl;

#[cfg_attr(docsrs, doc(cfg(feature = "io-csv")))]
#[cfg(feature = "io-csv")]
pub mod csv;

use crate::source::RowSource;
use anyhow::{Context, Result, bail};
use compression::{
    DynRead, DynWrite, auto_detect_reader, auto_detect_writer, strip_compression_extension, uncompressed,
};
use std::fmt;
use std::fs::{OpenOptions, create_dir_all};
use std::io::ErrorKind;
use std::path::Path;
use std::str::FromStr;

/// Row source file format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputFormat {
    Csv,
    Jsonl,
}

impl InputFormat {
    /// Guess from a file name, ignoring compression suffixes.
    #[must_use]
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        let name = path.as_ref().to_string_lossy();
        let name = strip_compression_extension(&name).to_lowercase();
        if name.ends_with(".csv") || name.ends_with(".tsv") {
            Some(Self::Csv)
        } else if name.ends_with(".jsonl") || name.ends_with(".ndjson") {
            Some(Self::Jsonl)
        } else {
            None
        }
    }
}

impl FromStr for InputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "jsonl" | "ndjson" => Ok(Self::Jsonl),
            other => Err(format!("unknown input format {other:?} (expected csv or jsonl)")),
        }
    }
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Csv => write!(f, "csv"),
            Self::Jsonl => write!(f, "jsonl"),
        }
    }
}

#[cfg(feature = "io-csv")]
fn is_tsv(name: &str) -> bool {
    strip_compression_extension(name)
        .to_ascii_lowercase()
        .ends_with(".tsv")
}

/// Where rows come from.
#[derive(Clone, Debug, Default)]
pub struct InputSpec<'a> {
    /// File path; `None` reads standard input.
    pub path: Option<&'a Path>,
    /// Explicit format; otherwise guessed from the path, then CSV.
    pub format: Option<InputFormat>,
    /// CSV field value read as null.
    pub null_token: Option<&'a str>,
}

/// Open a row source for `input`.
///
/// # Errors
/// Returns an error if the input cannot be opened, its format is not compiled
/// in, or its first record cannot be read.
pub fn open_source(input: &InputSpec<'_>) -> Result<Box<dyn RowSource>> {
    let format = input
        .format
        .or_else(|| input.path.and_then(InputFormat::from_path))
        .unwrap_or(InputFormat::Csv);

    match format {
        #[cfg(feature = "io-csv")]
        InputFormat::Csv => {
            let tsv = input.path.is_some_and(|p| is_tsv(&p.to_string_lossy()));
            let options = csv::CsvSourceOptions {
                null_token: input.null_token.map(|t| t.as_bytes().to_vec()),
                delimiter: if tsv { b'\t' } else { b',' },
                ..csv::CsvSourceOptions::default()
            };
            let src = match input.path {
                Some(path) => csv::CsvSource::from_path(path, options)?,
                None => csv::CsvSource::with_options(stdin_reader()?, options)
                    .context("read CSV header of standard input")?,
            };
            Ok(Box::new(src))
        }
        #[cfg(feature = "io-jsonl")]
        InputFormat::Jsonl => {
            let src = match input.path {
                Some(path) => jsonl::JsonlSource::from_path(path)?,
                None => jsonl::JsonlSource::new(std::io::BufReader::new(stdin_reader()?))
                    .context("read first JSONL record of standard input")?,
            };
            Ok(Box::new(src))
        }
        #[allow(unreachable_patterns)]
        other => bail!("input format {other} is not enabled in this build"),
    }
}

#[cfg(any(feature = "io-csv", feature = "io-jsonl"))]
fn stdin_reader() -> Result<DynRead> {
    auto_detect_reader(std::io::stdin(), "").context("setup decompression for standard input")
}

/// Open the export destination.
///
/// `None` writes to standard output. A file path is created fresh; an existing
/// file is refused unless `overwrite` is set. Parent directories are created,
/// and a compression extension enables the matching codec.
///
/// # Errors
/// Returns an error if the file exists (without `overwrite`) or cannot be created.
pub fn open_output(path: Option<&Path>, overwrite: bool) -> Result<DynWrite> {
    let Some(path) = path else {
        return Ok(uncompressed(std::io::stdout()));
    };
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        create_dir_all(parent).with_context(|| format!("mkdir -p {}", parent.display()))?;
    }
    let mut opts = OpenOptions::new();
    opts.write(true);
    if overwrite {
        opts.create(true).truncate(true);
    } else {
        opts.create_new(true);
    }
    let f = match opts.open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            bail!(
                "{} already exists; remove it, pick another name, or pass --force",
                path.display()
            )
        }
        Err(e) => return Err(e).with_context(|| format!("create {}", path.display())),
    };
    auto_detect_writer(f, path).with_context(|| format!("setup compression for {}", path.display()))
}
