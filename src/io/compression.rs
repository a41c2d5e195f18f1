//! Transparent compression for export outputs and row-source inputs.
//!
//! Outputs are compressed when their path ends in a known extension
//! (`data.csv.gz`, `dump.csv.zst`, ...). Inputs are decompressed by extension
//! first, falling back to magic bytes at the start of the stream.
//!
//! ## Built-in codecs
//!
//! - **Gzip** (`.gz`) via `flate2` (feature `compression-gzip`)
//! - **Zstd** (`.zst`) via `zstd` (feature `compression-zstd`)
//! - **Bzip2** (`.bz2`) via `bzip2` (feature `compression-bzip2`)
//! - **Xz** (`.xz`) via `xz2` (feature `compression-xz`)
//!
//! Streams are `Send` because sources run on the pipeline's producer thread.
//! Output streams are [`FinishWrite`]: an encoder writes its trailer in
//! [`FinishWrite::finish`], and a failure there fails the export.
//!
//! ```
//! use rawcsv::io::compression::{CompressionCodec, DynWrite};
//! use std::io::{Read, Result};
//!
//! struct Passthrough;
//!
//! impl CompressionCodec for Passthrough {
//!     fn name(&self) -> &str { "passthrough" }
//!     fn extensions(&self) -> &[&str] { &[".raw"] }
//!     fn magic_bytes(&self) -> Option<&[u8]> { None }
//!     fn wrap_reader_dyn(&self, r: Box<dyn Read + Send>) -> Result<Box<dyn Read + Send>> { Ok(r) }
//!     fn wrap_writer_dyn(&self, w: DynWrite) -> Result<DynWrite> { Ok(w) }
//! }
//! ```

use anyhow::{Context, Result};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

/// A boxed input stream.
pub type DynRead = Box<dyn Read + Send>;
/// A boxed output stream.
pub type DynWrite = Box<dyn FinishWrite>;

/// An output stream that must be finished explicitly.
///
/// Dropping a compressing encoder also writes its trailer, but any error is
/// lost. `finish` reports it.
pub trait FinishWrite: Write + Send {
    /// Write any trailing frame, then flush the stream and everything below it.
    ///
    /// # Errors
    /// Returns the first I/O error from the trailer or the flush.
    fn finish(self: Box<Self>) -> io::Result<()>;
}

/// An output stream with no framing of its own.
struct Uncompressed<W>(W);

impl<W: Write> Write for Uncompressed<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl<W: Write + Send> FinishWrite for Uncompressed<W> {
    fn finish(mut self: Box<Self>) -> io::Result<()> {
        self.0.flush()
    }
}

/// Box a plain writer as a [`DynWrite`]; finishing it only flushes.
pub fn uncompressed<W: Write + Send + 'static>(writer: W) -> DynWrite {
    Box::new(Uncompressed(writer))
}

static CODEC_REGISTRY: RwLock<Option<Vec<Arc<dyn CompressionCodec>>>> = RwLock::new(None);

fn init_registry() -> Vec<Arc<dyn CompressionCodec>> {
    vec![
        #[cfg(feature = "compression-gzip")]
        Arc::new(GzipCodec),
        #[cfg(feature = "compression-zstd")]
        Arc::new(ZstdCodec),
        #[cfg(feature = "compression-bzip2")]
        Arc::new(Bzip2Codec),
        #[cfg(feature = "compression-xz")]
        Arc::new(XzCodec),
    ]
}

fn registry() -> Vec<Arc<dyn CompressionCodec>> {
    let mut lock = CODEC_REGISTRY
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    lock.get_or_insert_with(init_registry).clone()
}

/// Register a custom codec. Later registrations are consulted after the built-ins.
pub fn register_codec(codec: Arc<dyn CompressionCodec>) {
    let mut lock = CODEC_REGISTRY
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    lock.get_or_insert_with(init_registry).push(codec);
}

/// Pluggable compression codec.
pub trait CompressionCodec: Send + Sync {
    /// Human-readable codec name (e.g., "gzip").
    fn name(&self) -> &str;

    /// Lowercase extensions with the leading dot (e.g., `&[".gz"]`).
    fn extensions(&self) -> &[&str];

    /// Signature at the start of a compressed stream, if the format has one.
    fn magic_bytes(&self) -> Option<&[u8]>;

    fn wrap_reader_dyn(&self, reader: DynRead) -> io::Result<DynRead>;

    /// Wrap `writer` in an encoder whose [`FinishWrite::finish`] writes the
    /// trailer and then finishes `writer`.
    fn wrap_writer_dyn(&self, writer: DynWrite) -> io::Result<DynWrite>;
}

/// Codec whose extension ends `path`, matched case-insensitively.
pub fn detect_from_extension(path: impl AsRef<Path>) -> Option<Arc<dyn CompressionCodec>> {
    let path_str = path.as_ref().to_string_lossy().to_lowercase();
    registry()
        .into_iter()
        .find(|codec| codec.extensions().iter().any(|ext| path_str.ends_with(ext)))
}

/// `path` with a compression extension removed, if it has one.
///
/// `rows.csv.gz` becomes `rows.csv`; used to pick the input format.
#[must_use]
pub fn strip_compression_extension(path: &str) -> &str {
    for codec in registry() {
        for ext in codec.extensions() {
            let Some(cut) = path.len().checked_sub(ext.len()) else {
                continue;
            };
            if path.is_char_boundary(cut) && path[cut..].eq_ignore_ascii_case(ext) {
                return &path[..cut];
            }
        }
    }
    path
}

fn detect_from_magic<R: BufRead>(reader: &mut R) -> Option<Arc<dyn CompressionCodec>> {
    let buf = reader.fill_buf().ok()?;
    if buf.is_empty() {
        return None;
    }
    registry().into_iter().find(|codec| {
        codec
            .magic_bytes()
            .is_some_and(|magic| buf.starts_with(magic))
    })
}

/// Wrap an input stream with decompression when needed.
///
/// Tries the path extension first, then magic bytes; otherwise returns the
/// stream buffered but unchanged.
///
/// # Errors
/// Returns an error if the codec fails to initialize.
pub fn auto_detect_reader<R: Read + Send + 'static>(
    reader: R,
    path_hint: impl AsRef<Path>,
) -> Result<DynRead> {
    if let Some(codec) = detect_from_extension(&path_hint) {
        return codec
            .wrap_reader_dyn(Box::new(reader))
            .with_context(|| format!("wrap reader with {} codec", codec.name()));
    }

    let mut buf_reader = BufReader::new(reader);
    if let Some(codec) = detect_from_magic(&mut buf_reader) {
        return codec
            .wrap_reader_dyn(Box::new(buf_reader))
            .with_context(|| format!("wrap reader with {} codec", codec.name()));
    }

    Ok(Box::new(buf_reader))
}

/// Wrap an output stream with compression when the path extension asks for it.
///
/// No extra buffering is added; the export sink buffers already.
///
/// # Errors
/// Returns an error if the codec fails to initialize.
pub fn auto_detect_writer<W: Write + Send + 'static>(
    writer: W,
    path_hint: impl AsRef<Path>,
) -> Result<DynWrite> {
    let writer = uncompressed(writer);
    if let Some(codec) = detect_from_extension(&path_hint) {
        return codec
            .wrap_writer_dyn(writer)
            .with_context(|| format!("wrap writer with {} codec", codec.name()));
    }
    Ok(writer)
}

#[cfg(feature = "compression-gzip")]
struct GzipCodec;

#[cfg(feature = "compression-gzip")]
impl CompressionCodec for GzipCodec {
    fn name(&self) -> &str {
        "gzip"
    }

    fn extensions(&self) -> &[&str] {
        &[".gz", ".gzip"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(&[0x1f, 0x8b])
    }

    fn wrap_reader_dyn(&self, reader: DynRead) -> io::Result<DynRead> {
        use flate2::read::MultiGzDecoder;
        Ok(Box::new(MultiGzDecoder::new(reader)))
    }

    fn wrap_writer_dyn(&self, writer: DynWrite) -> io::Result<DynWrite> {
        use flate2::Compression;
        use flate2::write::GzEncoder;
        Ok(Box::new(GzEncoder::new(writer, Compression::default())))
    }
}

#[cfg(feature = "compression-gzip")]
impl FinishWrite for flate2::write::GzEncoder<DynWrite> {
    fn finish(self: Box<Self>) -> io::Result<()> {
        flate2::write::GzEncoder::finish(*self)?.finish()
    }
}

#[cfg(feature = "compression-zstd")]
struct ZstdCodec;

#[cfg(feature = "compression-zstd")]
impl CompressionCodec for ZstdCodec {
    fn name(&self) -> &str {
        "zstd"
    }

    fn extensions(&self) -> &[&str] {
        &[".zst", ".zstd"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(&[0x28, 0xb5, 0x2f, 0xfd])
    }

    fn wrap_reader_dyn(&self, reader: DynRead) -> io::Result<DynRead> {
        zstd::stream::read::Decoder::new(reader).map(|d| Box::new(d) as DynRead)
    }

    fn wrap_writer_dyn(&self, writer: DynWrite) -> io::Result<DynWrite> {
        zstd::stream::write::Encoder::new(writer, 3).map(|e| Box::new(e) as DynWrite)
    }
}

#[cfg(feature = "compression-zstd")]
impl FinishWrite for zstd::stream::write::Encoder<'static, DynWrite> {
    fn finish(self: Box<Self>) -> io::Result<()> {
        zstd::stream::write::Encoder::finish(*self)?.finish()
    }
}

#[cfg(feature = "compression-bzip2")]
struct Bzip2Codec;

#[cfg(feature = "compression-bzip2")]
impl CompressionCodec for Bzip2Codec {
    fn name(&self) -> &str {
        "bzip2"
    }

    fn extensions(&self) -> &[&str] {
        &[".bz2", ".bzip2"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(b"BZh")
    }

    fn wrap_reader_dyn(&self, reader: DynRead) -> io::Result<DynRead> {
        use bzip2::read::MultiBzDecoder;
        Ok(Box::new(MultiBzDecoder::new(reader)))
    }

    fn wrap_writer_dyn(&self, writer: DynWrite) -> io::Result<DynWrite> {
        use bzip2::Compression;
        use bzip2::write::BzEncoder;
        Ok(Box::new(BzEncoder::new(writer, Compression::default())))
    }
}

#[cfg(feature = "compression-bzip2")]
impl FinishWrite for bzip2::write::BzEncoder<DynWrite> {
    fn finish(self: Box<Self>) -> io::Result<()> {
        bzip2::write::BzEncoder::finish(*self)?.finish()
    }
}

#[cfg(feature = "compression-xz")]
struct XzCodec;

#[cfg(feature = "compression-xz")]
impl CompressionCodec for XzCodec {
    fn name(&self) -> &str {
        "xz"
    }

    fn extensions(&self) -> &[&str] {
        &[".xz"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(&[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00])
    }

    fn wrap_reader_dyn(&self, reader: DynRead) -> io::Result<DynRead> {
        use xz2::read::XzDecoder;
        Ok(Box::new(XzDecoder::new(reader)))
    }

    fn wrap_writer_dyn(&self, writer: DynWrite) -> io::Result<DynWrite> {
        use xz2::write::XzEncoder;
        Ok(Box::new(XzEncoder::new(writer, 6)))
    }
}

#[cfg(feature = "compression-xz")]
impl FinishWrite for xz2::write::XzEncoder<DynWrite> {
    fn finish(self: Box<Self>) -> io::Result<()> {
        xz2::write::XzEncoder::finish(*self)?.finish()
    }
}
