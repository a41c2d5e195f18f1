use rawcsv::io::compression::{
    CompressionCodec, DynRead, DynWrite, auto_detect_writer, detect_from_extension, register_codec,
};
use rawcsv::io::{InputFormat, InputSpec, open_output, open_source};
use rawcsv::testing::{CountingWriter, FailingWriter, TempDirPath, TempFilePath};
use rawcsv::{Coordinator, ExportError, ExportOptions, ExportSummary, RowSource, VecSource};
use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;
use std::sync::Arc;

const EXPECTED: &[u8] = b"\"id\",\"blob\"\n\"1\",\"a\\0b\"\n\"2\",\\N\n";

fn sample_rows() -> VecSource {
    VecSource::from_strs(
        &["id", "blob"],
        &[&[Some("1"), Some("a\0b")], &[Some("2"), None]],
    )
}

fn export_sample_to(path: &Path) -> anyhow::Result<ExportSummary> {
    let dest = open_output(Some(path), false)?;
    Ok(Coordinator::new(ExportOptions::default()).run_and_finish(sample_rows(), dest)?)
}

/// Export once to learn the encoded size, then again into a destination that
/// rejects the last byte. Only the codec trailer is left to write by then.
#[allow(dead_code)]
fn assert_trailer_failure_is_fatal(name: &str) -> anyhow::Result<()> {
    let counter = CountingWriter::default();
    Coordinator::new(ExportOptions::default())
        .run_and_finish(sample_rows(), auto_detect_writer(counter.clone(), name)?)?;
    let total = usize::try_from(counter.bytes())?;

    let dest = auto_detect_writer(FailingWriter::after(io::ErrorKind::StorageFull, total - 1), name)?;
    let err = Coordinator::new(ExportOptions::default())
        .run_and_finish(sample_rows(), dest)
        .unwrap_err();
    match err {
        ExportError::Write(w) => assert_eq!(w.kind(), io::ErrorKind::StorageFull),
        other => panic!("expected a write error for {name}, got {other:?}"),
    }
    Ok(())
}

#[cfg(feature = "io-csv")]
#[test]
fn csv_file_to_delimited_file() -> anyhow::Result<()> {
    let input = TempFilePath::with_extension("csv")?;
    fs::write(input.path(), "id,name,note\n1,Alice,\\N\n2,\"Bob \"\"B\"\"\",a\\b\n")?;
    let dir = TempDirPath::new()?;
    let output = dir.file_path("out/export.txt");

    let source = open_source(&InputSpec {
        path: Some(input.path()),
        format: None,
        null_token: Some("\\N"),
    })?;
    let dest = open_output(Some(output.as_path()), false)?;
    let summary = Coordinator::new(ExportOptions::default()).run_and_finish(source, dest)?;

    assert_eq!(summary.rows, 2);
    assert_eq!(
        fs::read_to_string(&output)?,
        "\"id\",\"name\",\"note\"\n\"1\",\"Alice\",\\N\n\"2\",\"Bob \\\"B\\\"\",\"a\\\\b\"\n"
    );
    Ok(())
}

#[cfg(feature = "io-jsonl")]
#[test]
fn jsonl_file_with_explicit_format() -> anyhow::Result<()> {
    // No recognised extension; the format flag decides.
    let input = TempFilePath::with_extension("log")?;
    fs::write(
        input.path(),
        "{\"id\":1,\"tags\":[\"x\"],\"name\":\"a,b\"}\n{\"id\":2,\"name\":null}\n",
    )?;
    let source = open_source(&InputSpec {
        path: Some(input.path()),
        format: Some(InputFormat::Jsonl),
        null_token: None,
    })?;
    let out = Coordinator::new(ExportOptions::default().header(false)).run_to_vec(source)?;
    assert_eq!(out, b"\"1\",\"[\\\"x\\\"]\",\"a,b\"\n\"2\",\\N,\\N\n");
    Ok(())
}

#[cfg(all(feature = "io-csv", feature = "compression-gzip"))]
#[test]
fn gzip_input_and_output_round_trip() -> anyhow::Result<()> {
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Read;

    let dir = TempDirPath::new()?;
    let input = dir.file_path("rows.csv.gz");
    let mut gz = GzEncoder::new(fs::File::create(&input)?, Compression::default());
    gz.write_all(b"v\nsecond\0byte\n")?;
    gz.finish()?;

    let output = dir.file_path("rows.out.gz");
    let source = open_source(&InputSpec {
        path: Some(input.as_path()),
        ..InputSpec::default()
    })?;
    let dest = open_output(Some(output.as_path()), false)?;
    Coordinator::new(ExportOptions::default()).run_and_finish(source, dest)?;

    let mut text = Vec::new();
    flate2::read::GzDecoder::new(fs::File::open(&output)?).read_to_end(&mut text)?;
    assert_eq!(text, b"\"v\"\n\"second\\0byte\"\n");
    Ok(())
}

#[test]
fn existing_output_is_kept_without_force() -> anyhow::Result<()> {
    let existing = TempFilePath::with_extension("csv")?;
    fs::write(existing.path(), "precious")?;

    let err = open_output(Some(existing.path()), false).err();
    assert!(err.is_some_and(|e| e.to_string().contains("--force")));
    assert_eq!(fs::read_to_string(existing.path())?, "precious");

    let mut dest = open_output(Some(existing.path()), true)?;
    dest.write_all(b"fresh")?;
    drop(dest);
    assert_eq!(fs::read_to_string(existing.path())?, "fresh");
    Ok(())
}

#[cfg(feature = "io-csv")]
#[test]
fn missing_input_names_the_path() {
    let err = open_source(&InputSpec {
        path: Some(std::path::Path::new("/definitely/not/here.csv")),
        ..InputSpec::default()
    })
    .err()
    .map(|e| format!("{e:#}"));
    assert!(err.is_some_and(|m| m.contains("/definitely/not/here.csv")));
}

#[cfg(feature = "compression-zstd")]
#[test]
fn zstd_output_round_trip() -> anyhow::Result<()> {
    let dir = TempDirPath::new()?;
    let output = dir.file_path("rows.csv.zst");
    let summary = export_sample_to(&output)?;
    assert_eq!(summary.rows, 2);
    assert_eq!(zstd::stream::decode_all(fs::File::open(&output)?)?, EXPECTED);
    Ok(())
}

#[cfg(feature = "compression-bzip2")]
#[test]
fn bzip2_output_round_trip() -> anyhow::Result<()> {
    let dir = TempDirPath::new()?;
    let output = dir.file_path("rows.csv.bz2");
    export_sample_to(&output)?;
    let mut text = Vec::new();
    bzip2::read::BzDecoder::new(fs::File::open(&output)?).read_to_end(&mut text)?;
    assert_eq!(text, EXPECTED);
    Ok(())
}

#[cfg(feature = "compression-xz")]
#[test]
fn xz_output_round_trip() -> anyhow::Result<()> {
    let dir = TempDirPath::new()?;
    let output = dir.file_path("rows.csv.xz");
    export_sample_to(&output)?;
    let mut text = Vec::new();
    xz2::read::XzDecoder::new(fs::File::open(&output)?).read_to_end(&mut text)?;
    assert_eq!(text, EXPECTED);
    Ok(())
}

#[cfg(feature = "compression-gzip")]
#[test]
fn gzip_trailer_failure_is_fatal() -> anyhow::Result<()> {
    assert_trailer_failure_is_fatal("out.csv.gz")
}

#[cfg(feature = "compression-zstd")]
#[test]
fn zstd_trailer_failure_is_fatal() -> anyhow::Result<()> {
    assert_trailer_failure_is_fatal("out.csv.zst")
}

#[cfg(feature = "compression-bzip2")]
#[test]
fn bzip2_trailer_failure_is_fatal() -> anyhow::Result<()> {
    assert_trailer_failure_is_fatal("out.csv.bz2")
}

#[cfg(feature = "compression-xz")]
#[test]
fn xz_trailer_failure_is_fatal() -> anyhow::Result<()> {
    assert_trailer_failure_is_fatal("out.csv.xz")
}

struct Passthrough;

impl CompressionCodec for Passthrough {
    fn name(&self) -> &str {
        "passthrough"
    }

    fn extensions(&self) -> &[&str] {
        &[".raw"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        None
    }

    fn wrap_reader_dyn(&self, r: DynRead) -> io::Result<DynRead> {
        Ok(r)
    }

    fn wrap_writer_dyn(&self, w: DynWrite) -> io::Result<DynWrite> {
        Ok(w)
    }
}

#[test]
fn registered_codec_is_detected() -> anyhow::Result<()> {
    register_codec(Arc::new(Passthrough));

    let codec = detect_from_extension("x.RAW").map(|c| c.name().to_string());
    assert_eq!(codec.as_deref(), Some("passthrough"));
    assert_eq!(InputFormat::from_path("rows.csv.raw"), Some(InputFormat::Csv));

    let dir = TempDirPath::new()?;
    let output = dir.file_path("rows.csv.raw");
    export_sample_to(&output)?;
    assert_eq!(fs::read(&output)?, EXPECTED);
    Ok(())
}

#[cfg(feature = "io-csv")]
#[test]
fn tsv_input_splits_on_tabs() -> anyhow::Result<()> {
    let input = TempFilePath::with_extension("tsv")?;
    fs::write(input.path(), "a\tb\nx,y\tz\n")?;
    let source = open_source(&InputSpec {
        path: Some(input.path()),
        ..InputSpec::default()
    })?;
    assert_eq!(source.columns(), ["a", "b"]);
    let out = Coordinator::new(ExportOptions::default().header(false)).run_to_vec(source)?;
    assert_eq!(out, b"\"x,y\",\"z\"\n");
    Ok(())
}

#[cfg(feature = "io-csv")]
#[test]
fn csv_source_from_path() -> anyhow::Result<()> {
    use rawcsv::{CsvSource, CsvSourceOptions};

    let input = TempFilePath::with_extension("csv")?;
    fs::write(input.path(), "k,v\n1,\n")?;
    let source = CsvSource::from_path(input.path(), CsvSourceOptions::default())?;
    assert_eq!(source.columns(), ["k", "v"]);
    let out = Coordinator::new(ExportOptions::default().header(false)).run_to_vec(source)?;
    // Without a null token an empty field stays an empty string.
    assert_eq!(out, b"\"1\",\"\"\n");
    Ok(())
}

#[cfg(feature = "io-jsonl")]
#[test]
fn jsonl_source_from_path() -> anyhow::Result<()> {
    use rawcsv::JsonlSource;

    let input = TempFilePath::with_extension("jsonl")?;
    fs::write(input.path(), "\n{\"b\":true,\"a\":\"x\"}\n")?;
    let source = JsonlSource::from_path(input.path())?;
    assert_eq!(source.columns(), ["b", "a"]);
    let out = Coordinator::new(ExportOptions::default().header(false)).run_to_vec(source)?;
    assert_eq!(out, b"\"true\",\"x\"\n");
    Ok(())
}
