use rawcsv::testing::{
    CountingWriter, EndlessSource, Event, EventLog, EventWriter, FailingSource, FailingWriter,
    MutatingSource, SharedBuffer,
};
use rawcsv::{CancelToken, Coordinator, ExportError, ExportOptions, VecSource};
use std::io;
use std::thread;
use std::time::Duration;

fn no_header() -> ExportOptions {
    ExportOptions::default().header(false)
}

#[test]
fn rows_without_header() -> anyhow::Result<()> {
    let src = VecSource::from_strs(&["v"], &[&[Some("abc")], &[Some("def")]]);
    let out = Coordinator::new(no_header()).run_to_vec(src)?;
    assert_eq!(out, b"\"abc\"\n\"def\"\n");
    Ok(())
}

#[test]
fn header_goes_through_the_same_encoder() -> anyhow::Result<()> {
    let src = VecSource::from_strs(&["id", "say \"hi\""], &[&[Some("1"), None]]);
    let out = Coordinator::new(ExportOptions::default()).run_to_vec(src)?;
    assert_eq!(out, b"\"id\",\"say \\\"hi\\\"\"\n\"1\",\\N\n");
    Ok(())
}

#[test]
fn header_only_for_empty_result() -> anyhow::Result<()> {
    let src = VecSource::from_strs(&["a", "b"], &[]);
    let buf = SharedBuffer::new();
    let summary = Coordinator::new(ExportOptions::default()).run(src, buf.clone())?;
    assert_eq!(buf.to_string_lossy(), "\"a\",\"b\"\n");
    assert_eq!(summary.rows, 0);
    assert!(summary.header);
    Ok(())
}

#[test]
fn reused_storage_keeps_each_rows_value() -> anyhow::Result<()> {
    let src = MutatingSource::new("v", ["first", "secnd", "third"]);
    let out = Coordinator::new(no_header()).run_to_vec(src)?;
    assert_eq!(out, b"\"first\"\n\"secnd\"\n\"third\"\n");
    Ok(())
}

#[test]
fn fetches_and_writes_alternate() -> anyhow::Result<()> {
    let log = EventLog::new();
    let src = MutatingSource::new("v", ["aa", "bb", "cc"]).with_log(log.clone());
    let opts = no_header().flush_threshold(1);
    let summary = Coordinator::new(opts).run(src, EventWriter::new(log.clone()))?;

    assert_eq!(summary.rows, 3);
    assert_eq!(summary.threshold_flushes, 3);
    assert_eq!(
        log.events(),
        vec![
            Event::Fetched(1),
            Event::Written(b"\"aa\"\n".to_vec()),
            Event::Fetched(2),
            Event::Written(b"\"bb\"\n".to_vec()),
            Event::Fetched(3),
            Event::Written(b"\"cc\"\n".to_vec()),
        ]
    );
    Ok(())
}

#[test]
fn large_threshold_defers_writes_to_the_end() -> anyhow::Result<()> {
    let counter = CountingWriter::default();
    let src = MutatingSource::new("v", ["aa"; 100]);
    let summary = Coordinator::new(no_header()).run(src, counter.clone())?;

    assert_eq!(summary.threshold_flushes, 0);
    assert_eq!(counter.write_calls(), 1);
    assert_eq!(counter.bytes(), 500);
    assert_eq!(summary.bytes, 500);
    Ok(())
}

#[test]
fn small_threshold_bounds_the_buffer() -> anyhow::Result<()> {
    let counter = CountingWriter::default();
    let src = MutatingSource::new("v", ["aa"; 100]);
    // Five rows (25 bytes) are the first to pass the threshold.
    let opts = no_header().flush_threshold(20);
    let summary = Coordinator::new(opts).run(src, counter.clone())?;

    assert_eq!(summary.threshold_flushes, 20);
    assert_eq!(counter.write_calls(), 20);
    assert_eq!(counter.bytes(), 500);
    Ok(())
}

#[test]
fn fetch_failure_is_fatal() {
    let buf = SharedBuffer::new();
    let src = FailingSource::new(&["a"], 2);
    let err = Coordinator::new(no_header())
        .run(src, buf.clone())
        .unwrap_err();

    assert!(matches!(err, ExportError::Source(_)));
    assert!(err.to_string().contains("injected fetch failure"));
    // Rows before the failure were flushed on the way out; there is no retry.
    assert_eq!(buf.to_string_lossy(), "\"row1\"\n\"row2\"\n");
}

#[test]
fn write_failure_stops_the_producer() {
    let src = EndlessSource::new(&["a"], b"payload");
    let opts = no_header().flush_threshold(64);
    let err = Coordinator::new(opts)
        .run(src, FailingWriter::after(io::ErrorKind::StorageFull, 100))
        .unwrap_err();

    match err {
        ExportError::Write(w) => assert_eq!(w.kind(), io::ErrorKind::StorageFull),
        other => panic!("expected a write error, got {other:?}"),
    }
}

#[test]
fn cancellation_unblocks_both_sides() {
    let cancel = CancelToken::new();
    let coordinator = Coordinator::new(no_header().flush_threshold(4096))
        .with_cancel_token(cancel.clone());

    let handle = thread::spawn(move || {
        coordinator.run(EndlessSource::new(&["a", "b"], b"x"), CountingWriter::default())
    });
    thread::sleep(Duration::from_millis(50));
    cancel.cancel();

    let result = handle.join().expect("export thread panicked");
    assert!(matches!(result, Err(ExportError::Cancelled)));
}

#[test]
fn export_shorthand_uses_options() -> anyhow::Result<()> {
    let src = VecSource::from_strs(&["a", "b"], &[&[Some("1"), Some("2")]]);
    let opts = ExportOptions::new(rawcsv::EncoderConfig::new("\t", "", "\\", "\\r\\n")?);
    let mut out = Vec::new();
    let summary = rawcsv::export(src, &mut out, opts)?;
    assert_eq!(out, b"a\tb\r\n1\t2\r\n");
    assert_eq!(summary.rows, 1);
    Ok(())
}
