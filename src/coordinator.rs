//! Lock-step producer/consumer pipeline.
//!
//! A [`RowSource`] reuses its row storage on every fetch, so row *i* must be
//! completely encoded before row *i+1* is fetched. The [`Coordinator`] runs
//! the source on a producer thread and the encoder on the calling thread, and
//! connects them with two zero-capacity channels:
//!
//! * the **row** channel moves the [`RowBuffer`] from producer to consumer;
//! * the **advance** channel moves it back once the consumer is done with it.
//!
//! Both messages carry the row's sequence number. Because the buffer itself
//! travels with the messages, the producer has nothing to fetch into until the
//! consumer hands it back; the alternation is enforced by ownership rather
//! than by convention.
//!
//! ```text
//! producer                          consumer
//!   next_row(buf)  -- row(0, buf) -->  encode, maybe flush
//!                  <-- advance(0) --
//!   next_row(buf)  -- row(1, buf) -->  ...
//!   end of stream: drop row sender ->  final flush
//! ```
//!
//! Every failure is fatal. A fetch error, a write error, or a cancellation
//! stops both sides; dropping either end of a channel unblocks the other.

use crate::config::ExportOptions;
use crate::encoder::Encoder;
use crate::error::{ExportError, WriteError};
use crate::io::compression::DynWrite;
use crate::row::RowBuffer;
use crate::source::RowSource;
use crossbeam_channel::{Receiver, Sender, TryRecvError, bounded, select};
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Initial content capacity of the shared row buffer.
const ROW_BUFFER_BYTES: usize = 4096;

/// Shared cancellation switch for one or more exports.
///
/// Cancelling closes an internal channel that both pipeline tasks wait on, so
/// a task blocked on either handoff wakes up and exits.
#[derive(Clone, Debug)]
pub struct CancelToken {
    closer: Arc<Mutex<Option<Sender<()>>>>,
    closed: Receiver<()>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = bounded(0);
        Self {
            closer: Arc::new(Mutex::new(Some(tx))),
            closed: rx,
        }
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        let mut closer = self.closer.lock().unwrap_or_else(PoisonError::into_inner);
        if closer.take().is_some() {
            warn!("export cancellation requested");
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self.closed.try_recv(), Err(TryRecvError::Disconnected))
    }

    fn receiver(&self) -> &Receiver<()> {
        &self.closed
    }
}

/// Outcome of a successful export.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportSummary {
    /// Data rows written, excluding the header.
    pub rows: u64,
    /// Whether a header line was written.
    pub header: bool,
    /// Bytes pushed to the destination.
    pub bytes: u64,
    /// Flushes triggered by the flush threshold.
    pub threshold_flushes: u64,
    pub elapsed: Duration,
}

/// One row in flight, tagged with its position in the stream.
struct Handoff {
    seq: u64,
    row: RowBuffer,
}

/// Consumer-side bookkeeping for one export.
#[derive(Debug, Default)]
struct PipelineState {
    lines: u64,
    threshold_flushes: u64,
}

/// Runs exports with one set of [`ExportOptions`].
#[derive(Clone, Debug, Default)]
pub struct Coordinator {
    options: ExportOptions,
    cancel: CancelToken,
}

impl Coordinator {
    #[must_use]
    pub fn new(options: ExportOptions) -> Self {
        Self {
            options,
            cancel: CancelToken::new(),
        }
    }

    /// Use an externally owned cancellation token.
    #[must_use]
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    #[must_use]
    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    /// Export every row of `source` to `dest`.
    ///
    /// The destination is flushed before this returns, on success and on
    /// failure alike.
    ///
    /// # Errors
    /// Returns the first [`ExportError`]; the export is abandoned at that point.
    pub fn run<S, W>(&self, source: S, dest: W) -> Result<ExportSummary, ExportError>
    where
        S: RowSource,
        W: Write,
    {
        let mut encoder = Encoder::new(self.options.encoder.clone(), dest);
        let summary = self.stream(source, &mut encoder)?;
        encoder.finish()?;
        Ok(summary)
    }

    /// Export to an opened output, then finish it.
    ///
    /// Finishing writes a compressed stream's trailer; the export succeeds
    /// only if that last write does too.
    ///
    /// # Errors
    /// Returns the first [`ExportError`]. A failed finish is an
    /// [`ExportError::Write`].
    pub fn run_and_finish<S: RowSource>(
        &self,
        source: S,
        dest: DynWrite,
    ) -> Result<ExportSummary, ExportError> {
        let mut encoder = Encoder::new(self.options.encoder.clone(), dest);
        let summary = self.stream(source, &mut encoder)?;
        encoder.finish()?.finish().map_err(|e| {
            let err = WriteError::from(e);
            warn!(error = %err, "finishing the output failed");
            err
        })?;
        Ok(summary)
    }

    /// Export into memory and return the encoded bytes.
    ///
    /// # Errors
    /// Returns the first [`ExportError`].
    pub fn run_to_vec<S: RowSource>(&self, source: S) -> Result<Vec<u8>, ExportError> {
        let mut encoder = Encoder::new(self.options.encoder.clone(), Vec::new());
        self.stream(source, &mut encoder)?;
        Ok(encoder.finish()?)
    }

    /// Stream `source` through an existing encoder.
    ///
    /// The encoder's configuration is used as is; only the header flag and
    /// flush threshold come from this coordinator's options. The sink is
    /// flushed and probed at the end of a successful stream.
    ///
    /// # Errors
    /// Returns the first [`ExportError`].
    pub fn stream<S, W>(
        &self,
        mut source: S,
        encoder: &mut Encoder<W>,
    ) -> Result<ExportSummary, ExportError>
    where
        S: RowSource,
        W: Write,
    {
        let start = Instant::now();
        let bytes_before = encoder.sink().bytes_written();
        // A source without columns has no header to write.
        let header = self.options.header && !source.columns().is_empty();
        let (row_tx, row_rx) = bounded::<Handoff>(0);
        let (advance_tx, advance_rx) = bounded::<Handoff>(0);

        let (consumed, produced) = thread::scope(|scope| {
            let cancel = &self.cancel;
            let producer =
                scope.spawn(move || produce(&mut source, header, row_tx, advance_rx, cancel));
            let consumed = consume(encoder, &self.options, row_rx, advance_tx, cancel);
            let produced = producer
                .join()
                .unwrap_or(Err(ExportError::ProducerPanicked));
            (consumed, produced)
        });

        let state = match (consumed, produced) {
            (Err(ExportError::Cancelled), Err(e)) | (Err(e), _) | (Ok(_), Err(e)) => {
                warn!(error = %e, "export failed");
                return Err(e);
            }
            (Ok(state), Ok(fetched)) => {
                debug!(fetched, lines = state.lines, "producer and consumer finished");
                state
            }
        };

        let header_written = header && state.lines > 0;
        let summary = ExportSummary {
            rows: state.lines - u64::from(header_written),
            header: header_written,
            bytes: encoder.sink().bytes_written() - bytes_before,
            threshold_flushes: state.threshold_flushes,
            elapsed: start.elapsed(),
        };
        info!(
            rows = summary.rows,
            bytes = summary.bytes,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "export finished"
        );
        Ok(summary)
    }
}

/// Producer side: fetch into the shared buffer, hand it over, wait for it back.
///
/// Returns the number of data rows fetched.
fn produce<S: RowSource>(
    source: &mut S,
    header: bool,
    row_tx: Sender<Handoff>,
    advance_rx: Receiver<Handoff>,
    cancel: &CancelToken,
) -> Result<u64, ExportError> {
    let mut row = RowBuffer::with_capacity(source.columns().len(), ROW_BUFFER_BYTES);
    let mut seq = 0u64;
    let mut fetched = 0u64;

    if header {
        for name in source.columns() {
            row.push_field(name.as_bytes());
        }
        row = match handoff(row, seq, &row_tx, &advance_rx, cancel)? {
            Some(row) => row,
            None => return Ok(fetched),
        };
        seq += 1;
    }

    loop {
        if cancel.is_cancelled() {
            return Err(ExportError::Cancelled);
        }
        if !source.next_row(&mut row)? {
            break;
        }
        fetched += 1;
        row = match handoff(row, seq, &row_tx, &advance_rx, cancel)? {
            Some(row) => row,
            // Consumer hung up; its own result carries the reason.
            None => return Ok(fetched),
        };
        seq += 1;
    }

    drop(row_tx);
    debug!(fetched, "row source exhausted");
    Ok(fetched)
}

/// Send one row and block until the consumer returns the buffer.
///
/// `Ok(None)` means the consumer is gone.
fn handoff(
    row: RowBuffer,
    seq: u64,
    row_tx: &Sender<Handoff>,
    advance_rx: &Receiver<Handoff>,
    cancel: &CancelToken,
) -> Result<Option<RowBuffer>, ExportError> {
    select! {
        send(row_tx, Handoff { seq, row }) -> sent => {
            if sent.is_err() {
                return Ok(None);
            }
        }
        recv(cancel.receiver()) -> _ => return Err(ExportError::Cancelled),
    }
    select! {
        recv(advance_rx) -> ack => match ack {
            Ok(ack) if ack.seq == seq => Ok(Some(ack.row)),
            Ok(ack) => Err(ExportError::ProtocolViolation { expected: seq, got: ack.seq }),
            Err(_) => Ok(None),
        },
        recv(cancel.receiver()) -> _ => Err(ExportError::Cancelled),
    }
}

/// Consumer side: encode each row, apply the flush policy, hand the buffer back.
fn consume<W: Write>(
    encoder: &mut Encoder<W>,
    options: &ExportOptions,
    row_rx: Receiver<Handoff>,
    advance_tx: Sender<Handoff>,
    cancel: &CancelToken,
) -> Result<PipelineState, ExportError> {
    let mut state = PipelineState::default();

    loop {
        let next = select! {
            recv(row_rx) -> msg => msg,
            recv(cancel.receiver()) -> _ => return Err(ExportError::Cancelled),
        };
        // Disconnected: the producer has finished or failed.
        let Ok(Handoff { seq, row }) = next else {
            break;
        };
        if seq != state.lines {
            return Err(ExportError::ProtocolViolation {
                expected: state.lines,
                got: seq,
            });
        }

        let pending = encoder.write_buffer(&row)?;
        state.lines += 1;
        if pending > options.flush_threshold {
            encoder.flush()?;
            encoder.error()?;
            state.threshold_flushes += 1;
        }

        // Every read of `row` is done; the producer may overwrite it now.
        if advance_tx.send(Handoff { seq, row }).is_err() {
            break;
        }
    }

    encoder.flush()?;
    encoder.error()?;
    Ok(state)
}
