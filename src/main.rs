use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use rawcsv::io::{InputFormat, InputSpec, open_output, open_source};
use rawcsv::shutdown::{InterruptAction, InterruptPolicy};
use rawcsv::{Coordinator, ExportError, ExportMetrics, RowSource, Settings};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Exit status after an interrupt, as for a shell job killed by SIGINT.
const EXIT_INTERRUPTED: u8 = 130;

/// Export rows as MySQL-style delimited text.
///
/// Rows are read from a CSV or JSON Lines file (or standard input) and written
/// to standard output unless --file is given.
#[derive(Parser, Debug)]
#[command(name = "rawcsv", version = rawcsv::VERSION, about)]
struct Cli {
    /// Field delimiter (one character)
    #[arg(short = 'd', long)]
    delimiter: Option<String>,

    /// Quote character; an empty string disables quoting
    #[arg(short = 'q', long)]
    quote: Option<String>,

    /// Escape character (one character)
    #[arg(short = 'e', long)]
    escape: Option<String>,

    /// Line terminator; `\n`, `\r` and `\\` are decoded, so `\r\n` is CRLF
    #[arg(short = 't', long)]
    terminator: Option<String>,

    /// Write column names as the first line
    #[arg(long, value_name = "BOOL", num_args = 0..=1, default_missing_value = "true")]
    header: Option<bool>,

    /// Flush once more than this many bytes are buffered
    #[arg(long, value_name = "BYTES")]
    flush_size: Option<usize>,

    /// JSON settings file; command-line flags override it
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Input file; standard input when omitted
    #[arg(short = 'i', long, value_name = "PATH")]
    input: Option<PathBuf>,

    /// Input format (csv or jsonl); guessed from the input name otherwise
    #[arg(long)]
    format: Option<InputFormat>,

    /// CSV value read as null, for example `\N`
    #[arg(long, value_name = "TOKEN")]
    null_token: Option<String>,

    /// Output file; standard output when omitted
    #[arg(short = 'f', long, value_name = "PATH")]
    file: Option<PathBuf>,

    /// Overwrite an existing output file
    #[arg(long)]
    force: bool,

    /// Save export metrics as JSON
    #[arg(long, value_name = "PATH")]
    metrics: Option<PathBuf>,

    /// More logging on stderr (-v info, -vv debug); RUST_LOG overrides
    #[arg(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn settings(&self) -> Settings {
        Settings {
            delimiter: self.delimiter.clone(),
            quote: self.quote.clone(),
            escape: self.escape.clone(),
            terminator: self.terminator.clone(),
            header: self.header,
            flush_threshold: self.flush_size,
            null_token: self.null_token.clone(),
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) if matches!(err.downcast_ref::<ExportError>(), Some(ExportError::Cancelled)) => {
            eprintln!("rawcsv: export aborted");
            ExitCode::from(EXIT_INTERRUPTED)
        }
        Err(err) => {
            eprintln!("rawcsv: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let file_settings = match &cli.config {
        Some(path) => Settings::from_json_file(path)?,
        None => Settings::default(),
    };
    let settings = file_settings.merge(cli.settings());
    let null_token = settings.null_token.clone();
    let options = settings.into_options().context("invalid export settings")?;

    let source = open_source(&InputSpec {
        path: cli.input.as_deref(),
        format: cli.format,
        null_token: null_token.as_deref(),
    })?;
    let dest = open_output(cli.file.as_deref(), cli.force)?;
    info!(columns = source.columns().len(), "starting export");

    let coordinator = Coordinator::new(options);
    let cancel = coordinator.cancel_token();
    let mut export =
        tokio::task::spawn_blocking(move || coordinator.run_and_finish(source, dest));

    let mut policy = InterruptPolicy::default();
    let result = loop {
        tokio::select! {
            joined = &mut export => break joined.context("export task failed")?,
            signal = tokio::signal::ctrl_c() => {
                signal.context("listen for interrupt")?;
                match policy.on_interrupt(Instant::now()) {
                    InterruptAction::Warn => warn!(
                        "interrupt received; send again within {}s to abort",
                        policy.window().as_secs()
                    ),
                    InterruptAction::Abort if cancel.is_cancelled() => {
                        // The source is stuck in a blocking read and cannot see
                        // the cancellation.
                        error!("export did not stop, exiting");
                        std::process::exit(i32::from(EXIT_INTERRUPTED));
                    }
                    InterruptAction::Abort => {
                        error!("aborting export");
                        cancel.cancel();
                    }
                }
            }
        }
    };
    let summary = result?;

    let metrics = ExportMetrics::from_summary(&summary)
        .with_input(describe(cli.input.as_ref(), "stdin"))
        .with_output(describe(cli.file.as_ref(), "stdout"));
    if let Some(path) = &cli.metrics {
        metrics
            .save_to_file(path)
            .with_context(|| format!("save metrics to {}", path.display()))?;
    }
    if cli.verbose > 0 {
        metrics.print();
    }
    Ok(())
}

fn describe(path: Option<&PathBuf>, fallback: &str) -> String {
    path.map_or_else(|| fallback.to_string(), |p| p.display().to_string())
}
