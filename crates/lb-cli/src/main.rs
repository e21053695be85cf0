//! CLI entry point for the listbeat collector.
//!
//! This binary polls directory trees for `list` and `LOG` marker directories
//! and ships every new or modified `.list` / `.log` file as a JSON event.
//!
//! # Usage
//!
//! ```bash
//! listbeat [OPTIONS] <COMMAND>
//!
//! # Collect every 10 minutes until Ctrl-C or SIGTERM
//! listbeat --root /data --period 600 run
//!
//! # One full-scan cycle, then print what it did
//! listbeat --config listbeat.json once --report
//!
//! # Show what has been collected from LOG directories
//! listbeat --config listbeat.json registrar --kind log
//! ```
//!
//! Events go to stdout (or `--output`); logs always go to stderr. The
//! `once --report` JSON goes to stdout only when events go to a file.

#![deny(clippy::all)]
#![warn(missing_docs)]

use std::io::Write;

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand, ValueEnum};
use lb_agent::{CycleReport, Scheduler, open_sink};
use lb_core::{Config, MarkerKind};
use lb_scanner::RegistrarStore;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// CLI ARGUMENT TYPES
// =============================================================================

/// Polling collector for `.list` and `.log` files in marker directories.
#[derive(Parser)]
#[command(name = "listbeat", version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Command to execute.
    #[command(subcommand)]
    command: Commands,

    /// JSON configuration file.
    ///
    /// Every option has a default; flags below override the file.
    #[arg(short, long, global = true, env = "LISTBEAT_CONFIG")]
    config: Option<Utf8PathBuf>,

    /// Directory searched for marker directories (repeatable).
    ///
    /// Replaces the roots from the configuration file.
    #[arg(short, long = "root", global = true)]
    roots: Vec<Utf8PathBuf>,

    /// Seconds between collection cycles.
    #[arg(long, global = true, env = "LISTBEAT_PERIOD")]
    period: Option<u64>,

    /// Number of cycles between two full directory walks.
    #[arg(long, global = true, env = "LISTBEAT_FULL_RESCAN_EVERY")]
    full_rescan_every: Option<u32>,

    /// File to append events to (defaults to stdout).
    #[arg(short, long, global = true, env = "LISTBEAT_OUTPUT")]
    output: Option<Utf8PathBuf>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Collect on a fixed period until interrupted.
    Run,

    /// Run a single full-scan cycle and exit.
    Once {
        /// Print the cycle report as JSON.
        ///
        /// Written to stdout when `--output` is set, otherwise to stderr so
        /// it never mixes with event lines.
        #[arg(long)]
        report: bool,
    },

    /// Print the contents of a registrar file.
    Registrar {
        /// Which registrar to show.
        #[arg(short, long, value_enum, default_value_t = KindArg::List)]
        kind: KindArg,
    },
}

/// Marker kind selector.
#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    /// Files under `list` directories.
    List,
    /// Files under `LOG` directories.
    Log,
}

impl From<KindArg> for MarkerKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::List => Self::List,
            KindArg::Log => Self::Log,
        }
    }
}

// =============================================================================
// INITIALIZATION FUNCTIONS
// =============================================================================

/// Initializes the tracing subscriber for logging.
///
/// Respects the `RUST_LOG` environment variable if set. Otherwise, uses
/// `debug` level if `--verbose` is set, or `info` level by default. Logs are
/// written to stderr so they never mix with events on stdout.
fn init_tracing(verbose: bool, no_color: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose { "debug" } else { "info" };
        EnvFilter::new(format!("{level},mio=warn"))
    });

    // Check if colors should be disabled (flag or NO_COLOR env var)
    let use_ansi = !no_color && std::env::var("NO_COLOR").is_err();

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(use_ansi)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

/// Builds a [`Config`] from the configuration file and CLI overrides.
///
/// # Errors
///
/// Returns an error if the file cannot be loaded, an override is invalid,
/// or no scan root is configured when `require_roots` is set.
fn build_config(cli: &Cli, require_roots: bool) -> color_eyre::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    if !cli.roots.is_empty() {
        config.scan.roots.clone_from(&cli.roots);
    }
    if let Some(period) = cli.period {
        config.schedule.period_secs = period;
    }
    if let Some(every) = cli.full_rescan_every {
        config.schedule.full_rescan_every = every;
    }
    if let Some(output) = &cli.output {
        config.output.path = Some(output.clone());
    }
    config.validate()?;

    if require_roots && config.scan.roots.is_empty() {
        return Err(color_eyre::eyre::eyre!(
            "No scan roots configured. Pass --root or set scan.roots in the config file."
        ));
    }

    Ok(config)
}

// =============================================================================
// COMMAND IMPLEMENTATIONS
// =============================================================================

/// Runs the collection loop until Ctrl-C or SIGTERM.
///
/// # Errors
///
/// Returns an error if the output cannot be opened or a cycle panics.
async fn run_agent(config: Config) -> color_eyre::Result<()> {
    info!(roots = ?config.scan.roots, period_secs = config.schedule.period_secs, "Starting collector");

    let sink = open_sink(&config.output)?;
    let scheduler = Scheduler::new(config, sink)?;

    let stop = CancellationToken::new();
    tokio::spawn(cancel_on_signal(stop.clone()));

    let summary = scheduler.run(stop).await?;
    info!(
        cycles = summary.cycles,
        collected = summary.collected,
        failures = summary.failures,
        flush_failures = summary.flush_failures,
        "Collector stopped"
    );
    Ok(())
}

/// Cancels `stop` on the first Ctrl-C or SIGTERM.
async fn cancel_on_signal(stop: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("Received Ctrl-C, shutting down"),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Cannot listen for SIGTERM, relying on Ctrl-C");
                let _ = tokio::signal::ctrl_c().await;
                info!("Received Ctrl-C, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received Ctrl-C, shutting down");
    }

    stop.cancel();
}

/// Runs exactly one cycle (always a full scan) and shuts down.
///
/// # Errors
///
/// Returns an error if the output cannot be opened or the report cannot be
/// written.
fn run_once(config: Config, print_report: bool) -> color_eyre::Result<()> {
    info!(roots = ?config.scan.roots, "Running single cycle");

    let events_on_stdout = config.output.path.is_none();
    let sink = open_sink(&config.output)?;
    let mut scheduler = Scheduler::new(config, sink)?;
    let report = scheduler.run_cycle();
    scheduler.shutdown();

    if print_report {
        if events_on_stdout {
            write_report(std::io::stderr().lock(), &report)?;
        } else {
            write_report(std::io::stdout().lock(), &report)?;
        }
    }

    Ok(())
}

/// Writes `report` as pretty JSON followed by a newline.
fn write_report<W: Write>(mut writer: W, report: &CycleReport) -> color_eyre::Result<()> {
    serde_json::to_writer_pretty(&mut writer, report)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

/// Prints one registrar as pretty JSON.
///
/// # Errors
///
/// Returns an error if stdout cannot be written.
fn show_registrar(config: &Config, kind: MarkerKind) -> color_eyre::Result<()> {
    let path = match kind {
        MarkerKind::List => config.registrar.list_file(),
        MarkerKind::Log => config.registrar.log_file(),
    };
    let store = RegistrarStore::load(path);
    info!(kind = %kind, path = %store.path(), entries = store.len(), "Registrar loaded");

    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    serde_json::to_writer_pretty(&mut handle, &store.snapshot())?;
    writeln!(handle)?;
    Ok(())
}

// =============================================================================
// MAIN ENTRY POINT
// =============================================================================

/// Application entry point.
#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    // 1. Install color-eyre FIRST (before any potential panics)
    color_eyre::install()?;

    // 2. Parse CLI arguments
    let cli = Cli::parse();

    // 3. Initialize tracing (handles --no-color for log output)
    init_tracing(cli.verbose, cli.no_color);

    // 4. Route to appropriate command
    match &cli.command {
        Commands::Run => {
            let config = build_config(&cli, true)?;
            run_agent(config).await
        }
        Commands::Once { report } => {
            let config = build_config(&cli, true)?;
            run_once(config, *report)
        }
        Commands::Registrar { kind } => {
            let config = build_config(&cli, false)?;
            show_registrar(&config, (*kind).into())
        }
    }
}
