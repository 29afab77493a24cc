//! Segctl CLI - run the segsync synchronization demos.
//!
//! Parses command-line arguments, layers them over the configuration file,
//! and dispatches to one of the demo commands. Reports go to stdout, logs to
//! stderr. A run that breaks an invariant exits non-zero.

mod commands;
mod config;
mod error;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use segsync::{CounterMode, RaceWindow};
use segsync_drv::WorkRange;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::common::{parse_race_window, RunContext, RunOptions};
use commands::{run_barrier, run_counter, run_rwlock, BarrierArgs, CounterArgs, RwLockArgs};
use config::Config;
use error::{CtlError, Result};

/// Segctl - shared-segment synchronization demos
///
/// Runs an atomic counter, a writer-priority reader-writer lock or a
/// reusable barrier on real threads and checks the results.
#[derive(Parser, Debug)]
#[command(name = "segctl")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Shared-segment synchronization demos", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true, env = "SEGCTL_VERBOSE")]
    verbose: bool,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "SEGCTL_CONFIG")]
    config: Option<PathBuf>,

    /// Disable color output
    #[arg(long, global = true, env = "SEGCTL_NO_COLOR")]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available demos.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Race workers on a regular and an atomic counter
    ///
    /// The atomic counter must come out exact; the regular one shows how
    /// many updates a load-then-store increment loses.
    Counter(CounterCommand),

    /// Readers and writers sharing one value under the reader-writer lock
    Rwlock(RwLockCommand),

    /// Participants doing random work between reusable barrier phases
    Barrier(BarrierCommand),
}

/// Arguments for the counter subcommand.
#[derive(Parser, Debug)]
struct CounterCommand {
    /// Number of worker threads (default: one per core)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Increments per worker per counter
    #[arg(short, long)]
    increments: Option<u32>,

    /// Counter(s) to run: regular, atomic or both
    #[arg(short, long)]
    mode: Option<CounterMode>,

    /// Gap between load and store of a regular increment: none, yield, spin:<n>
    #[arg(long, value_parser = parse_race_window)]
    race_window: Option<RaceWindow>,

    #[command(flatten)]
    run: RunOptions,
}

/// Arguments for the rwlock subcommand.
#[derive(Parser, Debug)]
struct RwLockCommand {
    /// Number of reader threads
    #[arg(short, long)]
    readers: Option<usize>,

    /// Number of writer threads
    #[arg(short, long)]
    writers: Option<usize>,

    /// Reads per reader
    #[arg(long)]
    reads: Option<u32>,

    /// Writes per writer
    #[arg(long)]
    writes: Option<u32>,

    /// Time each read holds the lock, microseconds
    #[arg(long)]
    read_hold_us: Option<u64>,

    /// Time each write holds the lock, microseconds
    #[arg(long)]
    write_hold_us: Option<u64>,

    #[command(flatten)]
    run: RunOptions,
}

/// Arguments for the barrier subcommand.
#[derive(Parser, Debug)]
struct BarrierCommand {
    /// Number of participants
    #[arg(short, long)]
    workers: Option<usize>,

    /// Number of phases
    #[arg(short, long)]
    phases: Option<u32>,

    /// Minimum work per phase, milliseconds
    #[arg(long)]
    work_ms: Option<u64>,

    /// Random extra work per phase, milliseconds
    #[arg(long)]
    work_variance_ms: Option<u64>,

    #[command(flatten)]
    run: RunOptions,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.no_color)?;

    let config = load_config(cli.config.as_deref())?;

    execute_command(cli.command, cli.verbose, config)
}

/// Initialize tracing on stderr; `log` records from the libraries are
/// bridged in by `try_init`.
fn init_logging(verbose: bool, no_color: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    let subscriber = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(!no_color)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(verbose);

    tracing_subscriber::registry()
        .with(filter)
        .with(subscriber)
        .try_init()
        .map_err(|e| CtlError::Config(format!("Failed to initialize logging: {}", e)))?;

    Ok(())
}

fn load_config(config_path: Option<&std::path::Path>) -> Result<Config> {
    match config_path {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    }
}

fn execute_command(command: Commands, verbose: bool, config: Config) -> Result<()> {
    match command {
        Commands::Counter(args) => execute_counter(args, verbose, config),
        Commands::Rwlock(args) => execute_rwlock(args, verbose, config),
        Commands::Barrier(args) => execute_barrier(args, verbose, config),
    }
}

fn context(config: &Config, run: RunOptions, verbose: bool) -> RunContext {
    RunContext {
        sync: config.sync.resolve(),
        options: run,
        verbose,
    }
}

fn execute_counter(args: CounterCommand, verbose: bool, config: Config) -> Result<()> {
    let mut params = config.counter.params();
    if let Some(workers) = args.workers {
        params.workers = workers;
    }
    if let Some(increments) = args.increments {
        params.increments = increments;
    }
    if let Some(mode) = args.mode {
        params.mode = mode;
    }
    if let Some(window) = args.race_window {
        params.race_window = window;
    }

    run_counter(CounterArgs {
        params,
        context: context(&config, args.run, verbose),
    })
}

fn execute_rwlock(args: RwLockCommand, verbose: bool, config: Config) -> Result<()> {
    let mut params = config.rwlock.params();
    if let Some(readers) = args.readers {
        params.readers = readers;
    }
    if let Some(writers) = args.writers {
        params.writers = writers;
    }
    if let Some(reads) = args.reads {
        params.reads_per_reader = reads;
    }
    if let Some(writes) = args.writes {
        params.writes_per_writer = writes;
    }
    if let Some(us) = args.read_hold_us {
        params.read_hold = WorkRange::fixed(Duration::from_micros(us));
    }
    if let Some(us) = args.write_hold_us {
        params.write_hold = WorkRange::fixed(Duration::from_micros(us));
    }

    run_rwlock(RwLockArgs {
        params,
        context: context(&config, args.run, verbose),
    })
}

fn execute_barrier(args: BarrierCommand, verbose: bool, config: Config) -> Result<()> {
    let mut barrier = config.barrier.clone();
    if let Some(workers) = args.workers {
        barrier.workers = workers;
    }
    if let Some(phases) = args.phases {
        barrier.phases = phases;
    }
    if let Some(ms) = args.work_ms {
        barrier.work_ms = ms;
    }
    if let Some(ms) = args.work_variance_ms {
        barrier.work_variance_ms = ms;
    }

    run_barrier(BarrierArgs {
        params: barrier.params(),
        context: context(&config, args.run, verbose),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use segsync::WaitStrategy;

    #[test]
    fn test_cli_parse_counter() {
        let cli = Cli::parse_from(["segctl", "counter"]);
        assert!(matches!(cli.command, Commands::Counter(_)));
    }

    #[test]
    fn test_cli_parse_counter_options() {
        let cli = Cli::parse_from([
            "segctl",
            "counter",
            "--workers",
            "6",
            "--mode",
            "regular",
            "--race-window",
            "spin:25",
        ]);
        if let Commands::Counter(args) = cli.command {
            assert_eq!(args.workers, Some(6));
            assert_eq!(args.mode, Some(CounterMode::Regular));
            assert_eq!(args.race_window, Some(RaceWindow::Spin(25)));
        } else {
            panic!("Expected Counter command");
        }
    }

    #[test]
    fn test_cli_parse_rwlock() {
        let cli = Cli::parse_from(["segctl", "rwlock", "--readers", "8", "--writes", "10"]);
        if let Commands::Rwlock(args) = cli.command {
            assert_eq!(args.readers, Some(8));
            assert_eq!(args.writes, Some(10));
            assert_eq!(args.writers, None);
        } else {
            panic!("Expected Rwlock command");
        }
    }

    #[test]
    fn test_cli_parse_barrier_json() {
        let cli = Cli::parse_from(["segctl", "barrier", "--phases", "3", "--json"]);
        if let Commands::Barrier(args) = cli.command {
            assert_eq!(args.phases, Some(3));
            assert!(args.run.json);
        } else {
            panic!("Expected Barrier command");
        }
    }

    #[test]
    fn test_cli_parse_wait_strategy() {
        let cli = Cli::parse_from(["segctl", "barrier", "--wait-strategy", "spin"]);
        if let Commands::Barrier(args) = cli.command {
            assert_eq!(args.run.wait_strategy, Some(WaitStrategy::Spin));
        } else {
            panic!("Expected Barrier command");
        }
    }

    #[test]
    fn test_cli_rejects_unknown_strategy() {
        let result = Cli::try_parse_from(["segctl", "rwlock", "--wait-strategy", "nap"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_parse_global_flags() {
        let cli = Cli::parse_from([
            "segctl",
            "--verbose",
            "--no-color",
            "--config",
            "/path/to/segctl.toml",
            "counter",
        ]);
        assert!(cli.verbose);
        assert!(cli.no_color);
        assert_eq!(cli.config, Some(PathBuf::from("/path/to/segctl.toml")));
    }
}
