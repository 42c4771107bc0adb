use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use conv_harness::config::ConfigOverrides;
use conv_harness::interrupt::InterruptFlag;
use tracing::warn;

mod commands;

/// Top-level CLI argument parser for the `convh` command
#[derive(Parser)]
#[command(
    name = "convh",
    about = "Differential test harness and benchmark reports for a 2D convolution program",
    version
)]
struct Cli {
    /// Log level when RUST_LOG is unset (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands for the `convh` CLI
#[derive(Subcommand)]
enum Commands {
    /// Run the scenario battery against the convolution executable
    Run {
        /// Path to the convolution executable
        #[arg(long)]
        conv_path: Option<PathBuf>,
        /// Keep the data directory and list its files after the run
        #[arg(long)]
        keep_data: bool,
        /// Directory for fixtures, outputs and metadata dumps
        #[arg(long)]
        data_dir: Option<PathBuf>,
        /// Per-invocation timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
        /// YAML config file (CLI flags take precedence)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Run only the named scenario (repeatable)
        #[arg(long)]
        only: Vec<String>,
        /// Write the JSON test report to this path
        #[arg(long)]
        report: Option<PathBuf>,
        /// List the scenario battery and exit
        #[arg(long)]
        list: bool,
    },
    /// Aggregate `*threads.log` benchmark files into a speedup report
    Perf {
        /// Directory containing benchmark logs
        #[arg(default_value = ".")]
        dir: PathBuf,
        /// Output format: text (default), json, markdown, or chart
        #[arg(long, default_value = "text")]
        format: String,
    },
}

/// Dispatch a parsed CLI subcommand to its handler
fn run_command(
    command: Commands,
    interrupt: &InterruptFlag,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Run {
            conv_path,
            keep_data,
            data_dir,
            timeout,
            config,
            only,
            report,
            list,
        } => {
            if list {
                commands::run::list();
                return Ok(());
            }
            let args = commands::run::RunArgs {
                overrides: ConfigOverrides {
                    conv_path,
                    data_dir,
                    timeout_secs: timeout,
                    keep_data,
                },
                config,
                only,
                report,
            };
            commands::run::run(&args, interrupt.clone())
        }
        Commands::Perf { dir, format } => match commands::perf::PerfFormat::from_str(&format) {
            Ok(fmt) => commands::perf::run(&dir, fmt),
            Err(e) => Err(e.into()),
        },
    }
}

fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Entry point: parse CLI arguments and run the selected subcommand
fn main() {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let interrupt = InterruptFlag::new();
    let handler_flag = interrupt.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_flag.trigger()) {
        warn!(error = %e, "could not install Ctrl-C handler");
    }

    if let Err(e) = run_command(cli.command, &interrupt) {
        eprintln!("error: {e}");
        process::exit(1);
    }
}
