//! # RPCS3 Log Doctor CLI (`logdoc`)
//!
//! Diagnoses RPCS3 emulator logs from the command line: plain `.log` files,
//! or `.gz`, `.zip`, `.7z` and `.rar` archives holding one.
//!
//! ## Usage
//!
//! ```bash
//! logdoc --config ./config/logdoc.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `logdoc diagnose <PATH>...` | Diagnose log files, or every file under a directory |
//! | `logdoc completions <SHELL>` | Print shell completions |
//!
//! ## Examples
//!
//! ```bash
//! # Text report for one upload
//! logdoc diagnose RPCS3.log.gz
//!
//! # One JSON object per file, progress as JSON lines on stderr
//! logdoc diagnose ./uploads --json --progress json
//!
//! # Show extractor and rule logging
//! RUST_LOG=log_doctor=debug logdoc diagnose RPCS3.log
//! ```

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use log_doctor::config;
use log_doctor::diagnose_cmd::{self, DiagnoseOptions};
use log_doctor::progress::ProgressMode;

/// RPCS3 Log Doctor: explains what is wrong with an emulator log.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. A missing file means built-in defaults.
#[derive(Parser)]
#[command(
    name = "logdoc",
    about = "Diagnose RPCS3 emulator logs",
    version,
    long_about = "Reads RPCS3 logs (plain or inside gz/zip/7z/rar archives), extracts the \
    build, hardware and settings details, and prints ranked notes about known problems."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/logdoc.toml`. Size limits, pipeline slots,
    /// freshness thresholds and piracy triggers are read from this file.
    #[arg(long, global = true, default_value = "./config/logdoc.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Diagnose one or more logs.
    ///
    /// Each path is a log, an archive containing a log, or a directory
    /// whose files are all diagnosed. One report per file goes to stdout.
    Diagnose {
        /// Files or directories to diagnose.
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Print one JSON object per file instead of text.
        #[arg(long)]
        json: bool,

        /// Progress on stderr: `human`, `json` or `off`.
        /// Defaults to `human` when stderr is a terminal, otherwise `off`.
        #[arg(long)]
        progress: Option<ProgressMode>,
    },

    /// Print shell completions to stdout.
    Completions {
        shell: clap_complete::Shell,
    },
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Completions need no config
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "logdoc", &mut std::io::stdout());
        return Ok(());
    }

    init_tracing();
    let cfg = config::load_config_or_default(&cli.config)
        .with_context(|| format!("Failed to load config {}", cli.config.display()))?;

    match cli.command {
        Commands::Diagnose {
            paths,
            json,
            progress,
        } => {
            let options = DiagnoseOptions {
                json,
                progress: progress.unwrap_or_else(ProgressMode::default_for_tty),
            };
            diagnose_cmd::run_diagnose(&cfg, &paths, &options).await?;
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}
