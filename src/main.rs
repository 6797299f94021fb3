use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use xc::cli::Cli;
use xc::config::{default_config_path, read_config};
use xc::inventory::Backend;
use xc::term;

/// Interactive multi-host command executor over ssh/scp.
#[derive(Parser)]
#[command(name = "xc", version, about)]
struct Args {
    /// Path to the config file (default: ~/.xc.conf)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run a single command and exit instead of entering the shell
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.unwrap_or_else(default_config_path);
    let cfg = read_config(&config_path)
        .with_context(|| format!("reading config {}", config_path.display()))?;

    init_logging(cfg.log_file.as_deref());

    let rt = tokio::runtime::Runtime::new()?;

    let mut backend = Backend::from_config(&cfg);
    if let Err(err) = rt.block_on(backend.load()) {
        term::error(&format!("Error loading inventory: {err}\n"));
    }

    let mut cli = Cli::new(cfg, backend, rt)?;
    if args.command.is_empty() {
        cli.run();
    } else {
        cli.run_command_line(&args.command.join(" "));
    }
    cli.finalize();

    Ok(())
}

/// Engine debug logging goes to the configured log file; without one,
/// logging stays disabled. The output-mirror file set up via the
/// `output` command is a separate facility.
fn init_logging(log_file: Option<&Path>) {
    let Some(path) = log_file else { return };
    let file = match std::fs::OpenOptions::new().append(true).create(true).open(path) {
        Ok(file) => file,
        Err(err) => {
            term::error(&format!("Error initializing logger: {err}\n"));
            return;
        }
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("xc=debug")),
        )
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .init();
}
