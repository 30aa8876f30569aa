use anyhow::Context;
use clap::{Parser, Subcommand};
use conduit_core::ConduitConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::audit::AuditArgs;

#[derive(Parser, Debug)]
#[command(name = "conduit", version, about = "Conduit document ingest service")]
struct Cli {
    /// Config file. Defaults to $CONDUIT_CONFIG, then ./conduit.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service until Ctrl-C.
    Serve,

    /// Ingest one file in-process and print the JSON response.
    Ingest {
        /// Document to ingest; its file name is passed to the classifier
        file: PathBuf,
    },

    /// Print events from the configured event log.
    Audit(AuditArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = ConduitConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    init_tracing(&config.server.log_level);

    match cli.cmd {
        Command::Serve => commands::serve::run(&config).await?,
        Command::Ingest { file } => commands::ingest::run(&config, &file).await?,
        Command::Audit(args) => commands::audit::run(&config, &args).await?,
    }

    Ok(())
}

/// Logs go to stderr so command output on stdout stays machine-readable.
fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
