//! fer-bench - Main Entry Point
//!
//! Runs the facial expression classification benchmark from the command line.

use clap::Parser;
use fer_bench::cli::{cmd_info, cmd_preview, cmd_run, Cli, Commands, RunArgs};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fer_bench=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Run(args)) => {
            cmd_run(&args)?;
        }
        Some(Commands::Info { data }) => {
            cmd_info(&data)?;
        }
        Some(Commands::Preview { data, output, count }) => {
            cmd_preview(&data, &output, count)?;
        }
        None => {
            // Default: full run from the default dataset paths
            cmd_run(&RunArgs::default())?;
        }
    }

    Ok(())
}
