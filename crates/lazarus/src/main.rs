//! Lazarus CLI - disaster recovery and rollback orchestration
//!
//! This is the main entry point for the Lazarus command-line interface.

mod cli;
mod commands;
mod output;
mod runtime;

use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize rustls crypto provider (required for rustls 0.23+)
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet);

    let config = cli.config.as_deref();
    let result = match cli.command {
        Commands::Status(args) => commands::status::run(args, config).await,
        Commands::CreateRecoveryPoint(args) => commands::recovery_point::run(args, config).await,
        Commands::Rollback(args) => commands::rollback::run(args, config).await,
        Commands::DisasterRecovery(args) => commands::disaster::run(args, config).await,
        Commands::ListRecoveryPoints(args) => commands::list::run(args, config).await,
        Commands::Cleanup(args) => commands::cleanup::run(args, config).await,
        Commands::Health(args) => commands::health::run(args, config).await,
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            output::error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

/// Initialize tracing with appropriate verbosity
fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    // Logs go to stderr so --json output on stdout stays parseable
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}
