// Courier - health-data report routing engine
// Copyright (c) 2025 Courier Contributors
// Licensed under the MIT License

use clap::Parser;
use courier::cli::{Cli, Commands};
use courier::logging::init_logging;
use courier::settings::LoggingSettings;
use std::process;

#[tokio::main]
async fn main() {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Console-only logging for CLI runs
    let log_level = cli.log_level.as_deref().unwrap_or("info");
    let logging_settings = LoggingSettings {
        level: log_level.to_string(),
        local_enabled: false,
        ..Default::default()
    };
    let _guard = match init_logging(log_level, &logging_settings) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            process::exit(5);
        }
    };

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "Courier - health-data report routing engine"
    );

    let exit_code = match execute_command(&cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "Command execution failed");
            eprintln!("Error: {e}");
            5 // Fatal error exit code
        }
    };

    process::exit(exit_code);
}

/// Execute the CLI command
async fn execute_command(cli: &Cli) -> anyhow::Result<i32> {
    match &cli.command {
        Commands::Validate(args) => args.execute(&cli.settings).await,
        Commands::Init(args) => args.execute().await,
    }
}
