//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for Courier using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// Courier - health-data report routing engine
#[derive(Parser, Debug)]
#[command(name = "courier")]
#[command(version, about, long_about = None)]
#[command(author = "Courier Contributors")]
pub struct Cli {
    /// Path to settings file
    #[arg(short, long, default_value = "courier.toml", env = "COURIER_SETTINGS")]
    pub settings: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "COURIER_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate the settings file and optionally a schema directory
    Validate(commands::validate::ValidateArgs),

    /// Initialize a starter settings file
    Init(commands::init::InitArgs),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_validate() {
        let cli = Cli::parse_from(["courier", "validate"]);
        assert_eq!(cli.settings, "courier.toml");
        assert!(matches!(cli.command, Commands::Validate(_)));
    }

    #[test]
    fn test_cli_parse_with_settings() {
        let cli = Cli::parse_from(["courier", "--settings", "custom.toml", "validate"]);
        assert_eq!(cli.settings, "custom.toml");
    }

    #[test]
    fn test_cli_parse_init() {
        let cli = Cli::parse_from(["courier", "init", "--force"]);
        match cli.command {
            Commands::Init(args) => assert!(args.force),
            other => panic!("expected init, got {other:?}"),
        }
    }
}
