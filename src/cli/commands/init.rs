//! Init command implementation
//!
//! Generates a starter settings file with one example receiver.

use clap::Args;
use std::fs;
use std::path::Path;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path where to create the settings file
    #[arg(short, long, default_value = "courier.toml")]
    pub output: String,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(output = %self.output, "Initializing settings file");

        if Path::new(&self.output).exists() && !self.force {
            println!("❌ Settings file already exists: {}", self.output);
            println!("   Use --force to overwrite");
            return Ok(2);
        }

        match fs::write(&self.output, STARTER_SETTINGS) {
            Ok(_) => {
                println!("✅ Settings file created: {}", self.output);
                println!();
                println!("Next steps:");
                println!("  1. Edit {} with your receivers", self.output);
                println!("  2. Put transport credentials in the environment");
                println!("     (referenced with ${{VAR}} syntax in the file)");
                println!("  3. Run: courier validate --settings {}", self.output);
                Ok(0)
            }
            Err(e) => {
                println!("❌ Failed to create settings file: {e}");
                Ok(5)
            }
        }
    }
}

const STARTER_SETTINGS: &str = r#"# Courier settings

[dispatch]
# Deliver live batches to receivers still in testing status
deliverToTesting = false

[logging]
level = "info"
local_enabled = false
local_path = "logs"

[[receivers]]
name = "elr"
organization = "pa-phd"
topic = "covid-19"
customerStatus = "testing"
jurisdictionalFilter = ["orEquals(patient.state, PA)"]
qualityFilter = ["hasValidDataFor(patient.state, test_result)"]

[receivers.translation]
type = "HL7"
useBatchHeaders = true
receivingApplicationName = "PA-ELR"

[receivers.timing]
initialTime = "08:00"
numberPerDay = 4
maxReportCount = 500
operation = "MERGE"
timezone = "EASTERN"

[receivers.transport]
type = "SFTP"
host = "sftp.example.gov"
port = 22
filePath = "./upload"
username = "courier"
password = "${COURIER_SFTP_PASSWORD}"
"#;
