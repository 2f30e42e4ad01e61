//! Validate command implementation
//!
//! Validates the settings file and, when a schema directory is given,
//! every schema in it. All problems are printed together so an
//! administrator can fix a whole settings file in one pass.

use crate::schema::{Schema, SchemaRegistry};
use crate::settings::load_settings;
use clap::Args;
use std::path::PathBuf;

/// Arguments for the validate command
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Directory of schema JSON files to load and validate
    #[arg(long)]
    pub schemas: Option<PathBuf>,
}

impl ValidateArgs {
    /// Execute the validate command
    pub async fn execute(&self, settings_path: &str) -> anyhow::Result<i32> {
        tracing::info!(settings_path = %settings_path, "Validating settings");

        println!("Validating settings file: {settings_path}");

        let settings = match load_settings(settings_path) {
            Ok(s) => {
                println!("✅ Settings are valid");
                s
            }
            Err(e) => {
                println!("❌ Settings validation failed");
                println!("   {e}");
                return Ok(2); // Configuration error exit code
            }
        };

        println!();
        println!("Settings Summary:");
        println!("  Receivers: {}", settings.receivers.len());
        for receiver in &settings.receivers {
            println!(
                "    {} [{}] topic={} translation={} transport={}",
                receiver.full_name(),
                format!("{:?}", receiver.customer_status).to_lowercase(),
                receiver.topic,
                receiver.translation.type_name(),
                receiver
                    .transport
                    .as_ref()
                    .map(|t| t.type_name())
                    .unwrap_or("none"),
            );
        }

        if let Some(schema_dir) = &self.schemas {
            println!();
            println!("Validating schemas in {}", schema_dir.display());
            let schemas = load_schema_dir(schema_dir)?;
            let count = schemas.len();

            let registry = SchemaRegistry::default();
            match registry.reload(schemas) {
                Ok(version) => {
                    println!("✅ {count} schema(s) valid (registry version {version})");
                }
                Err(e) => {
                    println!("❌ Schema validation failed");
                    println!("   {e}");
                    return Ok(2);
                }
            }
        }

        Ok(0)
    }
}

/// Loads every `.json` schema file in a directory
fn load_schema_dir(dir: &std::path::Path) -> anyhow::Result<Vec<Schema>> {
    let mut schemas = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            let contents = std::fs::read_to_string(&path)?;
            let schema: Schema = serde_json::from_str(&contents)
                .map_err(|e| anyhow::anyhow!("{}: {e}", path.display()))?;
            schemas.push(schema);
        }
    }
    Ok(schemas)
}
