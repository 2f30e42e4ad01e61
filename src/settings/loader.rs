//! Settings loader with TOML parsing and environment variable overrides
//!
//! The settings file carries engine-level sections (dispatch policy,
//! logging) and the receiver list. Loading performs `${VAR}`
//! substitution so credentials stay out of the file, applies `COURIER_*`
//! overrides, and validates everything before returning.

use crate::domain::{CourierError, Result};
use crate::settings::receiver::ReceiverSettings;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Policy knobs applied at the dispatch boundary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchSettings {
    /// Deliver live batches to `customerStatus = testing` receivers.
    /// Inactive receivers never get deliveries regardless.
    #[serde(default)]
    pub deliver_to_testing: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_level")]
    pub level: String,

    /// Write JSON logs to rotating files
    #[serde(default)]
    pub local_enabled: bool,

    /// Directory for rotating log files
    #[serde(default = "default_local_path")]
    pub local_path: String,

    /// Rotation cadence: daily or hourly
    #[serde(default = "default_rotation")]
    pub local_rotation: String,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_local_path() -> String {
    "logs".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            local_enabled: false,
            local_path: default_local_path(),
            local_rotation: default_rotation(),
        }
    }
}

impl LoggingSettings {
    fn validate(&self) -> std::result::Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.level.as_str()) {
            return Err(format!(
                "Invalid logging level '{}'. Must be one of: {}",
                self.level,
                valid_levels.join(", ")
            ));
        }
        Ok(())
    }
}

/// Root settings structure, mapping to the TOML file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourierSettings {
    #[serde(default)]
    pub dispatch: DispatchSettings,

    #[serde(default)]
    pub logging: LoggingSettings,

    #[serde(default)]
    pub receivers: Vec<ReceiverSettings>,
}

impl CourierSettings {
    /// Validates every section, aggregating all errors into one list
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if let Err(e) = self.logging.validate() {
            errors.push(e);
        }

        let mut seen = HashSet::new();
        for receiver in &self.receivers {
            if !seen.insert(receiver.full_name()) {
                errors.push(format!("Duplicate receiver: {}", receiver.full_name()));
            }
            errors.extend(receiver.validate());
        }

        errors
    }
}

/// Loads settings from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (`${VAR}` syntax)
/// 3. Parses the TOML into [`CourierSettings`]
/// 4. Applies environment variable overrides (`COURIER_*` prefix)
/// 5. Validates the settings
///
/// # Errors
///
/// Returns an error if the file cannot be read, parsing fails, a
/// referenced environment variable is unset, or validation fails.
pub fn load_settings(path: impl AsRef<Path>) -> Result<CourierSettings> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(CourierError::Configuration(format!(
            "Settings file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        CourierError::Configuration(format!(
            "Failed to read settings file {}: {}",
            path.display(),
            e
        ))
    })?;

    let contents = substitute_env_vars(&contents)?;

    let mut settings: CourierSettings = toml::from_str(&contents)
        .map_err(|e| CourierError::Configuration(format!("Failed to parse TOML: {e}")))?;

    apply_env_overrides(&mut settings);

    let errors = settings.validate();
    if !errors.is_empty() {
        return Err(CourierError::Configuration(format!(
            "Settings validation failed:\n  {}",
            errors.join("\n  ")
        )));
    }

    Ok(settings)
}

/// Substitutes environment variables in the format `${VAR_NAME}`
///
/// Comment lines are left untouched. All missing variables are reported
/// together.
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();
    let mut result = String::new();
    let mut missing_vars = Vec::new();

    for line in input.lines() {
        let trimmed = line.trim_start();

        // Skip comment lines - don't process env vars in comments
        if trimmed.starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    let placeholder = format!("${{{var_name}}}");
                    processed_line = processed_line.replace(&placeholder, &value);
                }
                Err(_) => {
                    if !missing_vars.contains(&var_name.to_string()) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        result.push_str(&processed_line);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(CourierError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

/// Applies environment variable overrides using the `COURIER_*` prefix
fn apply_env_overrides(settings: &mut CourierSettings) {
    if let Ok(val) = std::env::var("COURIER_LOGGING_LEVEL") {
        settings.logging.level = val;
    }
    if let Ok(val) = std::env::var("COURIER_LOGGING_LOCAL_ENABLED") {
        settings.logging.local_enabled = val.parse().unwrap_or(false);
    }
    if let Ok(val) = std::env::var("COURIER_LOGGING_LOCAL_PATH") {
        settings.logging.local_path = val;
    }
    if let Ok(val) = std::env::var("COURIER_DISPATCH_DELIVER_TO_TESTING") {
        settings.dispatch.deliver_to_testing = val.parse().unwrap_or(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL_SETTINGS: &str = r#"
[logging]
level = "debug"

[[receivers]]
name = "elr"
organization = "pa-phd"
topic = "covid-19"
customerStatus = "active"
jurisdictionalFilter = ["orEquals(patient.state, PA)"]

[receivers.translation]
type = "CUSTOM"
schemaName = "covid-19"
format = "CSV"
"#;

    fn write_temp(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_minimal_settings() {
        let file = write_temp(MINIMAL_SETTINGS);
        let settings = load_settings(file.path()).unwrap();
        assert_eq!(settings.logging.level, "debug");
        assert_eq!(settings.receivers.len(), 1);
        assert_eq!(settings.receivers[0].full_name(), "pa-phd.elr");
        assert!(!settings.dispatch.deliver_to_testing);
    }

    #[test]
    fn test_load_missing_file() {
        assert!(load_settings("nonexistent.toml").is_err());
    }

    #[test]
    fn test_substitute_env_vars() {
        std::env::set_var("COURIER_TEST_SECRET", "hunter2");
        let input = "password = \"${COURIER_TEST_SECRET}\"";
        let result = substitute_env_vars(input).unwrap();
        assert_eq!(result.trim_end(), "password = \"hunter2\"");
        std::env::remove_var("COURIER_TEST_SECRET");
    }

    #[test]
    fn test_substitute_env_vars_missing() {
        std::env::remove_var("COURIER_DEFINITELY_MISSING");
        let input = "password = \"${COURIER_DEFINITELY_MISSING}\"";
        assert!(substitute_env_vars(input).is_err());
    }

    #[test]
    fn test_comments_are_not_substituted() {
        let input = "# uses ${NOT_A_REAL_VAR}\nkey = \"value\"";
        let result = substitute_env_vars(input).unwrap();
        assert!(result.contains("${NOT_A_REAL_VAR}"));
    }

    #[test]
    fn test_duplicate_receivers_rejected() {
        let doubled = format!(
            "{MINIMAL_SETTINGS}\n{}",
            MINIMAL_SETTINGS
                .lines()
                .skip_while(|l| !l.starts_with("[[receivers]]"))
                .collect::<Vec<_>>()
                .join("\n")
        );
        let file = write_temp(&doubled);
        let err = load_settings(file.path()).unwrap_err();
        assert!(err.to_string().contains("Duplicate receiver: pa-phd.elr"));
    }

    #[test]
    fn test_invalid_receiver_fails_load() {
        let broken = MINIMAL_SETTINGS.replace(
            "jurisdictionalFilter = [\"orEquals(patient.state, PA)\"]",
            "jurisdictionalFilter = [\"frobnicate(\"]",
        );
        let file = write_temp(&broken);
        let err = load_settings(file.path()).unwrap_err();
        assert!(err.to_string().contains("Settings validation failed"));
    }
}
