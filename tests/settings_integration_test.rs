//! Integration tests for settings loading and validation
//!
//! Note: Tests that modify environment variables should be run with
//! --test-threads=1 to avoid interference between tests.

use courier::settings::{load_settings, CustomerStatus, TransportConfig, UsTimeZone};
use std::io::Write;
use std::sync::Mutex;
use tempfile::NamedTempFile;

// Mutex to serialize tests that modify environment variables
static ENV_MUTEX: Mutex<()> = Mutex::new(());

const FULL_SETTINGS: &str = r#"
[dispatch]
deliverToTesting = true

[logging]
level = "debug"
local_enabled = false

[[receivers]]
name = "elr"
organization = "pa-phd"
topic = "covid-19"
customerStatus = "active"
description = "Pennsylvania ELR feed"
jurisdictionalFilter = ["orEquals(patient.state, PA)"]
qualityFilter = ["hasValidDataFor(patient.state, test_result)"]
reverseTheQualityFilter = false
deidentify = false
externalName = "Pennsylvania Department of Health"

[receivers.translation]
type = "HL7"
useTestProcessingMode = false
useBatchHeaders = true
receivingApplicationName = "PA-ELR"
receivingApplicationOID = "2.16.840.1.114222.4.1.77"

[receivers.timing]
initialTime = "08:00"
numberPerDay = 4
maxReportCount = 500
operation = "MERGE"
timezone = "EASTERN"

[receivers.timing.whenEmpty]
action = "SEND"
onlyOncePerDay = true

[receivers.transport]
type = "SFTP"
host = "sftp.pa.gov"
port = 2222
filePath = "./elr"
username = "courier"
password = "${COURIER_TEST_SFTP_PASSWORD}"

[[receivers]]
name = "gaen"
organization = "wa-doh"
topic = "exposure-notification"
customerStatus = "testing"

[receivers.translation]
type = "CUSTOM"
schemaName = "exposure"
format = "INTERNAL"

[receivers.transport]
type = "GAEN"
apiUrl = "https://notify.wa.gov/api/report"
uuidFormat = "WA_NOTIFY"
"#;

fn write_temp(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_load_complete_settings() {
    let _lock = ENV_MUTEX.lock().unwrap();
    std::env::set_var("COURIER_TEST_SFTP_PASSWORD", "hunter2");

    let file = write_temp(FULL_SETTINGS);
    let settings = load_settings(file.path()).expect("settings should load");

    assert!(settings.dispatch.deliver_to_testing);
    assert_eq!(settings.logging.level, "debug");
    assert_eq!(settings.receivers.len(), 2);

    let elr = &settings.receivers[0];
    assert_eq!(elr.full_name(), "pa-phd.elr");
    assert_eq!(elr.customer_status, CustomerStatus::Active);
    assert_eq!(elr.display_name(), "Pennsylvania Department of Health");
    assert_eq!(elr.jurisdictional_filter.len(), 1);

    let timing = elr.timing.as_ref().unwrap();
    assert_eq!(timing.number_per_day, 4);
    assert_eq!(timing.max_report_count, 500);
    assert_eq!(timing.timezone, UsTimeZone::Eastern);
    assert!(timing.when_empty.only_once_per_day);

    match elr.transport.as_ref().unwrap() {
        TransportConfig::Sftp { host, port, password, .. } => {
            assert_eq!(host, "sftp.pa.gov");
            assert_eq!(*port, 2222);
            // The ${VAR} reference was substituted from the environment
            use secrecy::ExposeSecret;
            assert_eq!(password.as_ref().unwrap().expose_secret(), "hunter2");
        }
        other => panic!("expected SFTP transport, got {other:?}"),
    }

    let gaen = &settings.receivers[1];
    assert_eq!(gaen.customer_status, CustomerStatus::Testing);
    assert!(gaen.timing.is_none());

    std::env::remove_var("COURIER_TEST_SFTP_PASSWORD");
}

#[test]
fn test_missing_env_var_fails_load() {
    let _lock = ENV_MUTEX.lock().unwrap();
    std::env::remove_var("COURIER_TEST_SFTP_PASSWORD");

    let file = write_temp(FULL_SETTINGS);
    let err = load_settings(file.path()).unwrap_err();
    assert!(err
        .to_string()
        .contains("Missing required environment variables: COURIER_TEST_SFTP_PASSWORD"));
}

#[test]
fn test_env_overrides_apply() {
    let _lock = ENV_MUTEX.lock().unwrap();
    std::env::set_var("COURIER_TEST_SFTP_PASSWORD", "hunter2");
    std::env::set_var("COURIER_LOGGING_LEVEL", "warn");
    std::env::set_var("COURIER_DISPATCH_DELIVER_TO_TESTING", "false");

    let file = write_temp(FULL_SETTINGS);
    let settings = load_settings(file.path()).unwrap();
    assert_eq!(settings.logging.level, "warn");
    assert!(!settings.dispatch.deliver_to_testing);

    std::env::remove_var("COURIER_TEST_SFTP_PASSWORD");
    std::env::remove_var("COURIER_LOGGING_LEVEL");
    std::env::remove_var("COURIER_DISPATCH_DELIVER_TO_TESTING");
}

#[test]
fn test_validation_reports_every_problem_at_once() {
    let _lock = ENV_MUTEX.lock().unwrap();
    let broken = r#"
[[receivers]]
name = "elr"
organization = "pa-phd"
topic = ""
qualityFilter = ["frobnicate(x)"]

[receivers.translation]
type = "REDOX"
destinationId = "d"
destinationName = "n"
sourceId = ""
sourceName = "s"

[receivers.timing]
initialTime = "25:61"
"#;

    let file = write_temp(broken);
    let err = load_settings(file.path()).unwrap_err().to_string();

    assert!(err.contains("Topic cannot be blank"));
    assert!(err.contains("sourceId cannot be blank"));
    assert!(err.contains("Unknown filter predicate: frobnicate"));
    assert!(err.contains("Invalid initialTime"));
}
