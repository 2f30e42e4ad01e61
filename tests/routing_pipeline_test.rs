//! End-to-end pipeline tests: filter -> accumulate -> render -> dispatch

use courier::batch::ReceiverPhase;
use courier::domain::ReportRecord;
use courier::router::RouterEngine;
use courier::schema::{Schema, SchemaElement, SchemaRegistry};
use courier::settings::CourierSettings;
use serde_json::json;
use std::sync::Arc;

fn registry() -> Arc<SchemaRegistry> {
    let registry = SchemaRegistry::default();
    registry
        .reload(vec![Schema::new(
            "covid-19",
            Some("ORU_R01".to_string()),
            Some("2.5.1".to_string()),
            vec![
                SchemaElement::value_element(
                    "patient_state",
                    vec!["patient_state".to_string()],
                    vec!["patient.state".to_string()],
                ),
                SchemaElement::value_element(
                    "test_result",
                    vec!["test_result".to_string()],
                    vec!["test_result".to_string()],
                ),
            ],
        )])
        .unwrap();
    Arc::new(registry)
}

fn settings(blob_base: &str, status: &str, deliver_to_testing: bool) -> Arc<CourierSettings> {
    let toml_text = format!(
        r#"
[dispatch]
deliverToTesting = {deliver_to_testing}

[[receivers]]
name = "elr"
organization = "pa-phd"
topic = "covid-19"
customerStatus = "{status}"
jurisdictionalFilter = ["orEquals(patient.state, PA)"]

[receivers.translation]
type = "CUSTOM"
schemaName = "covid-19"
format = "CSV"

[receivers.transport]
type = "BLOBSTORE"
storageAccountUrl = "{blob_base}"
containerName = "reports"
"#
    );
    Arc::new(toml::from_str(&toml_text).unwrap())
}

fn report() -> ReportRecord {
    ReportRecord::new(
        "covid-19",
        json!({ "patient": { "state": "PA" }, "test_result": "positive" }),
    )
}

#[tokio::test]
async fn report_flows_from_admission_to_delivery() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("PUT", mockito::Matcher::Regex(r"^/reports/pa-phd\.elr/.*\.csv$".to_string()))
        .with_status(201)
        .create_async()
        .await;

    let engine = RouterEngine::new(settings(&server.url(), "active", false), registry());

    let outcome = engine.route_report(report()).await.unwrap();
    assert_eq!(outcome.admitted, vec!["pa-phd.elr".to_string()]);

    mock.assert_async().await;
    assert_eq!(
        engine.scheduler().phase("pa-phd.elr").await,
        Some(ReceiverPhase::Idle)
    );
}

#[tokio::test]
async fn rejected_report_is_never_dispatched() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("PUT", mockito::Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let engine = RouterEngine::new(settings(&server.url(), "active", false), registry());

    let nj_report = ReportRecord::new(
        "covid-19",
        json!({ "patient": { "state": "NJ" }, "test_result": "positive" }),
    );
    let outcome = engine.route_report(nj_report).await.unwrap();
    assert!(outcome.admitted.is_empty());
    assert_eq!(outcome.rejected.len(), 1);

    mock.assert_async().await;
}

#[tokio::test]
async fn testing_receiver_is_batched_but_not_delivered_by_default() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("PUT", mockito::Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let engine = RouterEngine::new(settings(&server.url(), "testing", false), registry());

    let outcome = engine.route_report(report()).await.unwrap();
    assert_eq!(outcome.admitted.len(), 1);

    mock.assert_async().await;
    // The flush completed as a suppressed success, not a pending retry.
    assert_eq!(
        engine.scheduler().phase("pa-phd.elr").await,
        Some(ReceiverPhase::Idle)
    );
}

#[tokio::test]
async fn testing_receiver_delivers_when_policy_allows() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("PUT", mockito::Matcher::Any)
        .with_status(201)
        .create_async()
        .await;

    let engine = RouterEngine::new(settings(&server.url(), "testing", true), registry());
    engine.route_report(report()).await.unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn failed_delivery_keeps_the_batch_pending() {
    let mut server = mockito::Server::new_async().await;
    // Rejected outright: not retryable, batch parks for the next tick.
    server
        .mock("PUT", mockito::Matcher::Any)
        .with_status(409)
        .create_async()
        .await;

    let engine = RouterEngine::new(settings(&server.url(), "active", false), registry());
    engine.route_report(report()).await.unwrap();

    assert_eq!(
        engine.scheduler().phase("pa-phd.elr").await,
        Some(ReceiverPhase::Accumulating)
    );
}
