//! Router engine - orchestrates the routing pipeline
//!
//! Wires the subsystems together: reports are evaluated per receiver,
//! admitted into the scheduler, and flushed batches are rendered and
//! dispatched. Each receiver's dispatch runs in its own task so one slow
//! or unreachable transport cannot stall the others.

use crate::batch::{BatchScheduler, FlushEvent};
use crate::domain::{CourierError, ReportRecord, Result};
use crate::filter::FilterEngine;
use crate::router::render::render_event;
use crate::schema::SchemaRegistry;
use crate::settings::{CourierSettings, CustomerStatus, ReceiverSettings};
use crate::transport::dispatch;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Outcome of routing one report
#[derive(Debug, Default)]
pub struct RoutingOutcome {
    /// Receivers the report was admitted to
    pub admitted: Vec<String>,
    /// Receivers that rejected the report, with their first reason
    pub rejected: Vec<(String, String)>,
}

/// Outcome of one scheduling tick
#[derive(Debug, Default)]
pub struct TickOutcome {
    /// Batches handed off successfully
    pub delivered: usize,
    /// Batches kept pending for redelivery
    pub failed: usize,
}

/// The routing pipeline
pub struct RouterEngine {
    settings: Arc<CourierSettings>,
    registry: Arc<SchemaRegistry>,
    scheduler: Arc<BatchScheduler>,
    filter: FilterEngine,
}

impl RouterEngine {
    pub fn new(settings: Arc<CourierSettings>, registry: Arc<SchemaRegistry>) -> Self {
        Self {
            settings,
            registry,
            scheduler: Arc::new(BatchScheduler::new()),
            filter: FilterEngine::new(),
        }
    }

    /// The scheduler, shared for inspection in tests and tooling
    pub fn scheduler(&self) -> Arc<BatchScheduler> {
        self.scheduler.clone()
    }

    /// Routes one report to every eligible receiver
    ///
    /// A receiver is eligible when it is not inactive, subscribes to the
    /// report's topic, and all four filter lists accept the report.
    /// Count-triggered flushes are dispatched before returning.
    pub async fn route_report(&self, report: ReportRecord) -> Result<RoutingOutcome> {
        let now = Utc::now();
        let mut outcome = RoutingOutcome::default();
        let mut immediate = Vec::new();

        for receiver in &self.settings.receivers {
            if receiver.customer_status == CustomerStatus::Inactive {
                continue;
            }
            if receiver.topic != report.topic {
                continue;
            }

            let decision = self.filter.evaluate(&report, receiver);
            if !decision.included {
                let reason = decision
                    .rejections
                    .first()
                    .map(|r| format!("{}: {}", r.list, r.reason))
                    .unwrap_or_else(|| "rejected".to_string());
                outcome.rejected.push((receiver.full_name(), reason));
                continue;
            }

            outcome.admitted.push(receiver.full_name());
            if let Some(event) = self.scheduler.admit(receiver, report.clone(), now).await? {
                immediate.push(event);
            }
        }

        tracing::debug!(
            report_id = %report.report_id,
            admitted = outcome.admitted.len(),
            rejected = outcome.rejected.len(),
            "Report routed"
        );

        if !immediate.is_empty() {
            self.handle_events(immediate).await;
        }
        Ok(outcome)
    }

    /// Runs one scheduling tick: flushes every receiver whose slot came
    /// due and re-attempts pending batches
    pub async fn tick(&self, now: DateTime<Utc>) -> TickOutcome {
        let events = self.scheduler.tick(&self.settings.receivers, now).await;
        self.handle_events(events).await
    }

    /// Renders and dispatches flush events, one task per receiver flush
    async fn handle_events(&self, events: Vec<FlushEvent>) -> TickOutcome {
        let mut outcome = TickOutcome::default();
        let mut handles = Vec::new();

        for event in events {
            let Some(receiver) = self.receiver_by_name(&event.receiver).cloned() else {
                tracing::error!(receiver = %event.receiver, "Flush event for unknown receiver");
                continue;
            };

            let registry = self.registry.clone();
            let scheduler = self.scheduler.clone();
            let deliver_to_testing = self.settings.dispatch.deliver_to_testing;

            // One task per receiver flush isolates slow transports.
            handles.push(tokio::spawn(async move {
                flush_one(event, receiver, registry, scheduler, deliver_to_testing).await
            }));
        }

        for result in futures::future::join_all(handles).await {
            match result {
                Ok(Ok(())) => outcome.delivered += 1,
                Ok(Err(e)) => {
                    outcome.failed += 1;
                    if matches!(e, CourierError::Scheduling(_)) {
                        // A violated flush invariant is a concurrency bug;
                        // the receiver's processing is aborted, not resumed.
                        tracing::error!(error = %e, "Fatal scheduling invariant violation");
                    }
                }
                Err(join_err) => {
                    outcome.failed += 1;
                    tracing::error!(error = %join_err, "Flush task panicked");
                }
            }
        }
        outcome
    }

    fn receiver_by_name(&self, full_name: &str) -> Option<&ReceiverSettings> {
        self.settings
            .receivers
            .iter()
            .find(|r| r.full_name() == full_name)
    }
}

/// Renders and dispatches one flush event, acknowledging the scheduler
async fn flush_one(
    event: FlushEvent,
    receiver: ReceiverSettings,
    registry: Arc<SchemaRegistry>,
    scheduler: Arc<BatchScheduler>,
    deliver_to_testing: bool,
) -> Result<()> {
    let batches = match render_event(&event, &receiver, &registry) {
        Ok(batches) => batches,
        Err(e) => {
            // A rendering failure is a configuration problem; the batch
            // stays pending so fixing the settings recovers it.
            tracing::error!(receiver = %event.receiver, error = %e, "Batch rendering failed");
            scheduler.complete_flush(event, false).await?;
            return Err(e);
        }
    };

    let skip_dispatch = match receiver.customer_status {
        CustomerStatus::Active => false,
        CustomerStatus::Testing => !deliver_to_testing,
        CustomerStatus::Inactive => true,
    };

    if skip_dispatch {
        tracing::info!(
            receiver = %event.receiver,
            status = ?receiver.customer_status,
            batches = batches.len(),
            "Dispatch suppressed by customer status"
        );
        return scheduler.complete_flush(event, true).await;
    }

    let Some(transport_config) = &receiver.transport else {
        tracing::info!(
            receiver = %event.receiver,
            "No transport configured, batch marked delivered"
        );
        return scheduler.complete_flush(event, true).await;
    };

    for batch in &batches {
        match dispatch(batch, transport_config).await {
            Ok(receipt) => {
                tracing::info!(
                    receiver = %receipt.receiver,
                    transport = %receipt.transport,
                    destination = %receipt.destination,
                    items = receipt.item_count,
                    digest = %receipt.digest,
                    "Delivery receipt"
                );
            }
            Err(e) => {
                // The whole event stays pending; redelivery re-sends the
                // same payload rather than a partial batch.
                scheduler.complete_flush(event, false).await?;
                return Err(CourierError::Transport(e));
            }
        }
    }

    scheduler.complete_flush(event, true).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{receiver_fixture, DispatchSettings, LoggingSettings, TimingConfig};
    use serde_json::json;

    fn engine_with(receivers: Vec<ReceiverSettings>) -> RouterEngine {
        let registry = Arc::new(SchemaRegistry::default());
        registry
            .reload(vec![crate::schema::Schema::new(
                "covid-19",
                Some("ORU_R01".to_string()),
                Some("2.5.1".to_string()),
                vec![crate::schema::SchemaElement::value_element(
                    "patient_state",
                    vec!["PID-11-4".to_string()],
                    vec!["patient.state".to_string()],
                )],
            )])
            .unwrap();

        let settings = CourierSettings {
            dispatch: DispatchSettings::default(),
            logging: LoggingSettings::default(),
            receivers,
        };
        RouterEngine::new(Arc::new(settings), registry)
    }

    fn report() -> ReportRecord {
        ReportRecord::new("covid-19", json!({ "patient": { "state": "PA" } }))
    }

    #[tokio::test]
    async fn test_inactive_receivers_are_not_routed() {
        let mut inactive = receiver_fixture();
        inactive.customer_status = CustomerStatus::Inactive;
        let engine = engine_with(vec![inactive]);

        let outcome = engine.route_report(report()).await.unwrap();
        assert!(outcome.admitted.is_empty());
        assert!(outcome.rejected.is_empty());
    }

    #[tokio::test]
    async fn test_topic_mismatch_is_not_routed() {
        let mut receiver = receiver_fixture();
        receiver.topic = "flu".to_string();
        let engine = engine_with(vec![receiver]);

        let outcome = engine.route_report(report()).await.unwrap();
        assert!(outcome.admitted.is_empty());
    }

    #[tokio::test]
    async fn test_filter_rejection_is_reported() {
        let mut receiver = receiver_fixture();
        receiver.jurisdictional_filter = vec!["matches(patient.state, NJ)".to_string()];
        let engine = engine_with(vec![receiver]);

        let outcome = engine.route_report(report()).await.unwrap();
        assert!(outcome.admitted.is_empty());
        assert_eq!(outcome.rejected.len(), 1);
        assert!(outcome.rejected[0].1.contains("jurisdictionalFilter"));
    }

    #[tokio::test]
    async fn test_admitted_report_without_transport_flushes_clean() {
        // No timing -> immediate flush; no transport -> delivered as a no-op.
        let receiver = receiver_fixture();
        let name = receiver.full_name();
        let engine = engine_with(vec![receiver]);

        let outcome = engine.route_report(report()).await.unwrap();
        assert_eq!(outcome.admitted, vec![name.clone()]);
        assert_eq!(
            engine.scheduler().phase(&name).await,
            Some(crate::batch::ReceiverPhase::Idle)
        );
    }

    #[tokio::test]
    async fn test_scheduled_receiver_accumulates_until_tick() {
        let mut receiver = receiver_fixture();
        receiver.timing = Some(TimingConfig {
            initial_time: "08:00".to_string(),
            ..Default::default()
        });
        let name = receiver.full_name();
        let engine = engine_with(vec![receiver]);

        engine.route_report(report()).await.unwrap();
        assert_eq!(
            engine.scheduler().phase(&name).await,
            Some(crate::batch::ReceiverPhase::Accumulating)
        );
    }
}
