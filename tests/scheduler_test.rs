//! Integration tests for the batch scheduler

use chrono::{TimeZone, Utc};
use courier::batch::{BatchScheduler, ReceiverPhase};
use courier::domain::ReportRecord;
use courier::settings::{EmptyAction, ReceiverSettings, TimingConfig, WhenEmpty};
use serde_json::json;

fn receiver(timing: Option<TimingConfig>) -> ReceiverSettings {
    let mut receiver: ReceiverSettings = toml::from_str(
        r#"
name = "elr"
organization = "pa-phd"
topic = "covid-19"
customerStatus = "active"

[translation]
type = "CUSTOM"
schemaName = "covid-19"
format = "CSV"
"#,
    )
    .unwrap();
    receiver.timing = timing;
    receiver
}

fn report() -> ReportRecord {
    ReportRecord::new("covid-19", json!({ "test_result": "positive" }))
}

fn daily_at_eight() -> TimingConfig {
    TimingConfig {
        initial_time: "08:00".to_string(),
        number_per_day: 1,
        max_report_count: 100,
        ..Default::default()
    }
}

// January 15th; the default Eastern zone is UTC-5, so the 08:00 local
// slot lands at 13:00 UTC.
fn utc(h: u32, m: u32) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, h, m, 0).unwrap()
}

#[tokio::test]
async fn one_report_waits_for_the_scheduled_slot() {
    let scheduler = BatchScheduler::new();
    let receiver = receiver(Some(daily_at_eight()));

    let flushed = scheduler.admit(&receiver, report(), utc(10, 0)).await.unwrap();
    assert!(flushed.is_none());

    // Before the slot: nothing.
    assert!(scheduler.tick(&[receiver.clone()], utc(12, 0)).await.is_empty());

    // After the slot: the batch flushes.
    let events = scheduler.tick(&[receiver], utc(13, 30)).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].reports.len(), 1);
}

#[tokio::test]
async fn max_report_count_overrides_the_slot() {
    let scheduler = BatchScheduler::new();
    let receiver = receiver(Some(daily_at_eight()));

    let mut flushed = None;
    for i in 0..101 {
        let result = scheduler.admit(&receiver, report(), utc(9, 0)).await.unwrap();
        if let Some(event) = result {
            flushed = Some((i, event));
            break;
        }
    }

    let (index, event) = flushed.expect("the 100th report should flush immediately");
    assert_eq!(index, 99); // zero-based: the 100th admit hit the threshold
    assert_eq!(event.reports.len(), 100);
}

#[tokio::test]
async fn empty_slots_respect_only_once_per_day() {
    let scheduler = BatchScheduler::new();
    let mut timing = TimingConfig {
        initial_time: "04:00".to_string(),
        number_per_day: 12,
        ..Default::default()
    };
    timing.when_empty = WhenEmpty {
        action: EmptyAction::Send,
        only_once_per_day: true,
    };
    let receiver = receiver(Some(timing));

    // Bootstrap: first sighting of the receiver.
    assert!(scheduler.tick(&[receiver.clone()], utc(8, 30)).await.is_empty());

    // First empty slot of the local day -> exactly one notification.
    let events = scheduler.tick(&[receiver.clone()], utc(11, 30)).await;
    assert_eq!(events.len(), 1);
    assert!(events[0].empty_notification);
    scheduler
        .complete_flush(events.into_iter().next().unwrap(), true)
        .await
        .unwrap();

    // Two more empty slots the same local day -> silence.
    assert!(scheduler.tick(&[receiver.clone()], utc(13, 30)).await.is_empty());
    assert!(scheduler.tick(&[receiver], utc(15, 30)).await.is_empty());
}

#[tokio::test]
async fn failed_handoff_keeps_the_batch_for_the_next_tick() {
    let scheduler = BatchScheduler::new();
    let receiver = receiver(Some(daily_at_eight()));

    scheduler.admit(&receiver, report(), utc(10, 0)).await.unwrap();
    let events = scheduler.tick(&[receiver.clone()], utc(13, 30)).await;
    let event = events.into_iter().next().unwrap();
    let payload_len = event.reports.len();
    let id = event.id;

    scheduler.complete_flush(event, false).await.unwrap();
    assert_eq!(
        scheduler.phase(&receiver.full_name()).await,
        Some(ReceiverPhase::Accumulating)
    );

    // Same batch, same payload, next tick.
    let retried = scheduler.tick(&[receiver.clone()], utc(13, 35)).await;
    assert_eq!(retried.len(), 1);
    assert_eq!(retried[0].id, id);
    assert_eq!(retried[0].reports.len(), payload_len);
    assert_eq!(retried[0].attempt, 1);

    scheduler
        .complete_flush(retried.into_iter().next().unwrap(), true)
        .await
        .unwrap();
    assert_eq!(
        scheduler.phase(&receiver.full_name()).await,
        Some(ReceiverPhase::Idle)
    );
}

#[tokio::test]
async fn receivers_are_scheduled_independently() {
    let scheduler = BatchScheduler::new();
    let pa = receiver(Some(daily_at_eight()));
    let mut nj = receiver(Some(TimingConfig {
        initial_time: "11:00".to_string(),
        ..Default::default()
    }));
    nj.organization = "nj-doh".to_string();

    scheduler.admit(&pa, report(), utc(10, 0)).await.unwrap();
    scheduler.admit(&nj, report(), utc(10, 0)).await.unwrap();

    // 13:30 UTC: PA's 08:00 slot has passed, NJ's 11:00 slot has not.
    let events = scheduler.tick(&[pa, nj], utc(13, 30)).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].receiver, "pa-phd.elr");
}
