//! Batch scheduler
//!
//! Maintains per-receiver accumulation and decides flush timing. Each
//! receiver runs the state machine Idle → Accumulating → Flushing →
//! Idle; a per-receiver async mutex serializes every transition, so two
//! flushes of the same receiver can never overlap while receivers remain
//! free to progress concurrently.

use crate::batch::buffer::AccumulationBuffer;
use crate::domain::{CourierError, ReportRecord, Result};
use crate::settings::{BatchOperation, EmptyAction, ReceiverSettings, TimingConfig};
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Where a receiver is in its flush cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverPhase {
    /// No unflushed reports
    Idle,
    /// Reports admitted, waiting for a slot or the count threshold
    Accumulating,
    /// A flush has been handed off and not yet acknowledged
    Flushing,
}

/// An accumulated batch ready for rendering and dispatch
#[derive(Debug, Clone)]
pub struct FlushEvent {
    /// Stable id, kept across redelivery attempts
    pub id: Uuid,
    /// Fully qualified receiver name
    pub receiver: String,
    /// The slot (or admission instant, for count-triggered flushes)
    pub slot: DateTime<Utc>,
    /// The accumulated reports; empty for an empty-batch notification
    pub reports: Vec<ReportRecord>,
    /// MERGE combines the reports into one outbound message
    pub operation: BatchOperation,
    /// True when this is a `whenEmpty` notification
    pub empty_notification: bool,
    /// Dispatch attempts so far
    pub attempt: u32,
}

#[derive(Debug)]
struct ReceiverState {
    phase: ReceiverPhase,
    buffer: AccumulationBuffer,
    /// Batches whose handoff failed, awaiting the next tick
    pending: Vec<FlushEvent>,
    last_tick: DateTime<Utc>,
    /// Local day an empty notification was last sent, for onlyOncePerDay
    last_empty_notification: Option<NaiveDate>,
}

impl ReceiverState {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            phase: ReceiverPhase::Idle,
            buffer: AccumulationBuffer::new(),
            pending: Vec::new(),
            last_tick: now,
            last_empty_notification: None,
        }
    }
}

/// Per-receiver batch scheduler
///
/// Shared by the admission path and the tick loop; every mutation of one
/// receiver's state goes through that receiver's own lock.
#[derive(Default)]
pub struct BatchScheduler {
    states: StdMutex<HashMap<String, Arc<Mutex<ReceiverState>>>>,
}

impl BatchScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn state_for(&self, receiver: &str, now: DateTime<Utc>) -> Arc<Mutex<ReceiverState>> {
        let mut states = self
            .states
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        states
            .entry(receiver.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(ReceiverState::new(now))))
            .clone()
    }

    /// The phase a receiver is currently in
    pub async fn phase(&self, receiver: &str) -> Option<ReceiverPhase> {
        let state = {
            let states = self
                .states
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            states.get(receiver)?.clone()
        };
        let guard = state.lock().await;
        Some(guard.phase)
    }

    /// Admits a report into a receiver's accumulation
    ///
    /// Returns a flush event when the accumulation reaches the
    /// receiver's `maxReportCount` (the backpressure release valve) or
    /// when the receiver has no timing configured (immediate dispatch).
    /// The caller owns any returned event and must acknowledge it with
    /// [`BatchScheduler::complete_flush`].
    pub async fn admit(
        &self,
        receiver: &ReceiverSettings,
        report: ReportRecord,
        now: DateTime<Utc>,
    ) -> Result<Option<FlushEvent>> {
        let name = receiver.full_name();
        let state = self.state_for(&name, now);
        let mut guard = state.lock().await;

        guard.buffer.admit(report);
        if guard.phase == ReceiverPhase::Idle {
            guard.phase = ReceiverPhase::Accumulating;
        }

        // A flush already in flight keeps the buffer accumulating; the
        // leftovers go out with the next admission or tick.
        let flush_now = guard.phase != ReceiverPhase::Flushing
            && match &receiver.timing {
                // No schedule: every admitted report flushes immediately
                None => true,
                Some(timing) => guard.buffer.len() >= timing.max_report_count,
            };

        if !flush_now {
            return Ok(None);
        }

        let operation = receiver
            .timing
            .as_ref()
            .map(|t| t.operation)
            .unwrap_or_default();
        let event = FlushEvent {
            id: Uuid::new_v4(),
            receiver: name.clone(),
            slot: now,
            reports: guard.buffer.drain(),
            operation,
            empty_notification: false,
            attempt: 0,
        };
        guard.phase = ReceiverPhase::Flushing;
        tracing::debug!(
            receiver = %name,
            count = event.reports.len(),
            "Count threshold reached, flushing early"
        );
        Ok(Some(event))
    }

    /// Collects flush events for every receiver whose slot has come due
    ///
    /// Failed batches from earlier ticks are re-emitted first. A receiver
    /// whose previous flush is still in flight is skipped; its slot is
    /// picked up on a later tick.
    pub async fn tick(
        &self,
        receivers: &[ReceiverSettings],
        now: DateTime<Utc>,
    ) -> Vec<FlushEvent> {
        let mut events = Vec::new();

        for receiver in receivers {
            let name = receiver.full_name();
            let state = self.state_for(&name, now);
            let mut guard = state.lock().await;

            if guard.phase == ReceiverPhase::Flushing {
                tracing::debug!(receiver = %name, "Flush in flight, skipping tick");
                continue;
            }

            // Pending retries go out on any tick, due slot or not.
            if !guard.pending.is_empty() {
                let mut pending = std::mem::take(&mut guard.pending);
                for event in &mut pending {
                    event.attempt += 1;
                }
                tracing::info!(
                    receiver = %name,
                    batches = pending.len(),
                    "Re-attempting pending batches"
                );
                guard.phase = ReceiverPhase::Flushing;
                events.append(&mut pending);
                continue;
            }

            let Some(timing) = &receiver.timing else {
                // Schedule-less receivers flush on admission; a tick only
                // sweeps up reports that arrived mid-flush.
                if !guard.buffer.is_empty() {
                    let event = FlushEvent {
                        id: Uuid::new_v4(),
                        receiver: name.clone(),
                        slot: now,
                        reports: guard.buffer.drain(),
                        operation: BatchOperation::default(),
                        empty_notification: false,
                        attempt: 0,
                    };
                    guard.phase = ReceiverPhase::Flushing;
                    events.push(event);
                }
                continue;
            };

            let due = timing.due_slots(guard.last_tick, now);
            guard.last_tick = now;

            let Some(&slot) = due.last() else {
                continue;
            };

            if !guard.buffer.is_empty() {
                let event = FlushEvent {
                    id: Uuid::new_v4(),
                    receiver: name.clone(),
                    slot,
                    reports: guard.buffer.drain(),
                    operation: timing.operation,
                    empty_notification: false,
                    attempt: 0,
                };
                guard.phase = ReceiverPhase::Flushing;
                events.push(event);
                continue;
            }

            // Empty slot: apply the whenEmpty policy.
            if timing.when_empty.action == EmptyAction::Send
                && self.empty_notification_allowed(&guard, timing, slot)
            {
                guard.last_empty_notification =
                    Some(local_day(timing, slot));
                let event = FlushEvent {
                    id: Uuid::new_v4(),
                    receiver: name.clone(),
                    slot,
                    reports: Vec::new(),
                    operation: timing.operation,
                    empty_notification: true,
                    attempt: 0,
                };
                guard.phase = ReceiverPhase::Flushing;
                events.push(event);
            }
        }

        events
    }

    fn empty_notification_allowed(
        &self,
        state: &ReceiverState,
        timing: &TimingConfig,
        slot: DateTime<Utc>,
    ) -> bool {
        if !timing.when_empty.only_once_per_day {
            return true;
        }
        state.last_empty_notification != Some(local_day(timing, slot))
    }

    /// Acknowledges a flush handoff
    ///
    /// On success the receiver returns to Idle (or Accumulating when new
    /// reports arrived mid-flush). On failure the batch is kept pending,
    /// intact, and re-attempted at the next tick.
    ///
    /// # Errors
    ///
    /// Returns a `Scheduling` error when the receiver was not in the
    /// Flushing phase; that means two flushes of one receiver
    /// overlapped, which is a concurrency-control bug, and the
    /// receiver's processing must be aborted rather than continued.
    pub async fn complete_flush(&self, event: FlushEvent, success: bool) -> Result<()> {
        let state = self.state_for(&event.receiver, event.slot);
        let mut guard = state.lock().await;

        if guard.phase != ReceiverPhase::Flushing {
            return Err(CourierError::Scheduling(format!(
                "complete_flush for {} while in phase {:?}; overlapping flush detected",
                event.receiver, guard.phase
            )));
        }

        if success {
            guard.phase = if guard.buffer.is_empty() {
                ReceiverPhase::Idle
            } else {
                ReceiverPhase::Accumulating
            };
        } else {
            tracing::warn!(
                receiver = %event.receiver,
                attempt = event.attempt,
                "Flush handoff failed, batch kept pending"
            );
            guard.pending.push(event);
            guard.phase = ReceiverPhase::Accumulating;
        }
        Ok(())
    }
}

fn local_day(timing: &TimingConfig, instant: DateTime<Utc>) -> NaiveDate {
    instant.with_timezone(&timing.timezone.tz()).date_naive()
}
