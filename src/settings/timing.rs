//! Receiver batching schedule configuration
//!
//! A receiver's timing settings define how many evenly spaced flush
//! slots its local day has, when the first slot fires, how large the
//! accumulation may grow before an early flush, and what to do with
//! empty slots.

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// How accumulated reports are combined at flush time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchOperation {
    /// Dispatch each accumulated report individually
    #[default]
    None,
    /// Combine all accumulated reports into a single outbound message
    Merge,
}

/// What to do when a slot fires with nothing accumulated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmptyAction {
    /// Suppress any send
    #[default]
    None,
    /// Flush an explicit empty-batch notification
    Send,
}

/// Empty-slot policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhenEmpty {
    #[serde(default)]
    pub action: EmptyAction,

    /// Restrict empty notifications to at most one per local day
    #[serde(default)]
    pub only_once_per_day: bool,
}

/// Named US time zones receivers may schedule in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UsTimeZone {
    #[default]
    Eastern,
    Central,
    Mountain,
    Arizona,
    Pacific,
    Alaska,
    Hawaii,
    EastIndiana,
    IndianaStarke,
    Michigan,
}

impl UsTimeZone {
    /// The IANA time zone backing this name
    pub fn tz(&self) -> Tz {
        match self {
            UsTimeZone::Eastern => chrono_tz::US::Eastern,
            UsTimeZone::Central => chrono_tz::US::Central,
            UsTimeZone::Mountain => chrono_tz::US::Mountain,
            UsTimeZone::Arizona => chrono_tz::US::Arizona,
            UsTimeZone::Pacific => chrono_tz::US::Pacific,
            UsTimeZone::Alaska => chrono_tz::US::Alaska,
            UsTimeZone::Hawaii => chrono_tz::US::Hawaii,
            UsTimeZone::EastIndiana => chrono_tz::US::EastIndiana,
            UsTimeZone::IndianaStarke => chrono_tz::US::IndianaStarke,
            UsTimeZone::Michigan => chrono_tz::US::Michigan,
        }
    }
}

/// Batching schedule for one receiver
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingConfig {
    /// Local time of the first slot, "HH:mm"
    #[serde(default = "default_initial_time")]
    pub initial_time: String,

    /// Flush slots per local day, spaced evenly across 24h
    #[serde(default = "default_number_per_day")]
    pub number_per_day: u32,

    /// Accumulation size that triggers an immediate flush
    #[serde(default = "default_max_report_count")]
    pub max_report_count: usize,

    #[serde(default)]
    pub operation: BatchOperation,

    #[serde(default)]
    pub timezone: UsTimeZone,

    #[serde(default)]
    pub when_empty: WhenEmpty,
}

fn default_initial_time() -> String {
    "00:00".to_string()
}

fn default_number_per_day() -> u32 {
    1
}

fn default_max_report_count() -> usize {
    100
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            initial_time: default_initial_time(),
            number_per_day: default_number_per_day(),
            max_report_count: default_max_report_count(),
            operation: BatchOperation::default(),
            timezone: UsTimeZone::default(),
            when_empty: WhenEmpty::default(),
        }
    }
}

impl TimingConfig {
    /// Validates the timing settings
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid value
    pub fn validate(&self) -> Result<(), String> {
        self.parsed_initial_time()?;
        if self.number_per_day == 0 || self.number_per_day > 1440 {
            return Err(format!(
                "numberPerDay must be between 1 and 1440, got {}",
                self.number_per_day
            ));
        }
        if self.max_report_count == 0 {
            return Err("maxReportCount must be greater than zero".to_string());
        }
        Ok(())
    }

    fn parsed_initial_time(&self) -> Result<NaiveTime, String> {
        NaiveTime::parse_from_str(&self.initial_time, "%H:%M")
            .map_err(|_| format!("Invalid initialTime '{}'. Expected HH:mm", self.initial_time))
    }

    /// The slot times for the local day containing `now`, in UTC
    ///
    /// Slots start at `initial_time` and are spaced `24h / number_per_day`
    /// apart, wrapping within the same local day. Local times skipped by a
    /// DST transition resolve to the earliest following valid instant.
    pub fn slots_for_day(&self, now: DateTime<Utc>) -> Vec<DateTime<Utc>> {
        let tz = self.timezone.tz();
        let local_day = now.with_timezone(&tz).date_naive();
        let initial = match self.parsed_initial_time() {
            Ok(t) => t,
            Err(_) => return Vec::new(),
        };

        let spacing_minutes = (24 * 60) / i64::from(self.number_per_day);
        let initial_minutes =
            i64::from(initial.hour()) * 60 + i64::from(initial.minute());

        (0..i64::from(self.number_per_day))
            .filter_map(|slot| {
                let minutes = (initial_minutes + slot * spacing_minutes) % (24 * 60);
                let time = NaiveTime::from_num_seconds_from_midnight_opt(
                    (minutes * 60) as u32,
                    0,
                )?;
                resolve_local(&tz, local_day.and_time(time)).map(|dt| dt.with_timezone(&Utc))
            })
            .collect()
    }

    /// The next slot at or after `now`
    ///
    /// Rolls into the following local day when every slot of the current
    /// day has passed.
    pub fn next_slot(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let today = self.slots_for_day(now);
        if let Some(slot) = today.into_iter().find(|slot| *slot >= now) {
            return Some(slot);
        }
        let tomorrow = now + Duration::days(1);
        self.slots_for_day(tomorrow).into_iter().find(|slot| *slot >= now)
    }

    /// The slots that became due in the window `(last_tick, now]`
    pub fn due_slots(
        &self,
        last_tick: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Vec<DateTime<Utc>> {
        let mut due = Vec::new();
        let mut cursor = last_tick;
        // Walk one local day past `now`: a slot inside the window can
        // belong to a later local day than the cursor's (UTC offsets).
        while cursor <= now + Duration::days(1) {
            for slot in self.slots_for_day(cursor) {
                if slot > last_tick && slot <= now && !due.contains(&slot) {
                    due.push(slot);
                }
            }
            cursor = cursor + Duration::days(1);
        }
        due.sort();
        due
    }
}

/// Resolves a local wall-clock time to an instant, taking the earlier of
/// ambiguous times and skipping forward over DST gaps.
fn resolve_local(tz: &Tz, local: chrono::NaiveDateTime) -> Option<DateTime<Tz>> {
    match tz.from_local_datetime(&local) {
        chrono::LocalResult::Single(dt) => Some(dt),
        chrono::LocalResult::Ambiguous(earliest, _) => Some(earliest),
        chrono::LocalResult::None => tz
            .from_local_datetime(&(local + Duration::hours(1)))
            .earliest(),
    }
}
