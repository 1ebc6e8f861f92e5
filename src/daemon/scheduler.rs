//! Alarm scheduler.
//!
//! This module arms and cancels wake timers:
//! - Target computation from a local `HH:MM` (rolls to tomorrow when passed)
//! - Exact or best-effort timers chosen by the capability query
//! - At most one armed timer per request code (replace, never stack)
//! - Firing pushes `Signal::TimerFired` into the dispatcher channel

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Local, LocalResult, NaiveDate, NaiveTime, TimeDelta, TimeZone, Timelike};
use tokio::task::AbortHandle;
use tokio::time::Duration;
use tracing::{debug, info, warn};

use super::capabilities::Capabilities;
use super::signal::{Signal, SignalSender};
use crate::types::{AlarmRequest, Slot, TimerPrecision};

/// Longest single sleep of a timer task before it re-reads the wall clock.
const MAX_SLEEP_CHUNK: Duration = Duration::from_secs(30);

// ============================================================================
// SchedulerError
// ============================================================================

/// Scheduler-specific error types.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SchedulerError {
    /// Time of day is not `HH:MM`
    #[error("Invalid time '{0}': expected HH:MM (00:00-23:59)")]
    InvalidTime(String),
}

// ============================================================================
// Clock
// ============================================================================

/// Wall-clock source.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

/// The system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// A manually driven clock for testing.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Local>>,
}

impl FixedClock {
    #[must_use]
    pub fn new(now: DateTime<Local>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Creates a clock at a local date and time.
    ///
    /// Out-of-range fields fall back to the epoch; a local time skipped by
    /// DST is read as UTC.
    #[must_use]
    pub fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> Self {
        let naive = NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|date| date.and_hms_opt(hour, minute, second))
            .unwrap_or_default();
        let now = Local
            .from_local_datetime(&naive)
            .earliest()
            .unwrap_or_else(|| Local.from_utc_datetime(&naive));
        Self::new(now)
    }

    pub fn set(&self, now: DateTime<Local>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    pub fn advance(&self, by: TimeDelta) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Local> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ============================================================================
// Target computation
// ============================================================================

/// Parses a strict `HH:MM` time of day.
///
/// # Errors
///
/// Returns `SchedulerError::InvalidTime` for anything else.
pub fn parse_time(input: &str) -> Result<NaiveTime, SchedulerError> {
    let invalid = || SchedulerError::InvalidTime(input.to_string());

    let (hours, minutes) = input.trim().split_once(':').ok_or_else(invalid)?;
    let is_field = |s: &str| (1..=2).contains(&s.len()) && s.bytes().all(|b| b.is_ascii_digit());
    if !is_field(hours) || minutes.len() != 2 || !is_field(minutes) {
        return Err(invalid());
    }

    let hours: u32 = hours.parse().map_err(|_| invalid())?;
    let minutes: u32 = minutes.parse().map_err(|_| invalid())?;
    NaiveTime::from_hms_opt(hours, minutes, 0).ok_or_else(invalid)
}

/// Returns the next instant at `time` of day, strictly after `now`.
///
/// Seconds are zero. A time that has already passed today (or is exactly
/// now) rolls to tomorrow. Local times skipped by a DST transition move
/// forward by the gap.
pub fn next_occurrence<Tz: TimeZone>(time: NaiveTime, now: &DateTime<Tz>) -> DateTime<Tz> {
    let tz = now.timezone();
    let mut date = now.date_naive();

    for _ in 0..3 {
        let candidate = date.and_time(time);
        let resolved = match tz.from_local_datetime(&candidate) {
            LocalResult::Single(dt) => Some(dt),
            LocalResult::Ambiguous(earliest, _) => Some(earliest),
            LocalResult::None => tz
                .from_local_datetime(&(candidate + TimeDelta::hours(1)))
                .earliest(),
        };
        if let Some(target) = resolved {
            if target > *now {
                return target;
            }
        }
        date = date.succ_opt().unwrap_or(date);
    }

    now.clone() + TimeDelta::days(1)
}

// ============================================================================
// WakeTimer
// ============================================================================

/// A wake timer implementation.
pub trait WakeTimer: Send + Sync {
    /// Precision reported on armed requests.
    fn precision(&self) -> TimerPrecision;

    /// Instant the timer actually fires for a requested target.
    fn fire_at(&self, target: DateTime<Local>) -> DateTime<Local>;
}

/// Fires at the target instant.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExactTimer;

impl WakeTimer for ExactTimer {
    fn precision(&self) -> TimerPrecision {
        TimerPrecision::Exact
    }

    fn fire_at(&self, target: DateTime<Local>) -> DateTime<Local> {
        target
    }
}

/// Batches firing to whole-minute window boundaries.
#[derive(Debug, Default, Clone, Copy)]
pub struct BestEffortTimer;

impl WakeTimer for BestEffortTimer {
    fn precision(&self) -> TimerPrecision {
        TimerPrecision::BestEffort
    }

    fn fire_at(&self, target: DateTime<Local>) -> DateTime<Local> {
        if target.second() == 0 && target.nanosecond() == 0 {
            return target;
        }
        let floored = target
            .with_second(0)
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(target);
        floored + TimeDelta::minutes(1)
    }
}

// ============================================================================
// AlarmScheduler
// ============================================================================

struct ArmedTimer {
    request: AlarmRequest,
    generation: u64,
    handle: AbortHandle,
}

type TimerTable = Arc<Mutex<HashMap<u32, ArmedTimer>>>;

/// Arms and cancels alarm timers keyed by request code.
///
/// Timers are tokio tasks and must be armed from within a runtime. They
/// are not persisted; a daemon restart loses them.
pub struct AlarmScheduler {
    clock: Arc<dyn Clock>,
    capabilities: Arc<dyn Capabilities>,
    signal_tx: SignalSender,
    timers: TimerTable,
    next_generation: AtomicU64,
}

impl AlarmScheduler {
    pub fn new(
        clock: Arc<dyn Clock>,
        capabilities: Arc<dyn Capabilities>,
        signal_tx: SignalSender,
    ) -> Self {
        Self {
            clock,
            capabilities,
            signal_tx,
            timers: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(1),
        }
    }

    /// Whether the next alarm will be armed with an exact timer.
    #[must_use]
    pub fn can_schedule_exact(&self) -> bool {
        self.capabilities.can_schedule_exact()
    }

    /// Arms `slot` for the next occurrence of `time`, replacing any alarm
    /// armed under `request_code`.
    pub fn schedule(&self, slot: Slot, time: NaiveTime, request_code: u32) -> AlarmRequest {
        let target = next_occurrence(time, &self.clock.now());
        self.arm_at(slot, request_code, target)
    }

    /// Arms an alarm for an explicit target, replacing any alarm armed
    /// under `request_code`.
    pub fn arm_at(&self, slot: Slot, request_code: u32, target: DateTime<Local>) -> AlarmRequest {
        let timer: &dyn WakeTimer = if self.capabilities.can_schedule_exact() {
            &ExactTimer
        } else {
            warn!("Exact alarms not permitted, arming {} as best-effort", slot);
            &BestEffortTimer
        };

        let request = AlarmRequest {
            slot,
            request_code,
            target,
            precision: timer.precision(),
        };
        let fire_at = timer.fire_at(target);
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);

        // Held across spawn so a timer with a past target cannot fire
        // before it is registered.
        let mut timers = lock(&self.timers);

        let task = tokio::spawn(run_timer(
            Arc::clone(&self.clock),
            Arc::clone(&self.timers),
            self.signal_tx.clone(),
            slot,
            request_code,
            generation,
            fire_at,
        ));

        let previous = timers.insert(
            request_code,
            ArmedTimer {
                request: request.clone(),
                generation,
                handle: task.abort_handle(),
            },
        );
        if let Some(previous) = previous {
            previous.handle.abort();
            debug!(
                "Replaced alarm {} (was {})",
                request_code, previous.request.target
            );
        }

        info!(
            "Armed {} alarm {} for {} ({})",
            slot,
            request_code,
            target.format("%Y-%m-%d %H:%M:%S"),
            request.precision.as_str()
        );

        request
    }

    /// Cancels the alarm armed under `request_code`.
    ///
    /// Returns false (and does nothing) if none is armed.
    pub fn cancel(&self, request_code: u32) -> bool {
        match lock(&self.timers).remove(&request_code) {
            Some(armed) => {
                armed.handle.abort();
                info!("Cancelled alarm {} ({})", request_code, armed.request.slot);
                true
            }
            None => {
                debug!("No alarm armed under {}", request_code);
                false
            }
        }
    }

    /// Cancels every armed alarm.
    pub fn cancel_all(&self) {
        let mut timers = lock(&self.timers);
        for (_, armed) in timers.drain() {
            armed.handle.abort();
        }
    }

    /// Returns the alarm armed under `request_code`.
    #[must_use]
    pub fn get(&self, request_code: u32) -> Option<AlarmRequest> {
        lock(&self.timers)
            .get(&request_code)
            .map(|armed| armed.request.clone())
    }

    /// Lists armed alarms sorted by target.
    #[must_use]
    pub fn pending(&self) -> Vec<AlarmRequest> {
        let mut requests: Vec<AlarmRequest> = lock(&self.timers)
            .values()
            .map(|armed| armed.request.clone())
            .collect();
        requests.sort_by_key(|request| (request.target, request.request_code));
        requests
    }
}

impl Drop for AlarmScheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

impl std::fmt::Debug for AlarmScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlarmScheduler")
            .field("pending", &self.pending())
            .finish_non_exhaustive()
    }
}

fn lock(timers: &TimerTable) -> MutexGuard<'_, HashMap<u32, ArmedTimer>> {
    timers.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn run_timer(
    clock: Arc<dyn Clock>,
    timers: TimerTable,
    signal_tx: SignalSender,
    slot: Slot,
    request_code: u32,
    generation: u64,
    fire_at: DateTime<Local>,
) {
    // Re-read the wall clock in chunks so system sleep and clock changes
    // do not stretch the wait.
    loop {
        let remaining = fire_at - clock.now();
        let Ok(remaining) = remaining.to_std() else {
            break;
        };
        if remaining.is_zero() {
            break;
        }
        tokio::time::sleep(remaining.min(MAX_SLEEP_CHUNK)).await;
    }

    {
        let mut table = lock(&timers);
        let current = table
            .get(&request_code)
            .is_some_and(|armed| armed.generation == generation);
        if !current {
            return;
        }
        table.remove(&request_code);
    }

    info!("Alarm {} fired for {}", request_code, slot);
    if signal_tx
        .send(Signal::TimerFired { slot, request_code })
        .is_err()
    {
        warn!("Dispatcher is gone, alarm {} dropped", request_code);
    }
}

// ============================================================================
// Tests
// ============================================================================
