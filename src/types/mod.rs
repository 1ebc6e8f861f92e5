//! Core data types for the Adhan alarm daemon.
//!
//! This module defines the data structures used for:
//! - Prayer slots and their stable request codes
//! - Armed alarm requests
//! - Playback session state
//! - IPC request/response serialization

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

// ============================================================================
// Slot
// ============================================================================

/// Request code used for slot names that do not resolve to a known slot.
pub const DEFAULT_REQUEST_CODE: u32 = 100;

/// A recurring prayer alert occasion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    Fajr,
    Dhuhr,
    Asr,
    Maghrib,
    Isha,
    /// Ad-hoc slot used for diagnostics
    Test,
}

impl Slot {
    /// Every slot, in daily order with the diagnostic slot last.
    pub const ALL: [Slot; 6] = [
        Slot::Fajr,
        Slot::Dhuhr,
        Slot::Asr,
        Slot::Maghrib,
        Slot::Isha,
        Slot::Test,
    ];

    /// Returns the preference key of the slot.
    pub fn as_str(&self) -> &'static str {
        match self {
            Slot::Fajr => "fajr",
            Slot::Dhuhr => "dhuhr",
            Slot::Asr => "asr",
            Slot::Maghrib => "maghrib",
            Slot::Isha => "isha",
            Slot::Test => "test",
        }
    }

    /// Returns the human-readable name shown in notifications.
    pub fn display_name(&self) -> &'static str {
        match self {
            Slot::Fajr => "Fajr",
            Slot::Dhuhr => "Dhuhr",
            Slot::Asr => "Asr",
            Slot::Maghrib => "Maghrib",
            Slot::Isha => "Isha",
            Slot::Test => "Test",
        }
    }

    /// Returns the stable timer key of the slot.
    pub fn request_code(&self) -> u32 {
        match self {
            Slot::Fajr => 100,
            Slot::Dhuhr => 101,
            Slot::Asr => 102,
            Slot::Maghrib => 103,
            Slot::Isha => 104,
            Slot::Test => 105,
        }
    }

    /// Parses a slot name the same way preference keys are normalized.
    ///
    /// `"Fajr"`, `"fajr"` and `"Fajr (Test)"` all resolve to [`Slot::Fajr`].
    pub fn parse(name: &str) -> Option<Slot> {
        let key = normalize_slot_key(name);
        Slot::ALL.into_iter().find(|slot| slot.as_str() == key)
    }

    /// Parses a slot name, falling back to [`Slot::Fajr`] for unknown names.
    pub fn parse_or_default(name: &str) -> Slot {
        Slot::parse(name).unwrap_or_else(|| {
            tracing::warn!("Unknown prayer slot '{}', using {}", name, Slot::Fajr);
            Slot::Fajr
        })
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Slot {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Slot::parse(s).ok_or_else(|| format!("Unknown prayer slot: {}", s))
    }
}

/// Returns the request code for an arbitrary slot name.
///
/// Unknown names fall back to [`DEFAULT_REQUEST_CODE`].
pub fn request_code_for(name: &str) -> u32 {
    Slot::parse(name).map_or(DEFAULT_REQUEST_CODE, |slot| slot.request_code())
}

/// Normalizes a slot name into its preference key.
///
/// Lowercases, drops whitespace and strips any parenthesized annotation,
/// so `"Fajr (Test)"` becomes `"fajr"`.
pub fn normalize_slot_key(name: &str) -> String {
    let base = name.split('(').next().unwrap_or_default();
    base.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

// ============================================================================
// AlarmRequest
// ============================================================================

/// How precisely an armed timer honours its target instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerPrecision {
    /// Fires at the target instant
    Exact,
    /// May be deferred to the next batching window
    BestEffort,
}

impl TimerPrecision {
    /// Returns the string representation of the precision.
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerPrecision::Exact => "exact",
            TimerPrecision::BestEffort => "best_effort",
        }
    }
}

/// An armed future trigger for one slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmRequest {
    /// Slot this alarm belongs to
    pub slot: Slot,
    /// Timer key; at most one request exists per code
    #[serde(rename = "requestCode")]
    pub request_code: u32,
    /// Wall-clock instant the alarm targets
    pub target: DateTime<Local>,
    /// Timer implementation the request was armed with
    pub precision: TimerPrecision,
}

// ============================================================================
// Playback session state
// ============================================================================

/// Represents the state of the audio delivery state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryState {
    /// No session
    #[default]
    Idle,
    /// Sound is being resolved and loaded
    Preparing,
    /// Sound is audible
    Playing,
    /// Session ended naturally or failed to find a sound
    Completed,
    /// Session was stopped by a dismiss signal or replaced
    Dismissed,
}

impl DeliveryState {
    /// Returns the string representation of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryState::Idle => "idle",
            DeliveryState::Preparing => "preparing",
            DeliveryState::Playing => "playing",
            DeliveryState::Completed => "completed",
            DeliveryState::Dismissed => "dismissed",
        }
    }

    /// Returns true if a session currently holds the audio resource.
    pub fn is_active(&self) -> bool {
        matches!(self, DeliveryState::Preparing | DeliveryState::Playing)
    }
}

/// How the most recent playback session ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SessionOutcome {
    /// Played to the end, or never started because no sound resolved
    Completed {
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// Stopped early
    Dismissed,
}

impl SessionOutcome {
    /// Returns the terminal state this outcome corresponds to.
    pub fn state(&self) -> DeliveryState {
        match self {
            SessionOutcome::Completed { .. } => DeliveryState::Completed,
            SessionOutcome::Dismissed => DeliveryState::Dismissed,
        }
    }
}

/// Point-in-time view of the audio delivery service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Current state
    pub state: DeliveryState,
    /// Slot of the active session
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot: Option<Slot>,
    /// Resolved sound of the active session
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sound: Option<String>,
    /// Completed replays of the active session
    #[serde(rename = "loopCount")]
    pub loop_count: u32,
    /// Outcome of the previous session
    #[serde(rename = "lastOutcome", skip_serializing_if = "Option::is_none")]
    pub last_outcome: Option<SessionOutcome>,
}

/// Catalog entry for an Adhan recording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoundInfo {
    /// Sound identifier (file stem)
    pub name: String,
    /// Display label
    pub label: String,
    /// Whether a playable file exists in the sounds directory
    pub installed: bool,
}

// ============================================================================
// IPC Types
// ============================================================================

/// IPC request from client to daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "kebab-case")]
pub enum IpcRequest {
    /// Arm a daily alarm for a slot at `HH:MM`
    Schedule {
        slot: String,
        time: String,
        #[serde(rename = "requestCode", default, skip_serializing_if = "Option::is_none")]
        request_code: Option<u32>,
    },
    /// Cancel the alarm for a slot
    Cancel {
        slot: String,
        #[serde(rename = "requestCode", default, skip_serializing_if = "Option::is_none")]
        request_code: Option<u32>,
    },
    /// Deliver the Adhan right now, bypassing timers
    Trigger { slot: String },
    /// Stop the Adhan and clear its notification
    Dismiss,
    /// Rebuild the notification channel with the selected sound
    UpdateSound,
    /// Query whether precise timers are permitted
    CanScheduleExact,
    /// Query whether power optimization is disabled
    PowerStatus,
    /// Play a sound outside any alarm session
    Preview { sound: String },
    /// Stop the preview
    StopPreview,
    /// List the sound catalog
    Sounds,
    /// Query the daemon state
    Status,
    /// Consume the pending-reschedule flag
    AckReschedule,
    /// Report a system restart
    BootCompleted,
}

/// Response data for IPC responses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseData {
    /// Alarm armed by a schedule request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alarm: Option<AlarmRequest>,
    /// Outstanding alarms
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alarms: Option<Vec<AlarmRequest>>,
    /// Playback session view
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionSnapshot>,
    /// Precise timer capability
    #[serde(rename = "canScheduleExact", skip_serializing_if = "Option::is_none")]
    pub can_schedule_exact: Option<bool>,
    /// Power optimization exemption
    #[serde(
        rename = "powerOptimizationDisabled",
        skip_serializing_if = "Option::is_none"
    )]
    pub power_optimization_disabled: Option<bool>,
    /// Whether the owning application must re-arm every slot
    #[serde(rename = "reschedulePending", skip_serializing_if = "Option::is_none")]
    pub reschedule_pending: Option<bool>,
    /// When the restart that lost the alarms was detected
    #[serde(rename = "rescheduleRaisedAt", skip_serializing_if = "Option::is_none")]
    pub reschedule_raised_at: Option<DateTime<Local>>,
    /// Sound catalog
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sounds: Option<Vec<SoundInfo>>,
}

/// IPC response from daemon to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpcResponse {
    /// Response status ("success" or "error")
    pub status: String,
    /// Human-readable message
    pub message: String,
    /// Optional response data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ResponseData>,
}

impl IpcResponse {
    /// Creates a success response.
    pub fn success(message: impl Into<String>, data: Option<ResponseData>) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
            data,
        }
    }

    /// Creates an error response.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            data: None,
        }
    }

    /// Returns true if this is an error response.
    pub fn is_error(&self) -> bool {
        self.status == "error"
    }
}

// ============================================================================
// Tests
// ============================================================================
