//! Adhan alarm library
//!
//! Schedules one daily alarm per prayer and delivers the Adhan when it fires:
//! - Wake timers keyed by request code, re-armed for the next day on firing
//! - Audio delivery state machine with volume floor and single loop
//! - Notification channel with the selected sound and a dismiss action
//! - Durable reschedule flag raised on restart
//! - Unix socket IPC between the daemon and the CLI
//! - LaunchAgent management for auto-start at login (macOS only)

pub mod cli;
pub mod config;
pub mod daemon;
pub mod launchagent;
pub mod notification;
pub mod prefs;
pub mod sound;
pub mod types;

pub use config::DaemonConfig;

pub use types::{
    normalize_slot_key, request_code_for, AlarmRequest, DeliveryState, IpcRequest, IpcResponse,
    ResponseData, SessionOutcome, SessionSnapshot, Slot, SoundInfo, TimerPrecision,
};

pub use daemon::{
    AlarmScheduler, AudioDeliveryService, BootRecoveryHandler, Dispatcher, DispatcherParts,
    IpcServer, RequestHandler, Signal,
};

pub use notification::{NotificationBackend, NotificationPresenter};

pub use prefs::{JsonPreferenceStore, PreferenceStore};

pub use sound::{SoundError, SoundLibrary, DEFAULT_SOUND};

pub use launchagent::{install, is_installed, uninstall, AdhanLaunchAgent, LaunchAgentError};
