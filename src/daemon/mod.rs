//! Daemon module for the Adhan alarm.
//!
//! This module contains the core daemon functionality:
//! - `scheduler`: Wake timers keyed by request code
//! - `dispatcher`: Reacts to timer, dismiss and boot signals
//! - `delivery`: Audio playback session state machine
//! - `reschedule`: Next-occurrence computation
//! - `boot`: Durable pending-reschedule flag
//! - `guard`: Wake lock held while an activation runs
//! - `capabilities`: Exact-timer and power-management queries
//! - `ipc`: Unix socket server for the CLI

pub mod boot;
pub mod capabilities;
pub mod delivery;
pub mod dispatcher;
pub mod guard;
pub mod ipc;
pub mod reschedule;
pub mod scheduler;
pub mod signal;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::time::Duration;
use tracing::{error, info, warn};

pub use boot::{BootRecoveryHandler, RESCHEDULE_FLAG_FILE};
pub use capabilities::{Capabilities, MockCapabilities, SystemCapabilities};
pub use delivery::{AudioDeliveryService, DeliveryError, MAX_LOOPS};
pub use dispatcher::{ActivationReport, Dispatcher, DispatcherParts};
pub use guard::{ExecutionGuard, RecordingWakeLock, SystemWakeLock, WakeLock};
pub use ipc::{IpcError, IpcServer, RequestHandler};
pub use scheduler::{
    next_occurrence, parse_time, AlarmScheduler, Clock, FixedClock, SchedulerError, SystemClock,
};
pub use signal::{signal_channel, Signal, SignalReceiver, SignalSender};

use crate::config::DaemonConfig;
use crate::notification::{LogNotificationBackend, NotificationBackend, NotificationPresenter};
use crate::prefs::{JsonPreferenceStore, PreferenceStore};
use crate::sound::{try_create_output, AudioOutput, Previewer, SoftwareAlarmVolume, SoundLibrary};

#[cfg(target_os = "macos")]
type NativeGuard = crate::notification::NativeNotificationGuard;
#[cfg(not(target_os = "macos"))]
type NativeGuard = ();

/// Runs the daemon until SIGINT or SIGTERM.
///
/// # Errors
///
/// Returns an error if the data directory or the socket cannot be set up.
pub async fn run(config: DaemonConfig) -> Result<()> {
    config.validate().map_err(anyhow::Error::msg)?;
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("Failed to create data directory: {:?}", config.data_dir))?;
    info!("Starting Adhan daemon (data dir {:?})", config.data_dir);

    let (signal_tx, signal_rx) = signal_channel();

    let preferences: Arc<dyn PreferenceStore> =
        Arc::new(JsonPreferenceStore::new(&config.preferences_path));
    let library = SoundLibrary::new(&config.sounds_dir);
    let output = try_create_output().map(|output| output as Arc<dyn AudioOutput>);
    if output.is_none() {
        warn!("No audio output; alarms will only notify");
    }
    let capabilities: Arc<dyn Capabilities> =
        Arc::new(SystemCapabilities::new(config.exact_alarms_allowed));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // Keeps the native delegate alive on this thread.
    let (backend, _native_guard) = create_notification_backend(signal_tx.clone()).await;
    let presenter = Arc::new(NotificationPresenter::new(backend));
    presenter.ensure_channel(preferences.snapshot().sound_or_default());

    let dispatcher = Arc::new(Dispatcher::new(DispatcherParts {
        scheduler: Arc::new(AlarmScheduler::new(
            Arc::clone(&clock),
            Arc::clone(&capabilities),
            signal_tx.clone(),
        )),
        delivery: Arc::new(AudioDeliveryService::new(
            library.clone(),
            output.clone(),
            Arc::new(SoftwareAlarmVolume::new(
                config.alarm_volume_level,
                config.alarm_volume_max,
            )),
            Arc::clone(&preferences),
        )),
        presenter,
        preferences,
        boot: BootRecoveryHandler::new(config.reschedule_flag_path()),
        wake_lock: Arc::new(SystemWakeLock::new()),
        clock,
        capabilities,
        previewer: Previewer::new(library.clone(), output),
        library,
        guard_timeout: Duration::from_secs(config.wake_lock_timeout_secs),
    }));

    let server = IpcServer::new(&config.socket_path)?;
    let handler = RequestHandler::new(Arc::clone(&dispatcher));
    info!("Listening on {:?}", server.socket_path());

    // The timer table starts empty, exactly as after a reboot.
    if signal_tx.send(Signal::BootCompleted).is_err() {
        warn!("Dispatcher channel closed before startup");
    }
    drop(signal_tx);

    tokio::select! {
        () = Arc::clone(&dispatcher).run(signal_rx) => warn!("Dispatcher stopped"),
        () = server.serve(&handler) => {}
        result = shutdown_signal() => match result {
            Ok(()) => info!("Shutting down"),
            Err(e) => error!("Signal handling failed: {:#}", e),
        },
    }

    dispatcher.shutdown();
    Ok(())
}

#[cfg(target_os = "macos")]
async fn create_notification_backend(
    signal_tx: SignalSender,
) -> (Arc<dyn NotificationBackend>, Option<NativeGuard>) {
    use crate::notification::UserNotificationBackend;

    match UserNotificationBackend::initialize_with_fallback(signal_tx).await {
        Some((backend, guard)) => (Arc::new(backend), Some(guard)),
        None => (Arc::new(LogNotificationBackend), None),
    }
}

#[cfg(not(target_os = "macos"))]
async fn create_notification_backend(
    _signal_tx: SignalSender,
) -> (Arc<dyn NotificationBackend>, Option<NativeGuard>) {
    (Arc::new(LogNotificationBackend), None)
}

async fn shutdown_signal() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate =
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.context("Failed to listen for SIGINT")?,
        _ = terminate.recv() => {}
    }
    Ok(())
}
