//! Dispatcher for inbound signals.
//!
//! Every timer firing, dismiss request and boot event lands here. An
//! activation decides whether to deliver the Adhan, posts the notification
//! and starts playback, then re-arms the slot for its next occurrence. A
//! failed delivery never stops the daily cadence.
//!
//! The notification lives as long as the playback session: dismissing
//! clears both, and a session that completes on its own clears the
//! notification through the delivery completion hook.

use std::sync::Arc;

use serde::Serialize;
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

use super::boot::BootRecoveryHandler;
use super::capabilities::Capabilities;
use super::delivery::{AudioDeliveryService, DeliveryError};
use super::guard::{ExecutionGuard, WakeLock};
use super::reschedule;
use super::scheduler::{AlarmScheduler, Clock};
use super::signal::{Signal, SignalReceiver};
use crate::notification::NotificationPresenter;
use crate::prefs::PreferenceStore;
use crate::sound::{Previewer, SoundLibrary};
use crate::types::{AlarmRequest, Slot};

/// Summary of one dispatcher activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationReport {
    /// Signal that started the activation
    pub signal: &'static str,
    /// Whether audio delivery started
    pub delivered: bool,
    /// Alarm armed for the next occurrence
    pub rescheduled: Option<AlarmRequest>,
    /// Why delivery failed, if it did
    pub delivery_error: Option<String>,
}

impl ActivationReport {
    fn new(signal: &Signal) -> Self {
        Self {
            signal: signal.kind(),
            delivered: false,
            rescheduled: None,
            delivery_error: None,
        }
    }
}

/// Collaborators of the dispatcher.
pub struct DispatcherParts {
    pub scheduler: Arc<AlarmScheduler>,
    pub delivery: Arc<AudioDeliveryService>,
    pub presenter: Arc<NotificationPresenter>,
    pub preferences: Arc<dyn PreferenceStore>,
    pub boot: BootRecoveryHandler,
    pub wake_lock: Arc<dyn WakeLock>,
    pub clock: Arc<dyn Clock>,
    pub capabilities: Arc<dyn Capabilities>,
    pub previewer: Previewer,
    pub library: SoundLibrary,
    pub guard_timeout: Duration,
}

/// Routes signals to the alarm components.
///
/// Shared between the dispatcher loop and the IPC handler through `Arc`.
pub struct Dispatcher {
    scheduler: Arc<AlarmScheduler>,
    delivery: Arc<AudioDeliveryService>,
    presenter: Arc<NotificationPresenter>,
    preferences: Arc<dyn PreferenceStore>,
    boot: BootRecoveryHandler,
    wake_lock: Arc<dyn WakeLock>,
    clock: Arc<dyn Clock>,
    capabilities: Arc<dyn Capabilities>,
    previewer: Previewer,
    library: SoundLibrary,
    guard_timeout: Duration,
}

impl Dispatcher {
    #[must_use]
    pub fn new(parts: DispatcherParts) -> Self {
        let presenter = Arc::clone(&parts.presenter);
        parts.delivery.on_completed(move || presenter.cancel());

        Self {
            scheduler: parts.scheduler,
            delivery: parts.delivery,
            presenter: parts.presenter,
            preferences: parts.preferences,
            boot: parts.boot,
            wake_lock: parts.wake_lock,
            clock: parts.clock,
            capabilities: parts.capabilities,
            previewer: parts.previewer,
            library: parts.library,
            guard_timeout: parts.guard_timeout,
        }
    }

    /// Handles one signal. Must run inside a tokio runtime.
    pub fn handle(&self, signal: Signal) -> ActivationReport {
        debug!("Dispatching {}", signal.kind());
        let mut report = ActivationReport::new(&signal);

        match signal {
            Signal::TimerFired { slot, request_code } => {
                let _guard = ExecutionGuard::acquire(
                    Arc::clone(&self.wake_lock),
                    format!("adhan:{}", slot.as_str()),
                    self.guard_timeout,
                );

                let preferences = self.preferences.snapshot();
                if preferences.is_enabled(slot.as_str()) {
                    match self.deliver(slot, None) {
                        Ok(()) => report.delivered = true,
                        Err(e) => {
                            error!("Adhan delivery for {} failed: {}", slot, e);
                            report.delivery_error = Some(e.to_string());
                        }
                    }
                } else {
                    info!("{} alerts disabled, skipping delivery", slot);
                }

                let next = reschedule::next(slot, &self.clock.now());
                report.rescheduled = Some(self.scheduler.arm_at(slot, request_code, next));
            }
            Signal::DismissRequested => {
                self.presenter.cancel();
                if self.delivery.dismiss() {
                    info!("Adhan dismissed");
                }
            }
            Signal::OpenRequested => {
                info!("Notification opened");
            }
            Signal::BootCompleted => {
                if let Err(e) = self.boot.raise() {
                    error!("Failed to raise reschedule flag: {:#}", e);
                }
            }
        }

        report
    }

    /// Posts the alert, then starts playback. The alert stays up even when
    /// nothing can be played.
    fn deliver(&self, slot: Slot, sound: Option<&str>) -> Result<(), DeliveryError> {
        self.presenter.present(slot);
        self.delivery.start(slot, sound)
    }

    /// Receives signals until every sender is gone.
    pub async fn run(self: Arc<Self>, mut signals: SignalReceiver) {
        while let Some(signal) = signals.recv().await {
            let report = self.handle(signal);
            debug!("Activation finished: {:?}", report);
        }
        debug!("Signal channel closed");
    }

    // ------------------------------------------------------------------------
    // Owner commands
    // ------------------------------------------------------------------------

    /// Delivers the Adhan for `slot` now, regardless of its toggle.
    ///
    /// # Errors
    ///
    /// Returns the delivery error when nothing could be played.
    pub fn trigger_immediately(&self, slot: Slot) -> Result<(), DeliveryError> {
        info!("Triggering {} Adhan now", slot);
        self.deliver(slot, None)
    }

    /// Rebuilds the notification channel for the selected sound.
    pub fn update_sound(&self) -> String {
        let sound = self.preferences.snapshot().sound_or_default().to_string();
        self.presenter.rebuild_channel(&sound);
        sound
    }

    /// Whether alarms will be armed with exact timers.
    #[must_use]
    pub fn can_schedule_exact(&self) -> bool {
        self.scheduler.can_schedule_exact()
    }

    /// Whether power optimization is disabled for the daemon.
    #[must_use]
    pub fn is_power_optimization_disabled(&self) -> bool {
        let disabled = self.capabilities.is_power_optimization_disabled();
        if !disabled {
            warn!("Power management may delay alarms");
        }
        disabled
    }

    pub fn scheduler(&self) -> &AlarmScheduler {
        &self.scheduler
    }

    pub fn delivery(&self) -> &AudioDeliveryService {
        &self.delivery
    }

    pub fn boot(&self) -> &BootRecoveryHandler {
        &self.boot
    }

    pub fn previewer(&self) -> &Previewer {
        &self.previewer
    }

    pub fn library(&self) -> &SoundLibrary {
        &self.library
    }

    /// Releases the active session and disarms every alarm.
    pub fn shutdown(&self) {
        self.previewer.stop();
        self.delivery.shutdown();
        self.presenter.cancel();
        self.scheduler.cancel_all();
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("scheduler", &self.scheduler)
            .field("delivery", &self.delivery)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
