//! Adhan notification presentation.
//!
//! This module owns the single user-visible alert shown while the Adhan
//! plays. It includes:
//!
//! - The notification content and its two actions (Open, Dismiss)
//! - The sound-bound alarm channel and its rebuild on sound change
//! - Backends: native macOS notifications, a logging fallback and a mock
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use adhan::notification::{MockNotificationBackend, NotificationPresenter};
//! use adhan::types::Slot;
//!
//! let backend = Arc::new(MockNotificationBackend::new());
//! let presenter = NotificationPresenter::new(backend.clone());
//! presenter.present(Slot::Fajr);
//! presenter.cancel();
//! assert_eq!(backend.posted().len(), 1);
//! ```
//!
//! # Requirements (native backend)
//!
//! - macOS 10.14+
//! - The binary must be code-signed for notifications to work properly
//!
//! ```bash
//! codesign --force --deep --sign - target/release/adhan
//! ```

mod actions;
mod content;
pub mod error;
#[cfg(target_os = "macos")]
mod native;

use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, error, info};

use crate::types::Slot;

pub use self::actions::{action_ids, NotificationAction};
pub use self::content::{
    notification_tag, AdhanNotification, NotificationChannel, CHANNEL_ID, CHANNEL_NAME,
    NOTIFICATION_ID,
};
pub use self::error::NotificationError;
#[cfg(target_os = "macos")]
pub use self::native::{NativeNotificationGuard, UserNotificationBackend};

/// Platform notification surface.
///
/// Calls return once the request is handed to the platform; delivery
/// failures after that point are logged by the backend.
pub trait NotificationBackend: Send + Sync {
    /// Creates the alarm channel.
    fn create_channel(&self, channel: &NotificationChannel) -> Result<(), NotificationError>;

    /// Deletes a channel. Deleting a missing channel succeeds.
    fn delete_channel(&self, channel_id: &str) -> Result<(), NotificationError>;

    /// Posts a notification, replacing any with the same identifier.
    fn post(&self, notification: &AdhanNotification) -> Result<(), NotificationError>;

    /// Removes a notification. Removing a missing one succeeds.
    fn cancel(&self, identifier: &str) -> Result<(), NotificationError>;
}

// ============================================================================
// NotificationPresenter
// ============================================================================

/// Builds, replaces and removes the single Adhan notification.
///
/// Every failure is logged and swallowed.
pub struct NotificationPresenter {
    backend: Arc<dyn NotificationBackend>,
    channel: Mutex<Option<NotificationChannel>>,
}

impl NotificationPresenter {
    pub fn new(backend: Arc<dyn NotificationBackend>) -> Self {
        Self {
            backend,
            channel: Mutex::new(None),
        }
    }

    /// Creates the channel bound to `sound` if none exists yet.
    pub fn ensure_channel(&self, sound: &str) {
        let mut channel = self.lock_channel();
        if channel.is_some() {
            return;
        }
        let created = NotificationChannel::with_sound(sound);
        match self.backend.create_channel(&created) {
            Ok(()) => {
                debug!("Created notification channel bound to '{}'", sound);
                *channel = Some(created);
            }
            Err(e) => error!("Failed to create notification channel: {}", e),
        }
    }

    /// Deletes and recreates the channel bound to `sound`.
    ///
    /// Repeating the call leaves the same single channel. An in-flight
    /// playback session is not touched.
    pub fn rebuild_channel(&self, sound: &str) {
        let mut channel = self.lock_channel();

        if let Err(e) = self.backend.delete_channel(CHANNEL_ID) {
            error!("Failed to delete notification channel: {}", e);
        }
        *channel = None;

        let created = NotificationChannel::with_sound(sound);
        match self.backend.create_channel(&created) {
            Ok(()) => {
                info!("Notification channel rebuilt with sound '{}'", sound);
                *channel = Some(created);
            }
            Err(e) => error!("Failed to recreate notification channel: {}", e),
        }
    }

    /// Returns the sound the channel is currently bound to.
    #[must_use]
    pub fn channel_sound(&self) -> Option<String> {
        self.lock_channel().as_ref().map(|c| c.sound.clone())
    }

    /// Posts the Adhan notification for `slot`, replacing any previous one.
    ///
    /// Returns true if the backend accepted the notification.
    pub fn present(&self, slot: Slot) -> bool {
        let notification = AdhanNotification::for_slot(slot);
        match self.backend.post(&notification) {
            Ok(()) => {
                info!("Posted notification '{}'", notification.title);
                true
            }
            Err(e) => {
                error!("Failed to post notification for {}: {}", slot, e);
                false
            }
        }
    }

    /// Removes the Adhan notification. Idempotent.
    pub fn cancel(&self) {
        if let Err(e) = self.backend.cancel(&notification_tag()) {
            error!("Failed to cancel notification: {}", e);
        }
    }

    fn lock_channel(&self) -> std::sync::MutexGuard<'_, Option<NotificationChannel>> {
        self.channel.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for NotificationPresenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationPresenter")
            .field("channel", &*self.lock_channel())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// LogNotificationBackend
// ============================================================================

/// Backend that writes notifications to the log.
///
/// Used when the native notification center is unavailable.
#[derive(Debug, Default)]
pub struct LogNotificationBackend;

impl NotificationBackend for LogNotificationBackend {
    fn create_channel(&self, channel: &NotificationChannel) -> Result<(), NotificationError> {
        info!("[notification] channel '{}' -> sound '{}'", channel.id, channel.sound);
        Ok(())
    }

    fn delete_channel(&self, channel_id: &str) -> Result<(), NotificationError> {
        debug!("[notification] channel '{}' deleted", channel_id);
        Ok(())
    }

    fn post(&self, notification: &AdhanNotification) -> Result<(), NotificationError> {
        info!(
            "[notification] {}: {} ({})",
            notification.identifier, notification.title, notification.body
        );
        Ok(())
    }

    fn cancel(&self, identifier: &str) -> Result<(), NotificationError> {
        info!("[notification] {} cleared", identifier);
        Ok(())
    }
}

// ============================================================================
// MockNotificationBackend
// ============================================================================

/// Call recorded by [`MockNotificationBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationCall {
    CreateChannel(NotificationChannel),
    DeleteChannel(String),
    Post(AdhanNotification),
    Cancel(String),
}

/// Mock notification backend for testing.
///
/// Tracks the visible notification and channel so tests can assert on the
/// resulting state as well as on the call sequence.
#[derive(Debug, Default)]
pub struct MockNotificationBackend {
    calls: std::sync::Mutex<Vec<NotificationCall>>,
    visible: std::sync::Mutex<Option<AdhanNotification>>,
    channels: std::sync::Mutex<Vec<NotificationChannel>>,
    should_fail: std::sync::atomic::AtomicBool,
}

impl MockNotificationBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_should_fail(&self, should_fail: bool) {
        self.should_fail
            .store(should_fail, std::sync::atomic::Ordering::SeqCst);
    }

    #[must_use]
    pub fn calls(&self) -> Vec<NotificationCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Notifications posted so far, in order.
    #[must_use]
    pub fn posted(&self) -> Vec<AdhanNotification> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|call| match call {
                NotificationCall::Post(n) => Some(n.clone()),
                _ => None,
            })
            .collect()
    }

    /// The notification currently on screen.
    #[must_use]
    pub fn visible(&self) -> Option<AdhanNotification> {
        self.visible.lock().unwrap().clone()
    }

    /// Channels currently registered.
    #[must_use]
    pub fn channels(&self) -> Vec<NotificationChannel> {
        self.channels.lock().unwrap().clone()
    }

    pub fn clear_recorded(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, call: NotificationCall) -> Result<(), NotificationError> {
        if self.should_fail.load(std::sync::atomic::Ordering::SeqCst) {
            let reason = "Mock failure".to_string();
            return Err(match call {
                NotificationCall::CreateChannel(_) | NotificationCall::DeleteChannel(_) => {
                    NotificationError::ChannelFailed(reason)
                }
                NotificationCall::Post(_) | NotificationCall::Cancel(_) => {
                    NotificationError::SendFailed(reason)
                }
            });
        }
        self.calls.lock().unwrap().push(call);
        Ok(())
    }
}

impl NotificationBackend for MockNotificationBackend {
    fn create_channel(&self, channel: &NotificationChannel) -> Result<(), NotificationError> {
        self.record(NotificationCall::CreateChannel(channel.clone()))?;
        let mut channels = self.channels.lock().unwrap();
        channels.retain(|c| c.id != channel.id);
        channels.push(channel.clone());
        Ok(())
    }

    fn delete_channel(&self, channel_id: &str) -> Result<(), NotificationError> {
        self.record(NotificationCall::DeleteChannel(channel_id.to_string()))?;
        self.channels.lock().unwrap().retain(|c| c.id != channel_id);
        Ok(())
    }

    fn post(&self, notification: &AdhanNotification) -> Result<(), NotificationError> {
        self.record(NotificationCall::Post(notification.clone()))?;
        *self.visible.lock().unwrap() = Some(notification.clone());
        Ok(())
    }

    fn cancel(&self, identifier: &str) -> Result<(), NotificationError> {
        self.record(NotificationCall::Cancel(identifier.to_string()))?;
        let mut visible = self.visible.lock().unwrap();
        if visible.as_ref().is_some_and(|n| n.identifier == identifier) {
            *visible = None;
        }
        Ok(())
    }
}
