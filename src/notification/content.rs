//! Notification content construction.
//!
//! Platform-independent description of the Adhan notification and of the
//! channel it is posted on. Backends translate these into native objects.

use super::actions::NotificationAction;
use crate::types::Slot;

/// Identifier shared by every Adhan notification.
pub const NOTIFICATION_ID: u32 = 2000;

/// Identifier of the alarm notification channel.
pub const CHANNEL_ID: &str = "adhan_notifications";

/// Display name of the alarm notification channel.
pub const CHANNEL_NAME: &str = "Adhan Notifications";

/// Returns the rendered notification identifier (`adhan-2000`).
#[must_use]
pub fn notification_tag() -> String {
    format!("adhan-{}", NOTIFICATION_ID)
}

/// High-priority alarm channel bound to one sound.
///
/// The binding is immutable: a different sound requires deleting and
/// recreating the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationChannel {
    pub id: String,
    pub name: String,
    pub sound: String,
}

impl NotificationChannel {
    /// Creates the alarm channel bound to `sound`.
    #[must_use]
    pub fn with_sound(sound: impl Into<String>) -> Self {
        Self {
            id: CHANNEL_ID.to_string(),
            name: CHANNEL_NAME.to_string(),
            sound: sound.into(),
        }
    }
}

/// The single user-visible Adhan alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdhanNotification {
    pub identifier: String,
    pub channel_id: String,
    pub slot: Slot,
    pub title: String,
    pub body: String,
    pub actions: Vec<NotificationAction>,
}

impl AdhanNotification {
    /// Builds the notification for a slot.
    #[must_use]
    pub fn for_slot(slot: Slot) -> Self {
        Self {
            identifier: notification_tag(),
            channel_id: CHANNEL_ID.to_string(),
            slot,
            title: format!("🕌 Time for {}", slot.display_name()),
            body: "The Adhan is playing".to_string(),
            actions: NotificationAction::ALL.to_vec(),
        }
    }
}
