//! Notification system error types.
//!
//! Notification failures are transient platform errors from the alarm
//! core's perspective: they are logged and never abort delivery or the
//! daily reschedule.

use thiserror::Error;

/// Errors that can occur in the notification system.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// Failed to request notification authorization from the system.
    #[error("Failed to request notification authorization: {0}")]
    AuthorizationFailed(String),

    /// Failed to post or remove a notification.
    #[error("Failed to send notification: {0}")]
    SendFailed(String),

    /// Failed to create or delete the notification channel.
    #[error("Failed to configure notification channel: {0}")]
    ChannelFailed(String),

    /// Notification permission was denied by the user.
    #[error("Notification permission denied")]
    PermissionDenied,

    /// Failed to initialize the notification system.
    #[error("Failed to initialize notifications: {0}")]
    InitializationFailed(String),

    /// The notification center is not available.
    #[error("Notification center not available")]
    NotAvailable,
}

impl NotificationError {
    /// Returns true if this error is related to permissions.
    #[must_use]
    pub fn is_permission_error(&self) -> bool {
        matches!(self, Self::PermissionDenied | Self::AuthorizationFailed(_))
    }

    /// Returns a user-friendly suggestion for resolving this error.
    #[must_use]
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::AuthorizationFailed(_) | Self::PermissionDenied => {
                "Allow notifications in System Settings > Notifications"
            }
            Self::SendFailed(_) | Self::ChannelFailed(_) => "Check the notification center",
            Self::InitializationFailed(_) => "Restart the daemon",
            Self::NotAvailable => "Notifications are logged instead",
        }
    }
}
