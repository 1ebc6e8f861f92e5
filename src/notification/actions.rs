//! Notification action definitions.
//!
//! The Adhan notification carries exactly two actions. Each one routes to a
//! distinct dispatcher signal.

use crate::daemon::Signal;

/// Notification action identifiers.
pub mod action_ids {
    /// Action ID for opening the owning application.
    pub const OPEN: &str = "OPEN_ADHAN";
    /// Action ID for stopping the Adhan.
    pub const DISMISS: &str = "DISMISS_ADHAN";
}

/// A button on the Adhan notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationAction {
    Open,
    Dismiss,
}

impl NotificationAction {
    /// Every action, in display order.
    pub const ALL: [NotificationAction; 2] = [NotificationAction::Open, NotificationAction::Dismiss];

    /// Returns the routing identifier.
    #[must_use]
    pub fn id(&self) -> &'static str {
        match self {
            Self::Open => action_ids::OPEN,
            Self::Dismiss => action_ids::DISMISS,
        }
    }

    /// Returns the button title.
    #[must_use]
    pub fn title(&self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::Dismiss => "Dismiss",
        }
    }

    /// Resolves a routing identifier.
    #[must_use]
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.id() == id)
    }

    /// Returns the signal the action delivers to the dispatcher.
    #[must_use]
    pub fn signal(&self) -> Signal {
        match self {
            Self::Open => Signal::OpenRequested,
            Self::Dismiss => Signal::DismissRequested,
        }
    }
}
