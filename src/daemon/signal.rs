//! Inbound dispatcher signals.

use tokio::sync::mpsc;

use crate::types::Slot;

/// Event delivered to the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    /// An armed alarm reached its target.
    TimerFired {
        /// Slot of the alarm
        slot: Slot,
        /// Timer key the alarm was armed under
        request_code: u32,
    },
    /// The user asked to stop the Adhan.
    DismissRequested,
    /// The user tapped the notification body or its Open action.
    OpenRequested,
    /// The system restarted and every timer is gone.
    BootCompleted,
}

impl Signal {
    /// Short name used in logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Signal::TimerFired { .. } => "timer-fired",
            Signal::DismissRequested => "dismiss-requested",
            Signal::OpenRequested => "open-requested",
            Signal::BootCompleted => "boot-completed",
        }
    }
}

/// Sending half of the dispatcher channel.
pub type SignalSender = mpsc::UnboundedSender<Signal>;

/// Receiving half of the dispatcher channel.
pub type SignalReceiver = mpsc::UnboundedReceiver<Signal>;

/// Creates the dispatcher channel.
#[must_use]
pub fn signal_channel() -> (SignalSender, SignalReceiver) {
    mpsc::unbounded_channel()
}
