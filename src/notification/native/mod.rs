//! Native macOS notifications via `objc2-user-notifications`.
//!
//! The alarm channel maps onto a registered notification category carrying
//! the Open/Dismiss actions. The delegate must stay alive on the main
//! thread, so it is owned by [`NativeNotificationGuard`] rather than by the
//! `Send` backend.

mod center;
mod delegate;
mod request;

use std::sync::{Mutex, PoisonError};

use objc2::rc::Retained;
use objc2::MainThreadMarker;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};

use self::center::NotificationCenter;
use self::delegate::NotificationDelegate;
use self::request::{create_category, create_notification_request};
use super::{AdhanNotification, NotificationBackend, NotificationChannel, NotificationError};
use crate::daemon::Signal;

/// Keeps the notification delegate registered. Drop it to stop routing
/// action taps.
pub struct NativeNotificationGuard {
    _delegate: Retained<NotificationDelegate>,
}

/// Backend posting through `UNUserNotificationCenter`.
#[derive(Debug, Default)]
pub struct UserNotificationBackend {
    channel: Mutex<Option<NotificationChannel>>,
}

impl UserNotificationBackend {
    /// Requests authorization and installs the delegate.
    ///
    /// Must be called on the main thread.
    ///
    /// # Errors
    ///
    /// Returns an error if not on the main thread or if authorization is
    /// denied.
    pub async fn initialize(
        signal_sender: UnboundedSender<Signal>,
    ) -> Result<(Self, NativeNotificationGuard), NotificationError> {
        let mtm = MainThreadMarker::new().ok_or_else(|| {
            NotificationError::InitializationFailed(
                "notifications must be initialized on the main thread".to_string(),
            )
        })?;

        let granted = NotificationCenter::request_authorization().await?;
        if !granted {
            return Err(NotificationError::PermissionDenied);
        }

        let delegate = NotificationDelegate::new(mtm, signal_sender);
        NotificationCenter::set_delegate(&NotificationDelegate::as_protocol(&delegate));

        Ok((Self::default(), NativeNotificationGuard { _delegate: delegate }))
    }

    /// Like [`UserNotificationBackend::initialize`], returning `None` with
    /// the reason logged when the native center cannot be used.
    pub async fn initialize_with_fallback(
        signal_sender: UnboundedSender<Signal>,
    ) -> Option<(Self, NativeNotificationGuard)> {
        match Self::initialize(signal_sender).await {
            Ok(pair) => Some(pair),
            Err(e) => {
                warn!("Native notifications unavailable: {}", e);
                info!("{}", e.suggestion());
                None
            }
        }
    }
}

impl NotificationBackend for UserNotificationBackend {
    fn create_channel(&self, channel: &NotificationChannel) -> Result<(), NotificationError> {
        if channel.id.is_empty() {
            return Err(NotificationError::ChannelFailed(
                "category identifier must not be empty".to_string(),
            ));
        }
        NotificationCenter::set_notification_categories(&[create_category(&channel.id)]);
        *self.channel.lock().unwrap_or_else(PoisonError::into_inner) = Some(channel.clone());
        Ok(())
    }

    fn delete_channel(&self, _channel_id: &str) -> Result<(), NotificationError> {
        NotificationCenter::set_notification_categories(&[]);
        *self.channel.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }

    fn post(&self, notification: &AdhanNotification) -> Result<(), NotificationError> {
        let request = create_notification_request(notification);
        NotificationCenter::post_request(&request);
        Ok(())
    }

    fn cancel(&self, identifier: &str) -> Result<(), NotificationError> {
        NotificationCenter::remove(identifier);
        Ok(())
    }
}
