//! Notification delegate implementation.
//!
//! Implements `UNUserNotificationCenterDelegate` and forwards action taps
//! into the dispatcher's signal channel.

use block2::Block;
use objc2::rc::Retained;
use objc2::runtime::ProtocolObject;
use objc2::{define_class, msg_send, DefinedClass, MainThreadMarker, MainThreadOnly};
use objc2_foundation::{NSObject, NSObjectProtocol};
use objc2_user_notifications::{
    UNNotification, UNNotificationPresentationOptions, UNNotificationResponse,
    UNUserNotificationCenter, UNUserNotificationCenterDelegate,
};
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use crate::daemon::Signal;
use crate::notification::actions::NotificationAction;

/// Identifier the system uses when the notification body is tapped.
const DEFAULT_ACTION_IDENTIFIER: &str = "com.apple.UNNotificationDefaultActionIdentifier";

/// Maps a response action identifier to a dispatcher signal.
pub fn signal_for_action(identifier: &str) -> Option<Signal> {
    if identifier == DEFAULT_ACTION_IDENTIFIER {
        return Some(Signal::OpenRequested);
    }
    NotificationAction::from_id(identifier).map(|action| action.signal())
}

/// Instance variables for the notification delegate.
#[derive(Clone)]
pub struct NotificationDelegateIvars {
    /// Dispatcher inbound channel.
    pub signal_sender: UnboundedSender<Signal>,
}

define_class!(
    /// Delegate that handles notification events.
    // SAFETY:
    // - The superclass NSObject does not have any subclassing requirements.
    // - `NotificationDelegate` does not implement `Drop`.
    #[unsafe(super(NSObject))]
    #[ivars = NotificationDelegateIvars]
    #[name = "AdhanNotificationDelegate"]
    #[thread_kind = MainThreadOnly]
    pub struct NotificationDelegate;

    impl NotificationDelegate {}

    unsafe impl NSObjectProtocol for NotificationDelegate {}

    unsafe impl UNUserNotificationCenterDelegate for NotificationDelegate {
        /// Called when a notification is about to be presented while the process is in foreground.
        #[unsafe(method(userNotificationCenter:willPresentNotification:withCompletionHandler:))]
        fn will_present_notification(
            &self,
            _center: &UNUserNotificationCenter,
            _notification: &UNNotification,
            completion_handler: &Block<dyn Fn(UNNotificationPresentationOptions)>,
        ) {
            let options = UNNotificationPresentationOptions::Banner
                | UNNotificationPresentationOptions::List;

            completion_handler.call((options,));
        }

        /// Called when the user interacts with a notification.
        #[unsafe(method(userNotificationCenter:didReceiveNotificationResponse:withCompletionHandler:))]
        fn did_receive_notification_response(
            &self,
            _center: &UNUserNotificationCenter,
            response: &UNNotificationResponse,
            completion_handler: &Block<dyn Fn()>,
        ) {
            let action = response.actionIdentifier().to_string();

            match signal_for_action(&action) {
                Some(signal) => {
                    let _ = self.ivars().signal_sender.send(signal);
                }
                None => debug!("Ignoring notification response '{}'", action),
            }

            completion_handler.call(());
        }
    }
);

impl NotificationDelegate {
    /// Creates a new notification delegate.
    #[must_use]
    pub fn new(mtm: MainThreadMarker, signal_sender: UnboundedSender<Signal>) -> Retained<Self> {
        let ivars = NotificationDelegateIvars { signal_sender };
        let this = Self::alloc(mtm).set_ivars(ivars);
        unsafe { msg_send![super(this), init] }
    }

    /// Converts a retained delegate to a protocol object.
    #[must_use]
    pub fn as_protocol(
        delegate: &Retained<Self>,
    ) -> Retained<ProtocolObject<dyn UNUserNotificationCenterDelegate>> {
        ProtocolObject::from_retained(delegate.clone())
    }
}
