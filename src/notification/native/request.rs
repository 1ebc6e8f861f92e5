//! Native notification objects: categories, content and requests.

use objc2::rc::Retained;
use objc2_foundation::{NSArray, NSString};
use objc2_user_notifications::{
    UNMutableNotificationContent, UNNotificationAction, UNNotificationActionOptions,
    UNNotificationCategory, UNNotificationCategoryOptions, UNNotificationRequest,
};

use crate::notification::actions::NotificationAction;
use crate::notification::content::AdhanNotification;

fn create_action(action: NotificationAction) -> Retained<UNNotificationAction> {
    let identifier = NSString::from_str(action.id());
    let title = NSString::from_str(action.title());
    let options = match action {
        NotificationAction::Open => UNNotificationActionOptions::Foreground,
        NotificationAction::Dismiss => UNNotificationActionOptions::Destructive,
    };

    unsafe { UNNotificationAction::actionWithIdentifier_title_options(&identifier, &title, options) }
}

/// Creates the category standing in for the alarm channel.
#[must_use]
pub fn create_category(identifier: &str) -> Retained<UNNotificationCategory> {
    let identifier = NSString::from_str(identifier);

    let actions: Vec<Retained<UNNotificationAction>> =
        NotificationAction::ALL.into_iter().map(create_action).collect();
    let refs: Vec<&UNNotificationAction> = actions.iter().map(|a| a.as_ref()).collect();
    let actions_array: Retained<NSArray<UNNotificationAction>> =
        unsafe { NSArray::from_slice(&refs) };

    let intent_identifiers: Retained<NSArray<NSString>> =
        unsafe { NSArray::from_slice(&[] as &[&NSString]) };

    unsafe {
        UNNotificationCategory::categoryWithIdentifier_actions_intentIdentifiers_options(
            &identifier,
            &actions_array,
            &intent_identifiers,
            UNNotificationCategoryOptions::CustomDismissAction,
        )
    }
}

/// Builds a request under the notification's stable identifier.
#[must_use]
pub fn create_notification_request(
    notification: &AdhanNotification,
) -> Retained<UNNotificationRequest> {
    let content = unsafe { UNMutableNotificationContent::new() };
    unsafe {
        content.setTitle(&NSString::from_str(&notification.title));
        content.setBody(&NSString::from_str(&notification.body));
        content.setCategoryIdentifier(&NSString::from_str(&notification.channel_id));
    }

    let identifier = NSString::from_str(&notification.identifier);

    UNNotificationRequest::requestWithIdentifier_content_trigger(&identifier, &content, None)
}
