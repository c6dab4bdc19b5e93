mod push;
mod usage_notifier;

pub use push::{low_data_notification, low_data_payload, NotificationError, PushNotification, PushNotifier};
pub use usage_notifier::{
    crossed_level,
    should_notify,
    NotificationReport,
    UsageThresholdNotifier,
    LOW_DATA_THRESHOLDS,
    RENOTIFY_AFTER_HOURS,
    USAGE_NOTIFICATION_JOB_NAME,
};
