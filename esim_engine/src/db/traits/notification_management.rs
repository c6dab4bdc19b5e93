use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::StorageError;
use crate::db_types::UserNotificationState;

#[async_trait]
pub trait NotificationStateManagement: Clone + Send + Sync + 'static {
    async fn fetch_notification_state(&self, user_id: &str) -> Result<Option<UserNotificationState>, StorageError>;

    /// Sets the user's push token and opt-in flag, leaving the low-data history untouched.
    async fn upsert_notification_preferences(
        &self,
        user_id: &str,
        fcm_token: Option<String>,
        notify_low_data: bool,
    ) -> Result<UserNotificationState, StorageError>;

    /// Records a delivered low-data notification. Must only be called after the push was sent.
    async fn record_low_data_notification(
        &self,
        user_id: &str,
        level: i64,
        notified_at: DateTime<Utc>,
    ) -> Result<(), StorageError>;
}
