use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::StorageError;

/// Builds the durable cursor key for a named job or provider, e.g. `last_airalo_sync_timestamp`.
pub fn cursor_key(name: &str) -> String {
    format!("last_{name}_sync_timestamp")
}

/// Durable key/value settings. The cursors stored here are the only state that must survive a restart.
#[async_trait]
pub trait SettingsStore: Clone + Send + Sync + 'static {
    async fn get_setting(&self, key: &str) -> Result<Option<String>, StorageError>;

    async fn set_setting(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Reads a cursor written by [`Self::write_cursor`].
    async fn read_cursor(&self, key: &str) -> Result<Option<DateTime<Utc>>, StorageError> {
        match self.get_setting(key).await? {
            None => Ok(None),
            Some(value) => DateTime::parse_from_rfc3339(value.trim())
                .map(|dt| Some(dt.with_timezone(&Utc)))
                .map_err(|e| StorageError::InvalidData(format!("Cursor {key} holds '{value}'. {e}"))),
        }
    }

    async fn write_cursor(&self, key: &str, at: DateTime<Utc>) -> Result<(), StorageError> {
        self.set_setting(key, &at.to_rfc3339()).await
    }
}
