use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum NotificationError {
    #[error("The push token was rejected: {0}")]
    InvalidToken(String),
    #[error("The push service refused the message ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("Could not reach the push service: {0}")]
    Transport(String),
}

/// The user-visible part of a push message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushNotification {
    pub title: String,
    pub body: String,
}

impl PushNotification {
    pub fn new<S: Into<String>>(title: S, body: S) -> Self {
        Self { title: title.into(), body: body.into() }
    }
}

/// Delivers push messages to a single device.
#[async_trait]
pub trait PushNotifier: Send + Sync {
    async fn send(
        &self,
        token: &str,
        notification: &PushNotification,
        data: &BTreeMap<String, String>,
    ) -> Result<(), NotificationError>;
}

/// The data payload of a low-data notification: `{type: "low_data", level, iccid}`.
pub fn low_data_payload(level: i64, iccid: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("type".to_string(), "low_data".to_string()),
        ("level".to_string(), level.to_string()),
        ("iccid".to_string(), iccid.to_string()),
    ])
}

pub fn low_data_notification(level: i64) -> PushNotification {
    let body = if level >= 95 {
        format!("You have used {level}% of your data. Top up now to stay connected.")
    } else {
        format!("You have used {level}% of your data plan.")
    };
    PushNotification::new("Data usage alert".to_string(), body)
}
