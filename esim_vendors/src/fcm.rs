use std::collections::BTreeMap;

use async_trait::async_trait;
use esim_engine::notifications::{NotificationError, PushNotification, PushNotifier};
use log::*;
use reqwest::Method;
use serde_json::Value;

use crate::{
    data_objects::{FcmMessage, FcmNotification, FcmRequest},
    FcmConfig,
    VendorApi,
    VendorApiError,
};

/// Sends push messages through the Firebase Cloud Messaging HTTP v1 API.
pub struct FcmPushNotifier {
    config: FcmConfig,
    api: VendorApi,
}

impl FcmPushNotifier {
    pub fn new(config: FcmConfig) -> Result<Self, VendorApiError> {
        let api = VendorApi::new(&config.base_url, config.timeout)?;
        Ok(Self { config, api })
    }
}

/// FCM reports dead registrations as 404 `UNREGISTERED`, or 400 `INVALID_ARGUMENT` for malformed tokens.
fn is_token_rejection(status: u16, message: &str) -> bool {
    status == 404 || message.contains("UNREGISTERED") || message.contains("INVALID_ARGUMENT")
}

#[async_trait]
impl PushNotifier for FcmPushNotifier {
    async fn send(
        &self,
        token: &str,
        notification: &PushNotification,
        data: &BTreeMap<String, String>,
    ) -> Result<(), NotificationError> {
        if token.trim().is_empty() {
            return Err(NotificationError::InvalidToken("empty push token".into()));
        }
        let body = FcmRequest {
            message: FcmMessage {
                token,
                notification: FcmNotification { title: &notification.title, body: &notification.body },
                data,
            },
        };
        let path = format!("/v1/projects/{}/messages:send", self.config.project_id);
        let req = self.api.request(Method::POST, &path).bearer_auth(self.config.access_token.reveal()).json(&body);
        match self.api.send::<Value>(req).await {
            Ok(response) => {
                trace!("📲️ FCM accepted message {:?}", response.get("name"));
                Ok(())
            },
            Err(VendorApiError::QueryError { status, message }) if is_token_rejection(status, &message) => {
                debug!("📲️ FCM rejected the push token. {status}: {message}");
                Err(NotificationError::InvalidToken(message))
            },
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn token_rejections() {
        assert!(is_token_rejection(404, ""));
        assert!(is_token_rejection(400, r#"{"error":{"status":"INVALID_ARGUMENT"}}"#));
        assert!(!is_token_rejection(500, "internal"));
        assert!(!is_token_rejection(401, "UNAUTHENTICATED"));
    }
}
