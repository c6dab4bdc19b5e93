use std::time::Duration;

use esim_common::Secret;
use esim_engine::notifications::{low_data_notification, low_data_payload, NotificationError, PushNotifier};
use esim_vendors::{FcmConfig, FcmPushNotifier};
use httpmock::prelude::*;
use serde_json::json;

fn notifier(server: &MockServer) -> FcmPushNotifier {
    let config = FcmConfig {
        base_url: server.base_url(),
        project_id: "esim-app".into(),
        access_token: Secret::from("ya29.token"),
        timeout: Duration::from_secs(5),
    };
    FcmPushNotifier::new(config).expect("Error creating notifier")
}

#[tokio::test]
async fn messages_are_delivered() {
    let server = MockServer::start_async().await;
    let send = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/projects/esim-app/messages:send")
            .header("Authorization", "Bearer ya29.token")
            .json_body_partial(r#"{"message": {"token": "device-1", "data": {"type": "low_data", "level": "80"}}}"#);
        then.status(200).json_body(json!({"name": "projects/esim-app/messages/1"}));
    });
    let notifier = notifier(&server);
    notifier.send("device-1", &low_data_notification(80), &low_data_payload(80, "8901")).await.unwrap();
    send.assert_hits(1);
}

#[tokio::test]
async fn dead_tokens_are_reported() {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(POST).path("/v1/projects/esim-app/messages:send");
        then.status(404).json_body(json!({"error": {"status": "NOT_FOUND", "details": [{"errorCode": "UNREGISTERED"}]}}));
    });
    let notifier = notifier(&server);
    let err = notifier.send("stale", &low_data_notification(90), &low_data_payload(90, "8901")).await.unwrap_err();
    assert!(matches!(err, NotificationError::InvalidToken(_)));
}

#[tokio::test]
async fn empty_tokens_never_reach_the_network() {
    let server = MockServer::start_async().await;
    let send = server.mock(|when, then| {
        when.method(POST).path("/v1/projects/esim-app/messages:send");
        then.status(200).json_body(json!({}));
    });
    let notifier = notifier(&server);
    let err = notifier.send(" ", &low_data_notification(80), &low_data_payload(80, "8901")).await.unwrap_err();
    assert!(matches!(err, NotificationError::InvalidToken(_)));
    send.assert_hits(0);
}

#[tokio::test]
async fn server_errors_are_rejections() {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(POST).path("/v1/projects/esim-app/messages:send");
        then.status(500).body("internal");
    });
    let notifier = notifier(&server);
    let err = notifier.send("device-1", &low_data_notification(80), &low_data_payload(80, "8901")).await.unwrap_err();
    assert!(matches!(err, NotificationError::Rejected { status: 500, .. }));
}
