use std::time::Duration;

use chrono::Utc;
use esim_common::{Cents, Secret};
use esim_engine::{
    adapters::{PaymentGateway, PaymentGatewayError, PaymentIntentRequest, RefundRequest},
    db_types::{PaymentGatewayConfig, PaymentStatus},
};
use esim_vendors::{helpers::sign_payload, StripeConfig, StripeGateway};
use httpmock::prelude::*;
use serde_json::json;

const WEBHOOK_SECRET: &str = "whsec_test_secret";

fn gateway(server: &MockServer) -> StripeGateway {
    let config = PaymentGatewayConfig::new("stripe", "Stripe").with_currencies(&["usd", "eur"]);
    let stripe = StripeConfig {
        base_url: server.base_url(),
        secret_key: Secret::from("sk_test_123"),
        webhook_secret: Secret::from(WEBHOOK_SECRET),
        webhook_tolerance: Duration::from_secs(300),
        timeout: Duration::from_secs(5),
    };
    StripeGateway::new(config, stripe).expect("Error creating gateway")
}

fn signed(payload: &[u8], timestamp: i64) -> String {
    let sig = sign_payload(WEBHOOK_SECRET, timestamp, payload).unwrap();
    format!("t={timestamp},v1={sig}")
}

fn intent_succeeded() -> Vec<u8> {
    serde_json::to_vec(&json!({
        "id": "evt_1",
        "type": "payment_intent.succeeded",
        "data": {"object": {"id": "pi_123", "object": "payment_intent", "status": "succeeded"}}
    }))
    .unwrap()
}

#[tokio::test]
async fn valid_webhooks_are_accepted() {
    let server = MockServer::start_async().await;
    let gateway = gateway(&server);
    let payload = intent_succeeded();
    let result = gateway.validate_webhook(&payload, &signed(&payload, Utc::now().timestamp()));
    assert!(result.is_valid);
    let event = result.event.unwrap();
    assert_eq!(event.id, "evt_1");
    assert_eq!(event.payment_intent_id.as_deref(), Some("pi_123"));
    assert_eq!(event.status, Some(PaymentStatus::Succeeded));
}

#[tokio::test]
async fn tampered_or_stale_webhooks_are_rejected() {
    let server = MockServer::start_async().await;
    let gateway = gateway(&server);
    let payload = intent_succeeded();
    let now = Utc::now().timestamp();

    let header = signed(&payload, now);
    let mut tampered = payload.clone();
    tampered.extend_from_slice(b" ");
    assert!(!gateway.validate_webhook(&tampered, &header).is_valid);

    let stale = signed(&payload, now - 3600);
    assert!(!gateway.validate_webhook(&payload, &stale).is_valid);

    assert!(!gateway.validate_webhook(&payload, "garbage").is_valid);
    let wrong_key = format!("t={now},v1={}", sign_payload("whsec_other", now, &payload).unwrap());
    assert!(!gateway.validate_webhook(&payload, &wrong_key).is_valid);
}

#[tokio::test]
async fn refunds_without_a_charge_are_not_attempted() {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(GET).path("/v1/payment_intents/pi_123");
        then.status(200).json_body(json!({
            "id": "pi_123", "amount": 450, "currency": "usd", "status": "requires_payment_method",
            "client_secret": "secret", "latest_charge": null
        }));
    });
    let refund_mock = server.mock(|when, then| {
        when.method(POST).path("/v1/refunds");
        then.status(200).json_body(json!({"id": "re_1", "status": "succeeded"}));
    });
    let gateway = gateway(&server);
    let req = RefundRequest { payment_intent_id: "pi_123".into(), amount: None, reason: None };
    let result = gateway.process_refund(req).await.expect("refund errored");
    assert!(!result.success);
    assert_eq!(result.error_message.as_deref(), Some("no charge found"));
    refund_mock.assert_hits(0);
}

#[tokio::test]
async fn refunds_are_issued_against_the_intent() {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(GET).path("/v1/payment_intents/pi_123");
        then.status(200).json_body(json!({
            "id": "pi_123", "amount": 450, "currency": "usd", "status": "succeeded", "latest_charge": "ch_1"
        }));
    });
    let refund_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/refunds")
            .header("Authorization", "Bearer sk_test_123")
            .body_contains("payment_intent=pi_123")
            .body_contains("amount=200");
        then.status(200).json_body(json!({"id": "re_1", "status": "succeeded"}));
    });
    let gateway = gateway(&server);
    let req = RefundRequest { payment_intent_id: "pi_123".into(), amount: Some(Cents::from(200)), reason: None };
    let result = gateway.process_refund(req).await.expect("refund errored");
    assert!(result.success);
    assert_eq!(result.refund_id.as_deref(), Some("re_1"));
    refund_mock.assert_hits(1);
}

#[tokio::test]
async fn payment_intents() {
    let server = MockServer::start_async().await;
    let create = server.mock(|when, then| {
        when.method(POST).path("/v1/payment_intents").body_contains("amount=450").body_contains("currency=usd");
        then.status(200).json_body(json!({
            "id": "pi_new", "amount": 450, "currency": "usd", "status": "requires_payment_method",
            "client_secret": "pi_new_secret"
        }));
    });
    let gateway = gateway(&server);
    let intent = gateway.create_payment_intent(PaymentIntentRequest::new(Cents::from(450), "USD")).await.unwrap();
    assert_eq!(intent.id, "pi_new");
    assert_eq!(intent.status, PaymentStatus::RequiresPaymentMethod);
    assert_eq!(intent.client_secret.as_deref(), Some("pi_new_secret"));
    create.assert_hits(1);

    let err = gateway.create_payment_intent(PaymentIntentRequest::new(Cents::from(450), "jpy")).await.unwrap_err();
    assert!(matches!(err, PaymentGatewayError::UnsupportedCurrency { .. }));
    create.assert_hits(1);
}

#[tokio::test]
async fn customers_and_health() {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(GET).path("/v1/customers/cus_1");
        then.status(200).json_body(json!({"id": "cus_1", "email": "a@example.com", "name": "Alice"}));
    });
    server.mock(|when, then| {
        when.method(GET).path("/v1/customers/cus_gone");
        then.status(200).json_body(json!({"id": "cus_gone", "deleted": true}));
    });
    server.mock(|when, then| {
        when.method(GET).path("/v1/customers/cus_missing");
        then.status(404).json_body(json!({"error": {"message": "No such customer"}}));
    });
    server.mock(|when, then| {
        when.method(GET).path("/v1/balance");
        then.status(401).body("bad key");
    });
    let gateway = gateway(&server);
    let customer = gateway.get_customer("cus_1").await.unwrap().unwrap();
    assert_eq!(customer.email.as_deref(), Some("a@example.com"));
    assert!(gateway.get_customer("cus_gone").await.unwrap().is_none());
    assert!(gateway.get_customer("cus_missing").await.unwrap().is_none());
    let health = gateway.health_check().await;
    assert!(!health.healthy);
    assert!(health.message.is_some());
}
