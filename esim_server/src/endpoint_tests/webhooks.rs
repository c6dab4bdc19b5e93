use actix_web::{http::StatusCode, test::TestRequest};
use chrono::Utc;
use esim_engine::{
    db_types::{NewOrder, PaymentStatus},
    traits::OrderManagement,
};
use esim_vendors::helpers::sign_payload;
use serde_json::json;

use super::helpers::{TestContext, WEBHOOK_SECRET};

async fn context_with_order() -> TestContext {
    let ctx = TestContext::new().await;
    let provider = ctx.add_provider("alpha").await;
    let order = NewOrder::new("ORD-1", "u1", provider.id, "ref-1").with_payment_intent("pi_123");
    ctx.db.insert_order(order).await.expect("Error inserting order");
    ctx
}

fn event_body() -> String {
    json!({
        "id": "evt_1",
        "type": "payment_intent.succeeded",
        "data": {"object": {"id": "pi_123", "object": "payment_intent", "status": "succeeded"}}
    })
    .to_string()
}

fn signature(body: &str, secret: &str) -> String {
    let t = Utc::now().timestamp();
    format!("t={t},v1={}", sign_payload(secret, t, body.as_bytes()).unwrap())
}

async fn payment_status(ctx: &TestContext) -> Option<PaymentStatus> {
    ctx.db.fetch_order_by_payment_intent("pi_123").await.unwrap().unwrap().payment_status
}

#[actix_web::test]
async fn signed_webhooks_update_the_order() {
    let _ = env_logger::try_init();
    let ctx = context_with_order().await;
    let body = event_body();
    let req = TestRequest::post()
        .uri("/webhooks/stripe")
        .insert_header(("Stripe-Signature", signature(&body, WEBHOOK_SECRET)))
        .insert_header(("Content-Type", "application/json"))
        .set_payload(body);
    let (status, body) = ctx.call(req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body.contains(r#""event_id":"evt_1""#));
    assert_eq!(payment_status(&ctx).await, Some(PaymentStatus::Succeeded));
}

#[actix_web::test]
async fn forged_webhooks_are_rejected() {
    let _ = env_logger::try_init();
    let ctx = context_with_order().await;
    let body = event_body();
    let req = TestRequest::post()
        .uri("/webhooks/stripe")
        .insert_header(("Stripe-Signature", signature(&body, "whsec_attacker")))
        .set_payload(body);
    let (status, body) = ctx.call(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, r#"{"error":"The webhook signature is invalid"}"#);
    assert_eq!(payment_status(&ctx).await, None);
}

#[actix_web::test]
async fn reserialized_bodies_fail_verification() {
    let _ = env_logger::try_init();
    let ctx = context_with_order().await;
    let body = event_body();
    let header = signature(&body, WEBHOOK_SECRET);
    let pretty = serde_json::to_string_pretty(&serde_json::from_str::<serde_json::Value>(&body).unwrap()).unwrap();
    let req = TestRequest::post().uri("/webhooks/stripe").insert_header(("Stripe-Signature", header)).set_payload(pretty);
    let (status, _) = ctx.call(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(payment_status(&ctx).await, None);
}

#[actix_web::test]
async fn unsigned_webhooks_are_rejected() {
    let _ = env_logger::try_init();
    let ctx = context_with_order().await;
    let req = TestRequest::post().uri("/webhooks/stripe").set_payload(event_body());
    let (status, _) = ctx.call(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(payment_status(&ctx).await, None);
}

#[actix_web::test]
async fn unknown_gateways() {
    let _ = env_logger::try_init();
    let ctx = context_with_order().await;
    let body = event_body();
    let req = TestRequest::post()
        .uri("/webhooks/paypal")
        .insert_header(("Stripe-Signature", signature(&body, WEBHOOK_SECRET)))
        .set_payload(body);
    let (status, _) = ctx.call(req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
