use std::fmt::Debug;

use async_trait::async_trait;
use chrono::Utc;
use esim_common::Cents;
use esim_engine::{
    adapters::{
        ensure_enabled,
        ensure_supported,
        ConfirmPaymentRequest,
        Customer,
        CustomerRequest,
        GatewayHealth,
        PaymentGateway,
        PaymentGatewayError,
        PaymentIntent,
        PaymentIntentRequest,
        RefundRequest,
        RefundResult,
        WebhookEvent,
        WebhookValidation,
    },
    db_types::{PaymentGatewayConfig, PaymentStatus},
};
use log::*;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{
    data_objects::{StripeCustomer, StripeEvent, StripePaymentIntent, StripeRefund},
    helpers::{parse_signature_header, verify_payload},
    StripeConfig,
    VendorApi,
    VendorApiError,
};

/// Payment gateway backed by the Stripe REST API. Requests are form encoded, responses are JSON.
pub struct StripeGateway {
    config: PaymentGatewayConfig,
    stripe: StripeConfig,
    api: VendorApi,
}

impl Debug for StripeGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StripeGateway({}, {})", self.config.slug, self.stripe.base_url)
    }
}

impl StripeGateway {
    pub fn new(config: PaymentGatewayConfig, stripe: StripeConfig) -> Result<Self, VendorApiError> {
        let api = VendorApi::new(&stripe.base_url, stripe.timeout)?;
        Ok(Self { config, stripe, api })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.api.request(method, path).bearer_auth(self.stripe.secret_key.reveal())
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, form: &[(String, String)]) -> Result<T, VendorApiError> {
        self.api.send(self.request(Method::POST, path).form(form)).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, VendorApiError> {
        self.api.send(self.request(Method::GET, path)).await
    }

    async fn fetch_intent(&self, id: &str) -> Result<StripePaymentIntent, PaymentGatewayError> {
        let intent = self.get::<StripePaymentIntent>(&format!("/v1/payment_intents/{id}")).await?;
        Ok(intent)
    }

    fn is_fresh(&self, timestamp: i64) -> bool {
        let tolerance = i64::try_from(self.stripe.webhook_tolerance.as_secs()).unwrap_or(i64::MAX);
        (Utc::now().timestamp() - timestamp).abs() <= tolerance
    }
}

/// Maps a Stripe payment intent status onto the canonical payment status.
pub fn map_payment_status(status: &str) -> Result<PaymentStatus, PaymentGatewayError> {
    match status {
        "requires_payment_method" => Ok(PaymentStatus::RequiresPaymentMethod),
        "requires_confirmation" => Ok(PaymentStatus::RequiresConfirmation),
        "requires_action" | "requires_capture" => Ok(PaymentStatus::RequiresAction),
        "processing" => Ok(PaymentStatus::Processing),
        "succeeded" => Ok(PaymentStatus::Succeeded),
        "canceled" => Ok(PaymentStatus::Canceled),
        other => Err(PaymentGatewayError::InvalidResponse(format!("Unknown payment intent status '{other}'"))),
    }
}

fn to_payment_intent(intent: StripePaymentIntent) -> Result<PaymentIntent, PaymentGatewayError> {
    Ok(PaymentIntent {
        status: map_payment_status(&intent.status)?,
        id: intent.id,
        amount: Cents::from(intent.amount),
        currency: intent.currency,
        client_secret: intent.client_secret,
    })
}

fn to_customer(customer: StripeCustomer) -> Customer {
    Customer { id: customer.id, email: customer.email, name: customer.name }
}

/// Builds the canonical event from a verified Stripe event. Charge events carry the intent id in `payment_intent`.
fn to_webhook_event(event: StripeEvent, payload: Value) -> WebhookEvent {
    let object = &event.data.object;
    let is_charge = object.get("object").and_then(Value::as_str) == Some("charge");
    let payment_intent_id = if is_charge {
        object.get("payment_intent").and_then(Value::as_str)
    } else {
        object.get("id").and_then(Value::as_str)
    }
    .map(str::to_string);
    let status = match event.event_type.as_str() {
        "charge.refunded" => Some(PaymentStatus::Refunded),
        "payment_intent.payment_failed" => Some(PaymentStatus::Failed),
        _ if is_charge => None,
        _ => object.get("status").and_then(Value::as_str).and_then(|s| map_payment_status(s).ok()),
    };
    WebhookEvent { id: event.id, event_type: event.event_type, payment_intent_id, status, payload }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    fn config(&self) -> &PaymentGatewayConfig {
        &self.config
    }

    async fn create_payment_intent(&self, req: PaymentIntentRequest) -> Result<PaymentIntent, PaymentGatewayError> {
        ensure_supported(&self.config, &req)?;
        let mut form = vec![
            ("amount".to_string(), req.amount.value().to_string()),
            ("currency".to_string(), req.currency.to_ascii_lowercase()),
        ];
        if let Some(customer) = req.customer_id {
            form.push(("customer".to_string(), customer));
        }
        if let Some(description) = req.description {
            form.push(("description".to_string(), description));
        }
        for method in req.payment_method_types {
            form.push(("payment_method_types[]".to_string(), method));
        }
        for (key, value) in req.metadata {
            form.push((format!("metadata[{key}]"), value));
        }
        let intent = self.post::<StripePaymentIntent>("/v1/payment_intents", &form).await?;
        info!("💳️ Created payment intent {} for {}", intent.id, req.amount);
        to_payment_intent(intent)
    }

    async fn confirm_payment(&self, req: ConfirmPaymentRequest) -> Result<PaymentIntent, PaymentGatewayError> {
        ensure_enabled(&self.config)?;
        let mut form = vec![];
        if let Some(method) = req.payment_method_id {
            form.push(("payment_method".to_string(), method));
        }
        let path = format!("/v1/payment_intents/{}/confirm", req.payment_intent_id);
        let intent = self.post::<StripePaymentIntent>(&path, &form).await?;
        to_payment_intent(intent)
    }

    async fn get_payment_status(&self, payment_intent_id: &str) -> Result<PaymentStatus, PaymentGatewayError> {
        let intent = self.fetch_intent(payment_intent_id).await?;
        map_payment_status(&intent.status)
    }

    async fn process_refund(&self, req: RefundRequest) -> Result<RefundResult, PaymentGatewayError> {
        ensure_enabled(&self.config)?;
        let intent = self.fetch_intent(&req.payment_intent_id).await?;
        if intent.latest_charge.is_none() {
            warn!("💳️ Payment intent {} has no captured charge to refund", req.payment_intent_id);
            return Ok(RefundResult::failed("no charge found"));
        }
        let mut form = vec![("payment_intent".to_string(), req.payment_intent_id.clone())];
        if let Some(amount) = req.amount {
            form.push(("amount".to_string(), amount.value().to_string()));
        }
        if let Some(reason) = req.reason {
            form.push(("reason".to_string(), reason));
        }
        let refund = match self.post::<StripeRefund>("/v1/refunds", &form).await {
            Ok(refund) => refund,
            Err(VendorApiError::QueryError { status, message }) if status < 500 => {
                warn!("💳️ Stripe declined the refund of {}. {status}: {message}", req.payment_intent_id);
                return Ok(RefundResult::failed(message));
            },
            Err(e) => return Err(e.into()),
        };
        match refund.status.as_str() {
            "failed" | "canceled" => {
                Ok(RefundResult { refund_id: Some(refund.id), ..RefundResult::failed("refund failed") })
            },
            _ => {
                info!("💳️ Refund {} issued for {}", refund.id, req.payment_intent_id);
                Ok(RefundResult::refunded(refund.id))
            },
        }
    }

    fn validate_webhook(&self, raw_payload: &[u8], signature: &str) -> WebhookValidation {
        let Some((timestamp, signatures)) = parse_signature_header(signature) else {
            debug!("💳️ Malformed Stripe-Signature header");
            return WebhookValidation::invalid();
        };
        if !self.is_fresh(timestamp) {
            warn!("💳️ Webhook timestamp {timestamp} is outside the tolerance window");
            return WebhookValidation::invalid();
        }
        let secret = self.stripe.webhook_secret.reveal();
        if !signatures.iter().any(|s| verify_payload(secret, timestamp, raw_payload, s)) {
            warn!("💳️ Webhook signature mismatch");
            return WebhookValidation::invalid();
        }
        let payload = match serde_json::from_slice::<Value>(raw_payload) {
            Ok(v) => v,
            Err(e) => {
                warn!("💳️ Signed webhook body is not JSON. {e}");
                return WebhookValidation::invalid();
            },
        };
        match serde_json::from_value::<StripeEvent>(payload.clone()) {
            Ok(event) => WebhookValidation::valid(to_webhook_event(event, payload)),
            Err(e) => {
                warn!("💳️ Signed webhook is not a Stripe event. {e}");
                WebhookValidation::invalid()
            },
        }
    }

    async fn create_customer(&self, req: CustomerRequest) -> Result<Customer, PaymentGatewayError> {
        let mut form = vec![("email".to_string(), req.email)];
        if let Some(name) = req.name {
            form.push(("name".to_string(), name));
        }
        for (key, value) in req.metadata {
            form.push((format!("metadata[{key}]"), value));
        }
        let customer = self.post::<StripeCustomer>("/v1/customers", &form).await?;
        Ok(to_customer(customer))
    }

    async fn get_customer(&self, customer_id: &str) -> Result<Option<Customer>, PaymentGatewayError> {
        let req = self.request(Method::GET, &format!("/v1/customers/{customer_id}"));
        let customer = self.api.send_optional::<StripeCustomer>(req).await?;
        Ok(customer.filter(|c| !c.deleted).map(to_customer))
    }

    async fn health_check(&self) -> GatewayHealth {
        match self.get::<Value>("/v1/balance").await {
            Ok(_) => GatewayHealth { healthy: true, message: None },
            Err(e) => {
                warn!("💳️ Stripe health check failed. {e}");
                GatewayHealth { healthy: false, message: Some(e.to_string()) }
            },
        }
    }
}
