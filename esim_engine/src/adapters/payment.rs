use std::collections::BTreeMap;

use async_trait::async_trait;
use esim_common::Cents;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::{
    adapters::registry::{AdapterConfig, RegistryError},
    db_types::{PaymentGatewayConfig, PaymentStatus},
};

#[derive(Debug, Clone, Error)]
pub enum PaymentGatewayError {
    #[error("Payment gateway {0} is disabled")]
    NotEnabled(String),
    #[error("Currency {currency} is not supported by {gateway}")]
    UnsupportedCurrency { gateway: String, currency: String },
    #[error("Payment method {method} is not supported by {gateway}")]
    UnsupportedPaymentMethod { gateway: String, method: String },
    #[error("The gateway rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("Could not reach the payment gateway: {0}")]
    Network(String),
    #[error("The gateway returned an unexpected response: {0}")]
    InvalidResponse(String),
    #[error("{0}")]
    Registry(#[from] RegistryError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntentRequest {
    pub amount: Cents,
    pub currency: String,
    pub customer_id: Option<String>,
    pub payment_method_types: Vec<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl PaymentIntentRequest {
    pub fn new<S: Into<String>>(amount: Cents, currency: S) -> Self {
        Self {
            amount,
            currency: currency.into(),
            customer_id: None,
            payment_method_types: vec![],
            description: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata<S: Into<String>>(mut self, key: S, value: S) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub amount: Cents,
    pub currency: String,
    pub status: PaymentStatus,
    pub client_secret: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmPaymentRequest {
    pub payment_intent_id: String,
    pub payment_method_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundRequest {
    pub payment_intent_id: String,
    /// Refund the full captured amount when `None`
    pub amount: Option<Cents>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundResult {
    pub success: bool,
    pub refund_id: Option<String>,
    pub error_message: Option<String>,
}

impl RefundResult {
    pub fn refunded<S: Into<String>>(refund_id: S) -> Self {
        Self { success: true, refund_id: Some(refund_id.into()), error_message: None }
    }

    pub fn failed<S: Into<String>>(message: S) -> Self {
        Self { success: false, refund_id: None, error_message: Some(message.into()) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerRequest {
    pub email: String,
    pub name: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

/// A gateway event that passed signature verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    pub event_type: String,
    pub payment_intent_id: Option<String>,
    pub status: Option<PaymentStatus>,
    pub payload: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebhookValidation {
    pub is_valid: bool,
    pub event: Option<WebhookEvent>,
}

impl WebhookValidation {
    pub fn invalid() -> Self {
        Self { is_valid: false, event: None }
    }

    pub fn valid(event: WebhookEvent) -> Self {
        Self { is_valid: true, event: Some(event) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayHealth {
    pub healthy: bool,
    pub message: Option<String>,
}

/// The contract every payment gateway integration satisfies.
///
/// Operations return errors directly to the caller; nothing here is retried behind the caller's back.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn config(&self) -> &PaymentGatewayConfig;

    fn slug(&self) -> &str {
        self.config().slug.as_str()
    }

    async fn create_payment_intent(&self, req: PaymentIntentRequest) -> Result<PaymentIntent, PaymentGatewayError>;

    async fn confirm_payment(&self, req: ConfirmPaymentRequest) -> Result<PaymentIntent, PaymentGatewayError>;

    async fn get_payment_status(&self, payment_intent_id: &str) -> Result<PaymentStatus, PaymentGatewayError>;

    /// Refunds the captured charge of the payment intent. An intent without a captured charge yields an unsuccessful
    /// [`RefundResult`] rather than an error.
    async fn process_refund(&self, req: RefundRequest) -> Result<RefundResult, PaymentGatewayError>;

    /// Verifies `signature` against the exact bytes of the request body. Never mutates anything.
    fn validate_webhook(&self, raw_payload: &[u8], signature: &str) -> WebhookValidation;

    async fn create_customer(&self, req: CustomerRequest) -> Result<Customer, PaymentGatewayError>;

    async fn get_customer(&self, customer_id: &str) -> Result<Option<Customer>, PaymentGatewayError>;

    async fn health_check(&self) -> GatewayHealth;
}

impl AdapterConfig for PaymentGatewayConfig {
    fn is_enabled(&self) -> bool {
        self.is_enabled
    }
}

/// An empty currency list means "any currency".
pub fn supports_currency(config: &PaymentGatewayConfig, currency: &str) -> bool {
    config.supported_currencies.is_empty() ||
        config.supported_currencies.iter().any(|c| c.eq_ignore_ascii_case(currency))
}

/// An empty method list means "any method".
pub fn supports_payment_method(config: &PaymentGatewayConfig, method: &str) -> bool {
    config.supported_payment_methods.is_empty() || config.supported_payment_methods.iter().any(|m| m == method)
}

pub fn ensure_enabled(config: &PaymentGatewayConfig) -> Result<(), PaymentGatewayError> {
    if config.is_enabled {
        Ok(())
    } else {
        Err(PaymentGatewayError::NotEnabled(config.slug.clone()))
    }
}

/// Checks that the gateway can take the payment described by `req`.
pub fn ensure_supported(config: &PaymentGatewayConfig, req: &PaymentIntentRequest) -> Result<(), PaymentGatewayError> {
    ensure_enabled(config)?;
    if !supports_currency(config, &req.currency) {
        return Err(PaymentGatewayError::UnsupportedCurrency {
            gateway: config.slug.clone(),
            currency: req.currency.clone(),
        });
    }
    if let Some(method) = req.payment_method_types.iter().find(|m| !supports_payment_method(config, m)) {
        return Err(PaymentGatewayError::UnsupportedPaymentMethod {
            gateway: config.slug.clone(),
            method: method.clone(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn currency_and_method_support() {
        let config = PaymentGatewayConfig::new("stripe", "Stripe")
            .with_currencies(&["USD", "eur"])
            .with_payment_methods(&["card"]);
        assert!(supports_currency(&config, "usd"));
        assert!(supports_currency(&config, "EUR"));
        assert!(!supports_currency(&config, "gbp"));
        assert!(supports_payment_method(&config, "card"));
        assert!(!supports_payment_method(&config, "sepa_debit"));

        let any = PaymentGatewayConfig::new("any", "Any");
        assert!(supports_currency(&any, "jpy"));
        assert!(supports_payment_method(&any, "anything"));
    }

    #[test]
    fn disabled_gateways_are_rejected() {
        let mut config = PaymentGatewayConfig::new("stripe", "Stripe").with_currencies(&["usd"]);
        let req = PaymentIntentRequest::new(Cents::from(450), "usd");
        assert!(ensure_supported(&config, &req).is_ok());
        let gbp = PaymentIntentRequest::new(Cents::from(450), "gbp");
        assert!(matches!(ensure_supported(&config, &gbp), Err(PaymentGatewayError::UnsupportedCurrency { .. })));
        config.is_enabled = false;
        assert!(matches!(ensure_enabled(&config), Err(PaymentGatewayError::NotEnabled(s)) if s == "stripe"));
    }
}
