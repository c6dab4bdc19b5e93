use std::{fmt::Debug, sync::Arc};

use log::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    adapters::{
        ensure_enabled,
        ensure_supported,
        PaymentGateway,
        PaymentGatewayError,
        PaymentGatewayRegistry,
        PaymentIntent,
        PaymentIntentRequest,
        RefundRequest,
        RefundResult,
    },
    db::traits::{GatewayManagement, OrderManagement, StorageError},
    db_types::{Order, PaymentStatus},
};

#[derive(Debug, Clone, Error)]
pub enum PaymentFlowError {
    #[error("The webhook signature is invalid")]
    InvalidSignature,
    #[error(transparent)]
    Gateway(#[from] PaymentGatewayError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// What a verified webhook changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookOutcome {
    pub event_id: String,
    pub event_type: String,
    /// The order whose payment status was updated, if the event referenced one we know about
    pub order: Option<Order>,
}

/// `PaymentFlowApi` connects the payment gateways to the order store: it starts payments on the default gateway,
/// issues refunds, and applies verified webhook events to orders.
pub struct PaymentFlowApi<B> {
    db: B,
    gateways: Arc<PaymentGatewayRegistry>,
}

impl<B> Debug for PaymentFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentFlowApi")
    }
}

impl<B> PaymentFlowApi<B>
where B: OrderManagement + GatewayManagement
{
    pub fn new(db: B, gateways: Arc<PaymentGatewayRegistry>) -> Self {
        Self { db, gateways }
    }

    pub fn gateways(&self) -> &PaymentGatewayRegistry {
        &self.gateways
    }

    /// The default gateway. Resolving it the first time fixes the default, and the choice is stored so that it
    /// survives a restart.
    pub async fn default_gateway(&self) -> Result<Arc<dyn PaymentGateway>, PaymentFlowError> {
        let slug = self.gateways.default_slug().map_err(PaymentGatewayError::from)?;
        let stored_default =
            self.db.fetch_gateway_configs().await?.into_iter().find(|c| c.is_default).map(|c| c.slug);
        if stored_default.as_deref() != Some(slug.as_str()) {
            match self.db.set_default_gateway(&slug).await {
                Ok(()) => {},
                // Gateways registered only in code have no row to flag
                Err(StorageError::NotFound(_)) => trace!("💳️ {slug} has no stored configuration"),
                Err(e) => return Err(e.into()),
            }
        }
        Ok(self.gateways.get(&slug).map_err(PaymentGatewayError::from)?)
    }

    fn gateway(&self, slug: &str) -> Result<Arc<dyn PaymentGateway>, PaymentFlowError> {
        Ok(self.gateways.get(slug).map_err(PaymentGatewayError::from)?)
    }

    pub async fn create_payment_intent(&self, req: PaymentIntentRequest) -> Result<PaymentIntent, PaymentFlowError> {
        let gateway = self.default_gateway().await?;
        ensure_supported(gateway.config(), &req)?;
        let intent = gateway.create_payment_intent(req).await?;
        info!(
            "💳️ Payment intent {} created on {} for {} {}",
            intent.id,
            gateway.slug(),
            intent.amount,
            intent.currency
        );
        Ok(intent)
    }

    pub async fn payment_status(
        &self,
        gateway_slug: &str,
        payment_intent_id: &str,
    ) -> Result<PaymentStatus, PaymentFlowError> {
        let gateway = self.gateway(gateway_slug)?;
        Ok(gateway.get_payment_status(payment_intent_id).await?)
    }

    /// Refunds the payment for an order. A successful refund marks the order's payment as refunded.
    pub async fn refund(&self, gateway_slug: &str, req: RefundRequest) -> Result<RefundResult, PaymentFlowError> {
        let gateway = self.gateway(gateway_slug)?;
        ensure_enabled(gateway.config())?;
        let intent_id = req.payment_intent_id.clone();
        let result = gateway.process_refund(req).await?;
        if result.success {
            info!("💳️ Payment {intent_id} refunded on {gateway_slug}");
            self.db.update_payment_status(&intent_id, PaymentStatus::Refunded).await?;
        } else {
            let reason = result.error_message.as_deref().unwrap_or("unknown error");
            warn!("💳️ Refund of {intent_id} on {gateway_slug} failed: {reason}");
        }
        Ok(result)
    }

    /// Verifies and applies a gateway webhook. `raw_body` must be the request body exactly as received. Nothing is
    /// written unless the signature is valid.
    pub async fn handle_webhook(
        &self,
        gateway_slug: &str,
        raw_body: &[u8],
        signature: &str,
    ) -> Result<WebhookOutcome, PaymentFlowError> {
        let gateway = self.gateway(gateway_slug)?;
        let validation = gateway.validate_webhook(raw_body, signature);
        let event = match (validation.is_valid, validation.event) {
            (true, Some(event)) => event,
            _ => {
                warn!("💳️ Rejected a {gateway_slug} webhook with an invalid signature");
                return Err(PaymentFlowError::InvalidSignature);
            },
        };
        debug!("💳️ {gateway_slug} webhook {} ({}) verified", event.id, event.event_type);
        let order = match (&event.payment_intent_id, event.status) {
            (Some(intent_id), Some(status)) => {
                let order = self.db.update_payment_status(intent_id, status).await?;
                match &order {
                    Some(o) => info!("💳️ Order {} payment is now {status}", o.display_order_id),
                    None => debug!("💳️ No order references payment intent {intent_id}"),
                }
                order
            },
            _ => None,
        };
        Ok(WebhookOutcome { event_id: event.id, event_type: event.event_type, order })
    }
}
