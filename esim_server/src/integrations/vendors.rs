use std::sync::Arc;

use esim_engine::{
    adapters::{PaymentGateway, PaymentGatewayRegistry, ProviderAdapter, ProviderRegistry},
    db_types::{NewProvider, PaymentGatewayConfig, Provider},
    notifications::PushNotifier,
    traits::{CatalogManagement, GatewayManagement},
};
use esim_vendors::{AiraloAdapter, AiraloConfig, FcmConfig, FcmPushNotifier, StripeConfig, StripeGateway};
use log::*;

use crate::errors::ServerError;

pub const AIRALO_SLUG: &str = "airalo";
pub const STRIPE_SLUG: &str = "stripe";

/// Registers an adapter constructor for every stored provider that has a known integration.
///
/// Providers are matched to integrations by slug. A provider with no integration stays unregistered, so the catalog
/// sync reports it as failed instead of silently skipping it. If Airalo credentials are configured but no Airalo
/// provider exists yet, one is created.
pub async fn build_provider_registry<B: CatalogManagement>(
    db: &B,
    airalo: &AiraloConfig,
) -> Result<ProviderRegistry, ServerError> {
    if !airalo.client_id.is_empty() && db.fetch_provider_by_slug(AIRALO_SLUG).await?.is_none() {
        let provider = db.upsert_provider(NewProvider::new(AIRALO_SLUG, "Airalo")).await?;
        info!("🔌️ Created provider {} (#{}) from the Airalo configuration", provider.slug, provider.id);
    }
    let registry = ProviderRegistry::new();
    for provider in db.fetch_providers().await? {
        if !provider.slug.starts_with(AIRALO_SLUG) {
            warn!("🔌️ No integration is available for provider {}. It will not be synced.", provider.slug);
            continue;
        }
        let config = airalo.clone();
        let adapter_db = db.clone();
        let slug = provider.slug.clone();
        registry.register(&slug, provider, move |p: &Provider| {
            AiraloAdapter::new(&p.slug, p.id, config.clone(), adapter_db.clone())
                .map(|a| Arc::new(a) as Arc<dyn ProviderAdapter>)
        });
    }
    info!("🔌️ Provider registry ready: [{}]", registry.slugs().join(", "));
    Ok(registry)
}

/// Registers the stored payment gateways. If none are stored and Stripe credentials are configured, a Stripe gateway
/// row is created so that the webhook endpoint works out of the box.
pub async fn build_gateway_registry<B: GatewayManagement>(
    db: &B,
    stripe: &StripeConfig,
) -> Result<PaymentGatewayRegistry, ServerError> {
    let mut configs = db.fetch_gateway_configs().await?;
    if configs.is_empty() && !stripe.secret_key.is_empty() {
        let config = PaymentGatewayConfig::new(STRIPE_SLUG, "Stripe");
        db.upsert_gateway_config(config.clone()).await?;
        info!("💳️ Created the {STRIPE_SLUG} gateway from the Stripe configuration");
        configs.push(config);
    }
    let registry = PaymentGatewayRegistry::new();
    let mut default = None;
    for config in configs {
        if config.slug != STRIPE_SLUG {
            warn!("💳️ No integration is available for payment gateway {}", config.slug);
            continue;
        }
        if config.is_default {
            default = Some(config.slug.clone());
        }
        let stripe = stripe.clone();
        let slug = config.slug.clone();
        registry.register(&slug, config, move |c: &PaymentGatewayConfig| {
            StripeGateway::new(c.clone(), stripe.clone()).map(|g| Arc::new(g) as Arc<dyn PaymentGateway>)
        });
    }
    if let Some(slug) = default {
        if let Err(e) = registry.set_default(&slug) {
            warn!("💳️ Could not make {slug} the default gateway. {e}");
        }
    }
    info!("💳️ Payment gateway registry ready: [{}]", registry.slugs().join(", "));
    Ok(registry)
}

/// The FCM notifier, or `None` when push delivery is not configured.
pub fn build_push_notifier(config: &FcmConfig) -> Result<Option<Arc<dyn PushNotifier>>, ServerError> {
    if !config.is_configured() {
        warn!("📲️ FCM is not configured. Low-data notifications are disabled.");
        return Ok(None);
    }
    let notifier =
        FcmPushNotifier::new(config.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    Ok(Some(Arc::new(notifier)))
}
