use std::fmt::Debug;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use esim_common::DEFAULT_CURRENCY_CODE;
use esim_engine::{
    adapters::{store_packages, ProviderAdapter, ProviderError, SyncResult, UsageData},
    db_types::{NewPackage, OrderStatusType},
    traits::CatalogManagement,
};
use log::*;
use reqwest::Method;
use tokio::sync::Mutex;

use crate::{
    data_objects::{AiraloDestination, AiraloEnvelope, AiraloOrder, AiraloPackage, AiraloToken, AiraloUsage},
    helpers::{dollars_to_cents, usage_percentage},
    AiraloConfig,
    VendorApi,
    VendorApiError,
};

/// Tokens are refreshed this long before they expire.
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;
const PACKAGES_PAGE_LIMIT: &str = "1000";

struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// Provider adapter for the Airalo partner API.
///
/// Authenticates with OAuth client credentials, and stores the fetched catalog through the engine's storage contract
/// so that the catalog sync can merge it.
pub struct AiraloAdapter<B> {
    slug: String,
    provider_id: i64,
    config: AiraloConfig,
    api: VendorApi,
    db: B,
    token: Mutex<Option<CachedToken>>,
}

impl<B> Debug for AiraloAdapter<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AiraloAdapter({}, {})", self.slug, self.config.base_url)
    }
}

impl<B: CatalogManagement> AiraloAdapter<B> {
    pub fn new(slug: &str, provider_id: i64, config: AiraloConfig, db: B) -> Result<Self, VendorApiError> {
        let api = VendorApi::new(&config.base_url, config.timeout)?;
        Ok(Self { slug: slug.to_string(), provider_id, config, api, db, token: Mutex::new(None) })
    }

    async fn access_token(&self) -> Result<String, VendorApiError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Utc::now() + Duration::seconds(TOKEN_REFRESH_MARGIN_SECS) {
                return Ok(token.token.clone());
            }
        }
        debug!("Requesting a new Airalo access token");
        let form = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.reveal().as_str()),
            ("grant_type", "client_credentials"),
        ];
        let req = self.api.request(Method::POST, "/v2/token").header("Accept", "application/json").form(&form);
        let token = match self.api.send::<AiraloEnvelope<AiraloToken>>(req).await {
            Ok(envelope) => envelope.data,
            Err(VendorApiError::QueryError { status: 401 | 403 | 422, message }) => {
                return Err(VendorApiError::Authentication(message))
            },
            Err(e) => return Err(e),
        };
        let expires_at = Utc::now() + Duration::seconds(token.expires_in);
        *cached = Some(CachedToken { token: token.access_token.clone(), expires_at });
        Ok(token.access_token)
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T, VendorApiError> {
        let token = self.access_token().await?;
        let mut req = self.api.request(Method::GET, path).bearer_auth(token).header("Accept", "application/json");
        if !params.is_empty() {
            req = req.query(params);
        }
        let envelope = self.api.send::<AiraloEnvelope<T>>(req).await?;
        Ok(envelope.data)
    }

    pub async fn fetch_packages(&self) -> Result<Vec<NewPackage>, ProviderError> {
        let params = [("limit", PACKAGES_PAGE_LIMIT), ("filter[type]", "local")];
        let destinations = self.get::<Vec<AiraloDestination>>("/v2/packages", &params).await?;
        let mut packages = vec![];
        for destination in &destinations {
            for operator in &destination.operators {
                for package in &operator.packages {
                    match to_new_package(destination, package) {
                        Ok(p) => packages.push(p),
                        Err(e) => warn!("Skipping Airalo package {}: {e}", package.id),
                    }
                }
            }
        }
        Ok(packages)
    }
}

fn to_new_package(destination: &AiraloDestination, package: &AiraloPackage) -> Result<NewPackage, VendorApiError> {
    if package.is_unlimited || package.amount <= 0 {
        return Err(VendorApiError::JsonError("unlimited plans have no comparable allowance".into()));
    }
    let price = dollars_to_cents(package.net_price.unwrap_or(package.price))?;
    let destination = destination.country_code.clone().unwrap_or_else(|| destination.slug.clone());
    Ok(NewPackage {
        package_code: package.id.clone(),
        destination,
        title: package.title.clone(),
        data_amount_mb: package.amount,
        validity_days: package.day,
        price,
        currency: DEFAULT_CURRENCY_CODE.to_string(),
    })
}

/// Airalo reports order states as free text. Anything we do not recognise is treated as invalid data rather than
/// guessed.
pub fn map_order_status(status: &str) -> Result<OrderStatusType, ProviderError> {
    match status.to_ascii_lowercase().as_str() {
        "pending" | "queued" => Ok(OrderStatusType::Pending),
        "processing" | "in_progress" => Ok(OrderStatusType::Processing),
        "completed" | "complete" | "success" => Ok(OrderStatusType::Completed),
        "failed" | "cancelled" | "canceled" | "refunded" => Ok(OrderStatusType::Failed),
        other => Err(ProviderError::InvalidData(format!("Unknown order status '{other}'"))),
    }
}

fn parse_expiry(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|d| DateTime::from_naive_utc_and_offset(d, Utc))
        })
        .ok()
}

#[async_trait]
impl<B: CatalogManagement> ProviderAdapter for AiraloAdapter<B> {
    fn slug(&self) -> &str {
        &self.slug
    }

    async fn sync_packages(&self) -> Result<SyncResult, ProviderError> {
        let packages = self.fetch_packages().await?;
        info!("{} returned {} packages", self.slug, packages.len());
        store_packages(&self.db, self.provider_id, packages).await
    }

    async fn get_usage_data(&self, iccid: &str) -> Result<UsageData, ProviderError> {
        let path = format!("/v2/sims/{iccid}/usage");
        let usage = self.get::<AiraloUsage>(&path, &[]).await?;
        let percentage_used = if usage.is_unlimited {
            0.0
        } else {
            usage_percentage(usage.remaining, usage.total)
                .ok_or_else(|| ProviderError::InvalidData(format!("Usage for {iccid} has no total allowance")))?
        };
        let used = (usage.total - usage.remaining).max(0);
        Ok(UsageData {
            percentage_used,
            data_used_mb: Some(used),
            data_total_mb: Some(usage.total),
            expires_at: usage.expired_at.as_deref().and_then(parse_expiry),
        })
    }

    async fn get_order_status(&self, order_ref: &str) -> Result<OrderStatusType, ProviderError> {
        let path = format!("/v2/orders/{order_ref}");
        let order = self.get::<AiraloOrder>(&path, &[]).await?;
        trace!("Airalo order {order_ref} ({:?}) is {}", order.code, order.status);
        map_order_status(&order.status)
    }
}
