use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use esim_common::Cents;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(String);

//--------------------------------------       Provider        ---------------------------------------------------------
/// An upstream eSIM wholesaler whose catalog, order status and usage telemetry we pull.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Provider {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub enabled: bool,
    pub is_preferred: bool,
    /// Percentage markup applied to the provider's base prices. `15.0` means +15%.
    pub pricing_margin: f64,
    pub sync_interval_minutes: i64,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub api_rate_limit_per_hour: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProvider {
    pub slug: String,
    pub name: String,
    pub enabled: bool,
    pub is_preferred: bool,
    pub pricing_margin: f64,
    pub sync_interval_minutes: i64,
    pub api_rate_limit_per_hour: Option<i64>,
}

impl NewProvider {
    pub fn new<S: Into<String>>(slug: S, name: S) -> Self {
        Self {
            slug: slug.into(),
            name: name.into(),
            enabled: true,
            is_preferred: false,
            pricing_margin: 0.0,
            sync_interval_minutes: 360,
            api_rate_limit_per_hour: None,
        }
    }

    pub fn with_margin(mut self, margin: f64) -> Self {
        self.pricing_margin = margin;
        self
    }

    pub fn preferred(mut self) -> Self {
        self.is_preferred = true;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

//--------------------------------------       Package         ---------------------------------------------------------
/// A provider-scoped offer, as last returned by that provider's catalog sync.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Package {
    pub id: i64,
    pub provider_id: i64,
    /// The provider's own identifier for the offer
    pub package_code: String,
    /// ISO country code or regional slug
    pub destination: String,
    pub title: String,
    pub data_amount_mb: i64,
    pub validity_days: i64,
    pub price: Cents,
    pub currency: String,
    pub active: bool,
    pub updated_at: DateTime<Utc>,
}

impl Package {
    pub fn catalog_key(&self) -> CatalogKey {
        CatalogKey::new(&self.destination, self.data_amount_mb, self.validity_days)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPackage {
    pub package_code: String,
    pub destination: String,
    pub title: String,
    pub data_amount_mb: i64,
    pub validity_days: i64,
    pub price: Cents,
    pub currency: String,
}

/// Outcome of replacing a provider's raw packages with a freshly fetched set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageReplaceResult {
    pub inserted: u64,
    pub updated: u64,
    pub unchanged: u64,
    pub removed: u64,
}

impl PackageReplaceResult {
    pub fn total_synced(&self) -> u64 {
        self.inserted + self.updated + self.unchanged
    }
}

//--------------------------------------      CatalogKey       ---------------------------------------------------------
/// The cross-provider equivalence used to fold offers into the unified catalog: the same destination, data allowance
/// and validity are considered the same product, regardless of which provider sells it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CatalogKey {
    pub destination: String,
    pub data_amount_mb: i64,
    pub validity_days: i64,
}

impl CatalogKey {
    pub fn new(destination: &str, data_amount_mb: i64, validity_days: i64) -> Self {
        Self { destination: destination.to_ascii_uppercase(), data_amount_mb, validity_days }
    }
}

impl Display for CatalogKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}MB/{}d", self.destination, self.data_amount_mb, self.validity_days)
    }
}

/// A live offer competing for a catalog key, joined with the pricing attributes of its provider.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct CatalogOffer {
    pub package_id: i64,
    pub provider_id: i64,
    pub is_preferred: bool,
    pub pricing_margin: f64,
    pub price: Cents,
    pub currency: String,
}

impl CatalogOffer {
    pub fn customer_price(&self) -> Cents {
        self.price.with_margin(self.pricing_margin)
    }
}

//--------------------------------------    UnifiedPackage     ---------------------------------------------------------
/// A row of the merged, margin-priced catalog shown to customers.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct UnifiedPackage {
    pub id: i64,
    pub destination: String,
    pub data_amount_mb: i64,
    pub validity_days: i64,
    /// The provider currently offering the best price for this key
    pub provider_id: i64,
    /// The winning raw package
    pub package_id: i64,
    pub base_price: Cents,
    pub customer_price: Cents,
    pub currency: String,
    pub active: bool,
    pub updated_at: DateTime<Utc>,
}

impl UnifiedPackage {
    pub fn catalog_key(&self) -> CatalogKey {
        CatalogKey::new(&self.destination, self.data_amount_mb, self.validity_days)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUnifiedPackage {
    pub key: CatalogKey,
    pub provider_id: i64,
    pub package_id: i64,
    pub base_price: Cents,
    pub customer_price: Cents,
    pub currency: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertResult {
    Created(i64),
    Updated(i64),
    Unchanged(i64),
}

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatusType {
    /// The order has been placed, but the provider has not started provisioning the eSIM.
    Pending,
    /// The provider is provisioning the eSIM.
    Processing,
    /// The eSIM has been issued. Terminal.
    Completed,
    /// The provider rejected or failed the order. Terminal, unless the poller retries it.
    Failed,
}

impl OrderStatusType {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Orders only ever move forward. The single exception is `Failed -> Processing`, which the order poller uses to
    /// retry an order.
    pub fn can_transition_to(&self, next: OrderStatusType) -> bool {
        use OrderStatusType::*;
        matches!(
            (self, next),
            (Pending, Processing) |
                (Pending, Completed) |
                (Pending, Failed) |
                (Processing, Completed) |
                (Processing, Failed) |
                (Failed, Processing)
        )
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Pending => write!(f, "pending"),
            OrderStatusType::Processing => write!(f, "processing"),
            OrderStatusType::Completed => write!(f, "completed"),
            OrderStatusType::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------     PaymentStatus     ---------------------------------------------------------
/// Canonical payment intent status, independent of the gateway that reported it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    Succeeded,
    Canceled,
    Failed,
    Refunded,
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentStatus::RequiresPaymentMethod => "requires_payment_method",
            PaymentStatus::RequiresConfirmation => "requires_confirmation",
            PaymentStatus::RequiresAction => "requires_action",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::Canceled => "canceled",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        };
        f.write_str(s)
    }
}

impl FromStr for PaymentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "requires_payment_method" => Ok(Self::RequiresPaymentMethod),
            "requires_confirmation" => Ok(Self::RequiresConfirmation),
            "requires_action" => Ok(Self::RequiresAction),
            "processing" => Ok(Self::Processing),
            "succeeded" => Ok(Self::Succeeded),
            "canceled" | "cancelled" => Ok(Self::Canceled),
            "failed" | "payment_failed" => Ok(Self::Failed),
            "refunded" => Ok(Self::Refunded),
            s => Err(ConversionError(format!("Invalid payment status: {s}"))),
        }
    }
}

//--------------------------------------         Order         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    /// The customer-facing order number
    pub display_order_id: String,
    pub user_id: String,
    pub provider_id: i64,
    /// The provider's reference for this order, used to poll its status
    pub provider_order_ref: String,
    pub iccid: Option<String>,
    pub status: OrderStatusType,
    pub payment_intent_id: Option<String>,
    pub payment_status: Option<PaymentStatus>,
    pub retry_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub display_order_id: String,
    pub user_id: String,
    pub provider_id: i64,
    pub provider_order_ref: String,
    pub iccid: Option<String>,
    pub status: OrderStatusType,
    pub payment_intent_id: Option<String>,
}

impl NewOrder {
    pub fn new<S: Into<String>>(display_order_id: S, user_id: S, provider_id: i64, provider_order_ref: S) -> Self {
        Self {
            display_order_id: display_order_id.into(),
            user_id: user_id.into(),
            provider_id,
            provider_order_ref: provider_order_ref.into(),
            iccid: None,
            status: OrderStatusType::Pending,
            payment_intent_id: None,
        }
    }

    pub fn with_iccid<S: Into<String>>(mut self, iccid: S) -> Self {
        self.iccid = Some(iccid.into());
        self
    }

    pub fn with_status(mut self, status: OrderStatusType) -> Self {
        self.status = status;
        self
    }

    pub fn with_payment_intent<S: Into<String>>(mut self, intent_id: S) -> Self {
        self.payment_intent_id = Some(intent_id.into());
        self
    }
}

//--------------------------------------  UserNotificationState ------------------------------------------------------
/// Durable per-user push notification state. Only the usage threshold notifier writes the `last_low_data_*` fields,
/// and only after a notification was delivered.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct UserNotificationState {
    pub user_id: String,
    pub fcm_token: Option<String>,
    pub notify_low_data: bool,
    pub last_low_data_notified_at: Option<DateTime<Utc>>,
    /// The highest usage threshold announced in the current crossing episode. Zero if nothing was announced yet.
    pub last_low_data_level: i64,
}

impl UserNotificationState {
    /// Returns the push token if the user can and wants to receive low-data notifications.
    pub fn low_data_token(&self) -> Option<&str> {
        if !self.notify_low_data {
            return None;
        }
        self.fcm_token.as_deref().filter(|t| !t.trim().is_empty())
    }
}

//--------------------------------------  PaymentGatewayConfig  ------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentGatewayConfig {
    pub slug: String,
    pub name: String,
    pub is_enabled: bool,
    pub is_test_mode: bool,
    pub is_default: bool,
    /// Lower-case ISO currency codes
    pub supported_currencies: Vec<String>,
    pub supported_payment_methods: Vec<String>,
}

impl PaymentGatewayConfig {
    pub fn new<S: Into<String>>(slug: S, name: S) -> Self {
        Self {
            slug: slug.into(),
            name: name.into(),
            is_enabled: true,
            is_test_mode: false,
            is_default: false,
            supported_currencies: vec![],
            supported_payment_methods: vec![],
        }
    }

    pub fn with_currencies(mut self, currencies: &[&str]) -> Self {
        self.supported_currencies = currencies.iter().map(|c| c.to_ascii_lowercase()).collect();
        self
    }

    pub fn with_payment_methods(mut self, methods: &[&str]) -> Self {
        self.supported_payment_methods = methods.iter().map(|m| m.to_string()).collect();
        self
    }
}
