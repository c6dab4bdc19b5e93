//! Wire formats of the vendor APIs. Only the fields the integrations use are modelled.
use serde::{Deserialize, Serialize};
use serde_json::Value;

//--------------------------------------        Airalo         ---------------------------------------------------------
/// Airalo wraps every payload in `{"data": ...}`.
#[derive(Debug, Clone, Deserialize)]
pub struct AiraloEnvelope<T> {
    pub data: T,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AiraloToken {
    pub access_token: String,
    /// Token lifetime in seconds
    pub expires_in: i64,
}

/// A destination (country or region) and the operators selling plans there.
#[derive(Debug, Clone, Deserialize)]
pub struct AiraloDestination {
    pub slug: String,
    pub country_code: Option<String>,
    #[serde(default)]
    pub operators: Vec<AiraloOperator>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AiraloOperator {
    pub title: String,
    #[serde(default)]
    pub packages: Vec<AiraloPackage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AiraloPackage {
    pub id: String,
    pub title: String,
    /// Data allowance in MB
    pub amount: i64,
    /// Validity in days
    pub day: i64,
    /// Retail price in US dollars
    pub price: f64,
    /// Wholesale price in US dollars, when the partner account exposes it
    pub net_price: Option<f64>,
    #[serde(default)]
    pub is_unlimited: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AiraloUsage {
    /// Remaining data in MB
    pub remaining: i64,
    /// Total data in MB
    pub total: i64,
    pub expired_at: Option<String>,
    #[serde(default)]
    pub is_unlimited: bool,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AiraloOrder {
    pub id: Value,
    pub code: Option<String>,
    pub status: String,
}

//--------------------------------------        Stripe         ---------------------------------------------------------
#[derive(Debug, Clone, Deserialize)]
pub struct StripePaymentIntent {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub status: String,
    pub client_secret: Option<String>,
    pub latest_charge: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeRefund {
    pub id: String,
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeCustomer {
    pub id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    #[serde(default)]
    pub deleted: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEventData {
    pub object: Value,
}

//--------------------------------------          FCM          ---------------------------------------------------------
#[derive(Debug, Clone, Serialize)]
pub struct FcmRequest<'a> {
    pub message: FcmMessage<'a>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FcmMessage<'a> {
    pub token: &'a str,
    pub notification: FcmNotification<'a>,
    pub data: &'a std::collections::BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FcmNotification<'a> {
    pub title: &'a str,
    pub body: &'a str,
}
