use std::time::Duration;

use esim_common::Secret;
use log::*;

/// The default timeout applied to every outbound vendor call.
pub const DEFAULT_VENDOR_TIMEOUT: Duration = Duration::from_secs(30);

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| {
        warn!("🪛️ {key} not set, using {default} as default");
        default.to_string()
    })
}

fn secret_from_env(key: &str) -> Secret<String> {
    Secret::new(std::env::var(key).unwrap_or_else(|_| {
        warn!("🪛️ {key} not set. Calls that need it will be rejected by the vendor.");
        String::default()
    }))
}

fn timeout_from_env(key: &str) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|s| {
            s.parse::<u64>().map_err(|e| warn!("🪛️ {key} is not a number of seconds ({e}). Using the default.")).ok()
        })
        .map_or(DEFAULT_VENDOR_TIMEOUT, Duration::from_secs)
}

#[derive(Debug, Clone)]
pub struct AiraloConfig {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: Secret<String>,
    pub timeout: Duration,
}

impl Default for AiraloConfig {
    fn default() -> Self {
        Self {
            base_url: "https://partners-api.airalo.com".to_string(),
            client_id: String::default(),
            client_secret: Secret::default(),
            timeout: DEFAULT_VENDOR_TIMEOUT,
        }
    }
}

impl AiraloConfig {
    pub fn new_from_env_or_default() -> Self {
        let base_url = env_or("ESIM_AIRALO_BASE_URL", "https://partners-api.airalo.com");
        let client_id = env_or("ESIM_AIRALO_CLIENT_ID", "");
        let client_secret = secret_from_env("ESIM_AIRALO_CLIENT_SECRET");
        let timeout = timeout_from_env("ESIM_AIRALO_TIMEOUT");
        Self { base_url, client_id, client_secret, timeout }
    }
}

#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub base_url: String,
    pub secret_key: Secret<String>,
    /// The `whsec_` signing secret of the webhook endpoint
    pub webhook_secret: Secret<String>,
    /// Signed webhooks older than this are rejected as replays
    pub webhook_tolerance: Duration,
    pub timeout: Duration,
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.stripe.com".to_string(),
            secret_key: Secret::default(),
            webhook_secret: Secret::default(),
            webhook_tolerance: Duration::from_secs(300),
            timeout: DEFAULT_VENDOR_TIMEOUT,
        }
    }
}

impl StripeConfig {
    pub fn new_from_env_or_default() -> Self {
        let base_url = env_or("ESIM_STRIPE_BASE_URL", "https://api.stripe.com");
        let secret_key = secret_from_env("ESIM_STRIPE_SECRET_KEY");
        let webhook_secret = secret_from_env("ESIM_STRIPE_WEBHOOK_SECRET");
        let timeout = timeout_from_env("ESIM_STRIPE_TIMEOUT");
        Self { base_url, secret_key, webhook_secret, timeout, ..Default::default() }
    }
}

#[derive(Debug, Clone)]
pub struct FcmConfig {
    pub base_url: String,
    pub project_id: String,
    /// An OAuth access token for the FCM HTTP v1 API
    pub access_token: Secret<String>,
    pub timeout: Duration,
}

impl Default for FcmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://fcm.googleapis.com".to_string(),
            project_id: String::default(),
            access_token: Secret::default(),
            timeout: DEFAULT_VENDOR_TIMEOUT,
        }
    }
}

impl FcmConfig {
    pub fn new_from_env_or_default() -> Self {
        let base_url = env_or("ESIM_FCM_BASE_URL", "https://fcm.googleapis.com");
        let project_id = env_or("ESIM_FCM_PROJECT_ID", "");
        let access_token = secret_from_env("ESIM_FCM_ACCESS_TOKEN");
        let timeout = timeout_from_env("ESIM_FCM_TIMEOUT");
        Self { base_url, project_id, access_token, timeout }
    }

    pub fn is_configured(&self) -> bool {
        !self.project_id.is_empty() && !self.access_token.is_empty()
    }
}
