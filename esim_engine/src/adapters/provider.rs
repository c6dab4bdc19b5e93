use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    adapters::registry::{AdapterConfig, RegistryError},
    db::traits::{CatalogManagement, StorageError},
    db_types::{NewPackage, OrderStatusType, PackageReplaceResult, Provider},
};

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Network failure, timeout or a 5xx from the provider. The next scheduled pass will try again.
    #[error("Transient provider error: {0}")]
    Transient(String),
    /// Bad credentials, unknown provider or a rejected request. Retrying will not help.
    #[error("Provider error: {0}")]
    Terminal(String),
    #[error("Provider returned invalid data: {0}")]
    InvalidData(String),
}

impl ProviderError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl From<RegistryError> for ProviderError {
    fn from(e: RegistryError) -> Self {
        Self::Terminal(e.to_string())
    }
}

impl From<StorageError> for ProviderError {
    fn from(e: StorageError) -> Self {
        Self::Transient(e.to_string())
    }
}

/// The outcome of pulling a provider's catalog into the local store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    /// Number of offers the provider returned
    pub packages_synced: u64,
    pub packages_updated: u64,
    pub packages_removed: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl SyncResult {
    pub fn failed<S: Into<String>>(message: S) -> Self {
        Self { error_message: Some(message.into()), ..Default::default() }
    }

    pub fn is_success(&self) -> bool {
        self.error_message.is_none()
    }
}

impl From<PackageReplaceResult> for SyncResult {
    fn from(r: PackageReplaceResult) -> Self {
        Self {
            packages_synced: r.total_synced(),
            packages_updated: r.updated,
            packages_removed: r.removed,
            error_message: None,
        }
    }
}

/// Usage telemetry for a single eSIM.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageData {
    pub percentage_used: f64,
    pub data_used_mb: Option<i64>,
    pub data_total_mb: Option<i64>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl UsageData {
    pub fn from_percentage(percentage_used: f64) -> Self {
        Self { percentage_used, ..Default::default() }
    }

    /// NaN, infinite and negative readings are unusable.
    pub fn is_valid(&self) -> bool {
        self.percentage_used.is_finite() && self.percentage_used >= 0.0
    }
}

/// The contract every upstream eSIM provider integration satisfies.
///
/// Implementations are constructed by the [`ProviderRegistry`](crate::adapters::ProviderRegistry) from the
/// provider's configuration row, and shared between the catalog sync, order poller and usage notifier.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// The slug of the provider this adapter talks to
    fn slug(&self) -> &str;

    /// Pulls the provider's full catalog and replaces the provider's raw packages with it.
    async fn sync_packages(&self) -> Result<SyncResult, ProviderError>;

    async fn get_usage_data(&self, iccid: &str) -> Result<UsageData, ProviderError>;

    /// Maps the provider's status for the order onto [`OrderStatusType`].
    async fn get_order_status(&self, order_ref: &str) -> Result<OrderStatusType, ProviderError>;
}

impl AdapterConfig for Provider {
    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

/// Stores a freshly fetched catalog for `provider_id`. Adapters call this at the end of `sync_packages`.
pub async fn store_packages<B: CatalogManagement>(
    db: &B,
    provider_id: i64,
    packages: Vec<NewPackage>,
) -> Result<SyncResult, ProviderError> {
    let result = db.replace_provider_packages(provider_id, packages).await?;
    Ok(SyncResult::from(result))
}
