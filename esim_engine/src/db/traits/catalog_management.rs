use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::StorageError;
use crate::db_types::{
    CatalogKey,
    CatalogOffer,
    NewPackage,
    NewProvider,
    NewUnifiedPackage,
    Package,
    PackageReplaceResult,
    Provider,
    UnifiedPackage,
    UpsertResult,
};

/// Providers, raw packages and the unified catalog.
#[async_trait]
pub trait CatalogManagement: Clone + Send + Sync + 'static {
    /// Creates the provider, or updates its configuration if the slug already exists. `last_sync_at` is never
    /// touched here.
    async fn upsert_provider(&self, provider: NewProvider) -> Result<Provider, StorageError>;

    async fn fetch_provider(&self, id: i64) -> Result<Option<Provider>, StorageError>;

    async fn fetch_provider_by_slug(&self, slug: &str) -> Result<Option<Provider>, StorageError>;

    async fn fetch_providers(&self) -> Result<Vec<Provider>, StorageError>;

    /// All enabled providers, ordered by id.
    async fn fetch_enabled_providers(&self) -> Result<Vec<Provider>, StorageError>;

    async fn set_provider_enabled(&self, slug: &str, enabled: bool) -> Result<(), StorageError>;

    /// Records the completion time of a successful catalog sync for the provider.
    async fn mark_provider_synced(&self, provider_id: i64, synced_at: DateTime<Utc>) -> Result<(), StorageError>;

    /// Replaces the provider's raw packages with `packages` in a single transaction.
    ///
    /// * packages that are new are inserted;
    /// * packages whose details changed are updated and re-activated;
    /// * active packages that are absent from `packages` are deactivated (not deleted).
    async fn replace_provider_packages(
        &self,
        provider_id: i64,
        packages: Vec<NewPackage>,
    ) -> Result<PackageReplaceResult, StorageError>;

    async fn fetch_package(&self, id: i64) -> Result<Option<Package>, StorageError>;

    async fn fetch_active_packages(&self, provider_id: i64) -> Result<Vec<Package>, StorageError>;

    /// Every active package of an *enabled* provider that matches the catalog key.
    async fn fetch_offers_for_key(&self, key: &CatalogKey) -> Result<Vec<CatalogOffer>, StorageError>;

    async fn fetch_unified_by_key(&self, key: &CatalogKey) -> Result<Option<UnifiedPackage>, StorageError>;

    /// Active unified rows whose winning offer currently belongs to the provider.
    async fn fetch_unified_for_provider(&self, provider_id: i64) -> Result<Vec<UnifiedPackage>, StorageError>;

    /// Inserts or updates the unified row for `row.key`. The row is (re-)activated.
    async fn upsert_unified_package(&self, row: NewUnifiedPackage) -> Result<UpsertResult, StorageError>;

    /// Marks the unified row inactive. Returns `true` if an active row was deactivated.
    async fn deactivate_unified_package(&self, key: &CatalogKey) -> Result<bool, StorageError>;

    async fn fetch_unified_catalog(&self, active_only: bool) -> Result<Vec<UnifiedPackage>, StorageError>;
}
