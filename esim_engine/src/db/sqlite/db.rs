use std::fmt::Debug;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::*;
use sqlx::SqlitePool;

use super::{
    db_url,
    gateways,
    new_pool,
    notifications,
    orders,
    packages,
    providers,
    settings,
    unified,
    SqliteDatabaseError,
};
use crate::{
    db::traits::{
        CatalogManagement,
        GatewayManagement,
        NotificationStateManagement,
        OrchestratorDatabase,
        OrderManagement,
        SettingsStore,
        StorageError,
    },
    db_types::{
        CatalogKey,
        CatalogOffer,
        NewOrder,
        NewPackage,
        NewProvider,
        NewUnifiedPackage,
        Order,
        OrderStatusType,
        Package,
        PackageReplaceResult,
        PaymentGatewayConfig,
        PaymentStatus,
        Provider,
        UnifiedPackage,
        UpsertResult,
        UserNotificationState,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({})", self.url)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object, using `ESIM_DATABASE_URL` or the default location.
    pub async fn new(max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        let url = db_url();
        SqliteDatabase::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        let pool = new_pool(url, max_connections).await?;
        trace!("🗃️ Connection pool for {url} created");
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Brings the schema up to date. Safe to run on every start.
    pub async fn migrate(&self) -> Result<(), SqliteDatabaseError> {
        sqlx::migrate!("./src/db/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Migrations complete for {}", self.url);
        Ok(())
    }
}

impl OrchestratorDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }
}

#[async_trait]
impl CatalogManagement for SqliteDatabase {
    async fn upsert_provider(&self, provider: NewProvider) -> Result<Provider, StorageError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteDatabaseError::from)?;
        Ok(providers::upsert_provider(provider, &mut conn).await?)
    }

    async fn fetch_provider(&self, id: i64) -> Result<Option<Provider>, StorageError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteDatabaseError::from)?;
        Ok(providers::fetch_provider(id, &mut conn).await?)
    }

    async fn fetch_provider_by_slug(&self, slug: &str) -> Result<Option<Provider>, StorageError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteDatabaseError::from)?;
        Ok(providers::fetch_provider_by_slug(slug, &mut conn).await?)
    }

    async fn fetch_providers(&self) -> Result<Vec<Provider>, StorageError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteDatabaseError::from)?;
        Ok(providers::fetch_providers(false, &mut conn).await?)
    }

    async fn fetch_enabled_providers(&self) -> Result<Vec<Provider>, StorageError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteDatabaseError::from)?;
        Ok(providers::fetch_providers(true, &mut conn).await?)
    }

    async fn set_provider_enabled(&self, slug: &str, enabled: bool) -> Result<(), StorageError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteDatabaseError::from)?;
        providers::set_provider_enabled(slug, enabled, &mut conn).await?;
        info!("🗃️ Provider {slug} {}", if enabled { "enabled" } else { "disabled" });
        Ok(())
    }

    async fn mark_provider_synced(&self, provider_id: i64, synced_at: DateTime<Utc>) -> Result<(), StorageError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteDatabaseError::from)?;
        Ok(providers::mark_provider_synced(provider_id, synced_at, &mut conn).await?)
    }

    async fn replace_provider_packages(
        &self,
        provider_id: i64,
        packages: Vec<NewPackage>,
    ) -> Result<PackageReplaceResult, StorageError> {
        let mut tx = self.pool.begin().await.map_err(SqliteDatabaseError::from)?;
        let result = packages::replace_provider_packages(provider_id, packages, &mut tx).await?;
        tx.commit().await.map_err(SqliteDatabaseError::from)?;
        debug!(
            "🗃️ Packages of provider #{provider_id} replaced. {} new, {} updated, {} unchanged, {} removed",
            result.inserted, result.updated, result.unchanged, result.removed
        );
        Ok(result)
    }

    async fn fetch_package(&self, id: i64) -> Result<Option<Package>, StorageError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteDatabaseError::from)?;
        Ok(packages::fetch_package(id, &mut conn).await?)
    }

    async fn fetch_active_packages(&self, provider_id: i64) -> Result<Vec<Package>, StorageError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteDatabaseError::from)?;
        Ok(packages::fetch_packages_for_provider(provider_id, true, &mut conn).await?)
    }

    async fn fetch_offers_for_key(&self, key: &CatalogKey) -> Result<Vec<CatalogOffer>, StorageError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteDatabaseError::from)?;
        Ok(packages::fetch_offers_for_key(key, &mut conn).await?)
    }

    async fn fetch_unified_by_key(&self, key: &CatalogKey) -> Result<Option<UnifiedPackage>, StorageError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteDatabaseError::from)?;
        Ok(unified::fetch_by_key(key, &mut conn).await?)
    }

    async fn fetch_unified_for_provider(&self, provider_id: i64) -> Result<Vec<UnifiedPackage>, StorageError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteDatabaseError::from)?;
        Ok(unified::fetch_active_for_provider(provider_id, &mut conn).await?)
    }

    async fn upsert_unified_package(&self, row: NewUnifiedPackage) -> Result<UpsertResult, StorageError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteDatabaseError::from)?;
        Ok(unified::upsert(row, &mut conn).await?)
    }

    async fn deactivate_unified_package(&self, key: &CatalogKey) -> Result<bool, StorageError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteDatabaseError::from)?;
        Ok(unified::deactivate(key, &mut conn).await?)
    }

    async fn fetch_unified_catalog(&self, active_only: bool) -> Result<Vec<UnifiedPackage>, StorageError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteDatabaseError::from)?;
        Ok(unified::fetch_catalog(active_only, &mut conn).await?)
    }
}

#[async_trait]
impl OrderManagement for SqliteDatabase {
    async fn insert_order(&self, order: NewOrder) -> Result<Order, StorageError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteDatabaseError::from)?;
        Ok(orders::insert_order(order, &mut conn).await?)
    }

    async fn fetch_order(&self, id: i64) -> Result<Option<Order>, StorageError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteDatabaseError::from)?;
        Ok(orders::fetch_order(id, &mut conn).await?)
    }

    async fn fetch_order_by_display_id(&self, display_order_id: &str) -> Result<Option<Order>, StorageError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteDatabaseError::from)?;
        Ok(orders::fetch_order_by_display_id(display_order_id, &mut conn).await?)
    }

    async fn fetch_order_by_payment_intent(&self, payment_intent_id: &str) -> Result<Option<Order>, StorageError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteDatabaseError::from)?;
        Ok(orders::fetch_order_by_payment_intent(payment_intent_id, &mut conn).await?)
    }

    async fn fetch_orders_by_status(&self, statuses: &[OrderStatusType]) -> Result<Vec<Order>, StorageError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteDatabaseError::from)?;
        Ok(orders::fetch_orders_by_status(statuses, &mut conn).await?)
    }

    async fn fetch_retryable_orders(&self, max_retries: i64) -> Result<Vec<Order>, StorageError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteDatabaseError::from)?;
        Ok(orders::fetch_retryable_orders(max_retries, &mut conn).await?)
    }

    async fn update_order_status(&self, id: i64, status: OrderStatusType) -> Result<Order, StorageError> {
        let mut tx = self.pool.begin().await.map_err(SqliteDatabaseError::from)?;
        let order = orders::update_order_status(id, status, &mut tx).await?;
        tx.commit().await.map_err(SqliteDatabaseError::from)?;
        Ok(order)
    }

    async fn retry_order(&self, id: i64) -> Result<Order, StorageError> {
        let mut tx = self.pool.begin().await.map_err(SqliteDatabaseError::from)?;
        let order = orders::retry_order(id, &mut tx).await?;
        tx.commit().await.map_err(SqliteDatabaseError::from)?;
        Ok(order)
    }

    async fn update_payment_status(
        &self,
        payment_intent_id: &str,
        status: PaymentStatus,
    ) -> Result<Option<Order>, StorageError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteDatabaseError::from)?;
        Ok(orders::update_payment_status(payment_intent_id, status, &mut conn).await?)
    }
}

#[async_trait]
impl NotificationStateManagement for SqliteDatabase {
    async fn fetch_notification_state(&self, user_id: &str) -> Result<Option<UserNotificationState>, StorageError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteDatabaseError::from)?;
        Ok(notifications::fetch_state(user_id, &mut conn).await?)
    }

    async fn upsert_notification_preferences(
        &self,
        user_id: &str,
        fcm_token: Option<String>,
        notify_low_data: bool,
    ) -> Result<UserNotificationState, StorageError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteDatabaseError::from)?;
        Ok(notifications::upsert_preferences(user_id, fcm_token, notify_low_data, &mut conn).await?)
    }

    async fn record_low_data_notification(
        &self,
        user_id: &str,
        level: i64,
        notified_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteDatabaseError::from)?;
        Ok(notifications::record_low_data_notification(user_id, level, notified_at, &mut conn).await?)
    }
}

#[async_trait]
impl SettingsStore for SqliteDatabase {
    async fn get_setting(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteDatabaseError::from)?;
        Ok(settings::get_setting(key, &mut conn).await?)
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteDatabaseError::from)?;
        settings::set_setting(key, value, &mut conn).await?;
        trace!("🗃️ Setting {key} = {value}");
        Ok(())
    }
}

#[async_trait]
impl GatewayManagement for SqliteDatabase {
    async fn fetch_gateway_configs(&self) -> Result<Vec<PaymentGatewayConfig>, StorageError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteDatabaseError::from)?;
        Ok(gateways::fetch_configs(&mut conn).await?)
    }

    async fn upsert_gateway_config(&self, config: PaymentGatewayConfig) -> Result<(), StorageError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteDatabaseError::from)?;
        Ok(gateways::upsert_config(config, &mut conn).await?)
    }

    async fn set_default_gateway(&self, slug: &str) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(SqliteDatabaseError::from)?;
        gateways::set_default(slug, &mut tx).await?;
        tx.commit().await.map_err(SqliteDatabaseError::from)?;
        Ok(())
    }
}
