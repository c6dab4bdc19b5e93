use async_trait::async_trait;

use super::StorageError;
use crate::db_types::PaymentGatewayConfig;

#[async_trait]
pub trait GatewayManagement: Clone + Send + Sync + 'static {
    /// All gateway configurations, in the order they were created.
    async fn fetch_gateway_configs(&self) -> Result<Vec<PaymentGatewayConfig>, StorageError>;

    /// Creates or replaces the gateway configuration. The `is_default` flag is ignored; use
    /// [`Self::set_default_gateway`].
    async fn upsert_gateway_config(&self, config: PaymentGatewayConfig) -> Result<(), StorageError>;

    /// Atomically makes `slug` the only default gateway.
    async fn set_default_gateway(&self, slug: &str) -> Result<(), StorageError>;
}
