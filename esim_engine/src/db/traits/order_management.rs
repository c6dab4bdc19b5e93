use async_trait::async_trait;

use super::StorageError;
use crate::db_types::{NewOrder, Order, OrderStatusType, PaymentStatus};

/// The `OrderManagement` trait defines the behaviour for selecting and advancing orders in the database backend.
#[async_trait]
pub trait OrderManagement: Clone + Send + Sync + 'static {
    async fn insert_order(&self, order: NewOrder) -> Result<Order, StorageError>;

    async fn fetch_order(&self, id: i64) -> Result<Option<Order>, StorageError>;

    async fn fetch_order_by_display_id(&self, display_order_id: &str) -> Result<Option<Order>, StorageError>;

    async fn fetch_order_by_payment_intent(&self, payment_intent_id: &str) -> Result<Option<Order>, StorageError>;

    /// Orders in one of the given statuses, oldest first.
    async fn fetch_orders_by_status(&self, statuses: &[OrderStatusType]) -> Result<Vec<Order>, StorageError>;

    /// Failed orders that have been retried fewer than `max_retries` times.
    async fn fetch_retryable_orders(&self, max_retries: i64) -> Result<Vec<Order>, StorageError>;

    /// Moves the order to `status`. Transitions that [`OrderStatusType::can_transition_to`] forbids are rejected with
    /// [`StorageError::InvalidTransition`]. Setting the current status again is a no-op.
    async fn update_order_status(&self, id: i64, status: OrderStatusType) -> Result<Order, StorageError>;

    /// The explicit retry transition: `failed -> processing`, incrementing `retry_count`.
    async fn retry_order(&self, id: i64) -> Result<Order, StorageError>;

    /// Records the gateway-reported payment status on the order that owns the payment intent. Returns `None` if no
    /// order references the intent.
    async fn update_payment_status(
        &self,
        payment_intent_id: &str,
        status: PaymentStatus,
    ) -> Result<Option<Order>, StorageError>;
}
