use thiserror::Error;

use crate::db_types::OrderStatusType;

#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Record not found: {0}")]
    NotFound(String),
    #[error("Order {id} cannot move from {from} to {to}")]
    InvalidTransition { id: i64, from: OrderStatusType, to: OrderStatusType },
    #[error("Stored value could not be interpreted: {0}")]
    InvalidData(String),
}
