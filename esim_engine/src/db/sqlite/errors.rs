use thiserror::Error;

use crate::{db::traits::StorageError, db_types::OrderStatusType};

#[derive(Debug, Error)]
pub enum SqliteDatabaseError {
    #[error("Database connection error: {0}")]
    DriverError(#[from] sqlx::Error),
    #[error("Database migration error: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),
    #[error("Database query error: {0}")]
    QueryError(String),
    #[error("Provider not found: {0}")]
    ProviderNotFound(String),
    #[error("Order not found: {0}")]
    OrderNotFound(i64),
    #[error("Payment gateway not found: {0}")]
    GatewayNotFound(String),
    #[error("Order {id} cannot move from {from} to {to}")]
    InvalidTransition { id: i64, from: OrderStatusType, to: OrderStatusType },
}

impl From<SqliteDatabaseError> for StorageError {
    fn from(e: SqliteDatabaseError) -> Self {
        match e {
            SqliteDatabaseError::ProviderNotFound(s) => StorageError::NotFound(format!("provider {s}")),
            SqliteDatabaseError::OrderNotFound(id) => StorageError::NotFound(format!("order {id}")),
            SqliteDatabaseError::GatewayNotFound(s) => StorageError::NotFound(format!("payment gateway {s}")),
            SqliteDatabaseError::InvalidTransition { id, from, to } => {
                StorageError::InvalidTransition { id, from, to }
            },
            e => StorageError::DatabaseError(e.to_string()),
        }
    }
}
