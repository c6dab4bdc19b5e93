//! # Storage contracts
//!
//! This module defines the interface contracts that storage *backends* must satisfy in order to back the
//! orchestration core. The orchestrator, poller and notifier are generic over these traits, so they never touch SQL
//! directly.
//!
//! * [`CatalogManagement`] covers providers, their raw packages, and the unified catalog.
//! * [`OrderManagement`] covers order selection for polling and status transitions.
//! * [`NotificationStateManagement`] covers the per-user low-data notification state.
//! * [`SettingsStore`] is the durable key/value store holding the scheduler cursors.
//! * [`GatewayManagement`] covers the payment gateway configuration rows and the default gateway.
//! * [`OrchestratorDatabase`] bundles all of the above; it is what the server wires up.
mod catalog_management;
mod gateway_management;
mod notification_management;
mod order_management;
mod settings_store;

mod errors;

pub use catalog_management::CatalogManagement;
pub use errors::StorageError;
pub use gateway_management::GatewayManagement;
pub use notification_management::NotificationStateManagement;
pub use order_management::OrderManagement;
pub use settings_store::{cursor_key, SettingsStore};

/// The highest level of behaviour for a backend supporting the orchestration core.
pub trait OrchestratorDatabase:
    CatalogManagement + OrderManagement + NotificationStateManagement + SettingsStore + GatewayManagement
{
    /// The URL of the database
    fn url(&self) -> &str;
}
