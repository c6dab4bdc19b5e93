//! eSIM orchestration engine
//!
//! The engine keeps the local store consistent with several independent, independently failing eSIM providers and
//! payment gateways. It is vendor-agnostic: concrete integrations live in `esim_vendors` and plug in through the
//! adapter contracts defined here.
//!
//! The library is divided into these sections:
//! 1. Storage ([`traits`]). The storage contracts (`CatalogManagement`, `OrderManagement`, ...) and the SQLite
//!    backend. The data types stored in the database are defined in [`db_types`].
//! 2. Adapters ([`adapters`]). The `ProviderAdapter` and `PaymentGateway` contracts, and the slug-keyed registries
//!    that construct them lazily.
//! 3. The periodic jobs: the catalog sync and merge ([`catalog`]), the order status poller ([`orders`]) and the usage
//!    threshold notifier ([`notifications`]), all driven by the [`scheduler`] harness.
//! 4. The payment flow API ([`api`]), which starts payments and applies verified gateway webhooks to orders.
//!
//! Components publish events (order status changes, completed catalog syncs) that you can subscribe to with the
//! hooks in [`events`].
mod db;

pub mod adapters;
pub mod api;
pub mod catalog;
pub mod db_types;
pub mod events;
pub mod notifications;
pub mod orders;
pub mod scheduler;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use db::sqlite::{SqliteDatabase, SqliteDatabaseError};
pub mod traits {
    pub use crate::db::traits::*;
}
