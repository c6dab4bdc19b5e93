//! SQLite storage backend.
//!
//! Each submodule holds the queries for one table family as free functions over a `SqliteConnection`, so that
//! callers can compose them inside a transaction by passing `&mut tx`. [`SqliteDatabase`] wires them up to the
//! storage traits.
mod db;
mod errors;

pub mod gateways;
pub mod notifications;
pub mod orders;
pub mod packages;
pub mod providers;
pub mod settings;
pub mod unified;

use std::{env, str::FromStr};

pub use db::SqliteDatabase;
pub use errors::SqliteDatabaseError;
use log::info;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};

const SQLITE_DB_URL: &str = "sqlite://data/esim_store.db";

pub fn db_url() -> String {
    let result = env::var("ESIM_DATABASE_URL").unwrap_or_else(|_| {
        info!("🗃️ ESIM_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("🗃️ Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqliteDatabaseError> {
    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true).foreign_keys(true);
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    Ok(pool)
}

/// Writes with a `RETURNING` clause must be drained with `fetch_all`. A statement left un-reset keeps its write
/// uncommitted on the pooled connection, invisible to every other connection.
pub(crate) fn returned_row<T>(rows: Vec<T>) -> Result<T, SqliteDatabaseError> {
    rows.into_iter().next().ok_or_else(|| SqliteDatabaseError::QueryError("The write returned no row".into()))
}
