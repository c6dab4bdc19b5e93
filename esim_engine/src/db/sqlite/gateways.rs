use chrono::Utc;
use esim_common::parse_list;
use log::info;
use sqlx::{FromRow, SqliteConnection};

use crate::{db::sqlite::SqliteDatabaseError, db_types::PaymentGatewayConfig};

#[derive(FromRow)]
struct GatewayRow {
    slug: String,
    name: String,
    is_enabled: bool,
    is_test_mode: bool,
    is_default: bool,
    supported_currencies: String,
    supported_payment_methods: String,
}

impl From<GatewayRow> for PaymentGatewayConfig {
    fn from(row: GatewayRow) -> Self {
        Self {
            slug: row.slug,
            name: row.name,
            is_enabled: row.is_enabled,
            is_test_mode: row.is_test_mode,
            is_default: row.is_default,
            supported_currencies: parse_list(&row.supported_currencies)
                .into_iter()
                .map(|c| c.to_ascii_lowercase())
                .collect(),
            supported_payment_methods: parse_list(&row.supported_payment_methods),
        }
    }
}

pub async fn fetch_configs(conn: &mut SqliteConnection) -> Result<Vec<PaymentGatewayConfig>, SqliteDatabaseError> {
    let rows = sqlx::query_as::<_, GatewayRow>(
        r#"
        SELECT slug, name, is_enabled, is_test_mode, is_default, supported_currencies, supported_payment_methods
        FROM payment_gateways
        ORDER BY created_at ASC, rowid ASC
        "#,
    )
    .fetch_all(conn)
    .await?;
    Ok(rows.into_iter().map(PaymentGatewayConfig::from).collect())
}

pub async fn upsert_config(config: PaymentGatewayConfig, conn: &mut SqliteConnection) -> Result<(), SqliteDatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO payment_gateways (
            slug, name, is_enabled, is_test_mode, supported_currencies, supported_payment_methods, created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (slug) DO UPDATE SET
            name = excluded.name,
            is_enabled = excluded.is_enabled,
            is_test_mode = excluded.is_test_mode,
            supported_currencies = excluded.supported_currencies,
            supported_payment_methods = excluded.supported_payment_methods
        "#,
    )
    .bind(&config.slug)
    .bind(&config.name)
    .bind(config.is_enabled)
    .bind(config.is_test_mode)
    .bind(config.supported_currencies.join(","))
    .bind(config.supported_payment_methods.join(","))
    .bind(Utc::now())
    .execute(conn)
    .await?;
    Ok(())
}

/// Clears the default flag on every gateway and sets it on `slug`. Run inside a transaction.
pub async fn set_default(slug: &str, conn: &mut SqliteConnection) -> Result<(), SqliteDatabaseError> {
    sqlx::query("UPDATE payment_gateways SET is_default = 0 WHERE is_default = 1").execute(&mut *conn).await?;
    let result = sqlx::query("UPDATE payment_gateways SET is_default = 1 WHERE slug = $1").bind(slug).execute(conn).await?;
    if result.rows_affected() == 0 {
        return Err(SqliteDatabaseError::GatewayNotFound(slug.to_string()));
    }
    info!("🗃️ {slug} is now the default payment gateway");
    Ok(())
}
