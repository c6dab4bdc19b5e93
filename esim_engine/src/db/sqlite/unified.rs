use chrono::Utc;
use sqlx::SqliteConnection;

use crate::{
    db::sqlite::{returned_row, SqliteDatabaseError},
    db_types::{CatalogKey, NewUnifiedPackage, UnifiedPackage, UpsertResult},
};

const UNIFIED_COLUMNS: &str = r#"
    id,
    destination,
    data_amount_mb,
    validity_days,
    provider_id,
    package_id,
    base_price,
    customer_price,
    currency,
    active,
    updated_at
"#;

pub async fn fetch_by_key(
    key: &CatalogKey,
    conn: &mut SqliteConnection,
) -> Result<Option<UnifiedPackage>, SqliteDatabaseError> {
    let sql = format!(
        "SELECT {UNIFIED_COLUMNS} FROM unified_packages WHERE destination = $1 AND data_amount_mb = $2 AND \
         validity_days = $3"
    );
    let row = sqlx::query_as::<_, UnifiedPackage>(&sql)
        .bind(&key.destination)
        .bind(key.data_amount_mb)
        .bind(key.validity_days)
        .fetch_optional(conn)
        .await?;
    Ok(row)
}

pub async fn fetch_active_for_provider(
    provider_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<UnifiedPackage>, SqliteDatabaseError> {
    let sql = format!(
        "SELECT {UNIFIED_COLUMNS} FROM unified_packages WHERE provider_id = $1 AND active = 1 ORDER BY id ASC"
    );
    let rows = sqlx::query_as::<_, UnifiedPackage>(&sql).bind(provider_id).fetch_all(conn).await?;
    Ok(rows)
}

pub async fn fetch_catalog(
    active_only: bool,
    conn: &mut SqliteConnection,
) -> Result<Vec<UnifiedPackage>, SqliteDatabaseError> {
    let filter = if active_only { "WHERE active = 1" } else { "" };
    let sql = format!(
        "SELECT {UNIFIED_COLUMNS} FROM unified_packages {filter} ORDER BY destination ASC, data_amount_mb ASC, \
         validity_days ASC"
    );
    let rows = sqlx::query_as::<_, UnifiedPackage>(&sql).fetch_all(conn).await?;
    Ok(rows)
}

/// Inserts or refreshes the row for `row.key`. Rows are matched on the catalog key, so repeated merges never create
/// duplicates.
pub async fn upsert(row: NewUnifiedPackage, conn: &mut SqliteConnection) -> Result<UpsertResult, SqliteDatabaseError> {
    let existing = fetch_by_key(&row.key, &mut *conn).await?;
    let now = Utc::now();
    match existing {
        None => {
            let ids: Vec<i64> = sqlx::query_scalar(
                r#"
                INSERT INTO unified_packages (
                    destination, data_amount_mb, validity_days, provider_id, package_id, base_price, customer_price,
                    currency, active, updated_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 1, $9)
                RETURNING id
                "#,
            )
            .bind(&row.key.destination)
            .bind(row.key.data_amount_mb)
            .bind(row.key.validity_days)
            .bind(row.provider_id)
            .bind(row.package_id)
            .bind(row.base_price)
            .bind(row.customer_price)
            .bind(&row.currency)
            .bind(now)
            .fetch_all(conn)
            .await?;
            Ok(UpsertResult::Created(returned_row(ids)?))
        },
        Some(current) if is_unchanged(&current, &row) => Ok(UpsertResult::Unchanged(current.id)),
        Some(current) => {
            sqlx::query(
                r#"
                UPDATE unified_packages SET
                    provider_id = $1,
                    package_id = $2,
                    base_price = $3,
                    customer_price = $4,
                    currency = $5,
                    active = 1,
                    updated_at = $6
                WHERE id = $7
                "#,
            )
            .bind(row.provider_id)
            .bind(row.package_id)
            .bind(row.base_price)
            .bind(row.customer_price)
            .bind(&row.currency)
            .bind(now)
            .bind(current.id)
            .execute(conn)
            .await?;
            Ok(UpsertResult::Updated(current.id))
        },
    }
}

fn is_unchanged(current: &UnifiedPackage, row: &NewUnifiedPackage) -> bool {
    current.active &&
        current.provider_id == row.provider_id &&
        current.package_id == row.package_id &&
        current.base_price == row.base_price &&
        current.customer_price == row.customer_price &&
        current.currency == row.currency
}

pub async fn deactivate(key: &CatalogKey, conn: &mut SqliteConnection) -> Result<bool, SqliteDatabaseError> {
    let result = sqlx::query(
        r#"
        UPDATE unified_packages SET active = 0, updated_at = $1
        WHERE destination = $2 AND data_amount_mb = $3 AND validity_days = $4 AND active = 1
        "#,
    )
    .bind(Utc::now())
    .bind(&key.destination)
    .bind(key.data_amount_mb)
    .bind(key.validity_days)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}
