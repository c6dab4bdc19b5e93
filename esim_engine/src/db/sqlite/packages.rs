use std::collections::{HashMap, HashSet};

use chrono::Utc;
use log::{trace, warn};
use sqlx::SqliteConnection;

use crate::{
    db::sqlite::{returned_row, SqliteDatabaseError},
    db_types::{CatalogKey, CatalogOffer, NewPackage, Package, PackageReplaceResult},
};

const PACKAGE_COLUMNS: &str = r#"
    id,
    provider_id,
    package_code,
    destination,
    title,
    data_amount_mb,
    validity_days,
    price,
    currency,
    active,
    updated_at
"#;

pub async fn fetch_package(id: i64, conn: &mut SqliteConnection) -> Result<Option<Package>, SqliteDatabaseError> {
    let sql = format!("SELECT {PACKAGE_COLUMNS} FROM packages WHERE id = $1");
    let package = sqlx::query_as::<_, Package>(&sql).bind(id).fetch_optional(conn).await?;
    Ok(package)
}

/// Fetches the packages of a provider, ordered by id. Inactive packages are included when `active_only` is false.
pub async fn fetch_packages_for_provider(
    provider_id: i64,
    active_only: bool,
    conn: &mut SqliteConnection,
) -> Result<Vec<Package>, SqliteDatabaseError> {
    let filter = if active_only { "AND active = 1" } else { "" };
    let sql = format!("SELECT {PACKAGE_COLUMNS} FROM packages WHERE provider_id = $1 {filter} ORDER BY id ASC");
    let packages = sqlx::query_as::<_, Package>(&sql).bind(provider_id).fetch_all(conn).await?;
    Ok(packages)
}

/// Replaces the provider's package set. This is not atomic on its own; run it inside a transaction and pass
/// `&mut tx` as the connection.
pub async fn replace_provider_packages(
    provider_id: i64,
    packages: Vec<NewPackage>,
    conn: &mut SqliteConnection,
) -> Result<PackageReplaceResult, SqliteDatabaseError> {
    let existing = fetch_packages_for_provider(provider_id, false, &mut *conn)
        .await?
        .into_iter()
        .map(|p| (p.package_code.clone(), p))
        .collect::<HashMap<String, Package>>();
    let mut incoming = HashMap::with_capacity(packages.len());
    for package in packages {
        if let Some(dup) = incoming.insert(package.package_code.clone(), package) {
            warn!("🗃️ Provider #{provider_id} returned package {} more than once. Keeping the last one.", dup.package_code);
        }
    }
    let mut result = PackageReplaceResult::default();
    let now = Utc::now();
    for (code, package) in &incoming {
        match existing.get(code) {
            None => {
                insert_package(provider_id, package, &mut *conn).await?;
                result.inserted += 1;
            },
            Some(current) if current.active && same_offer(current, package) => {
                result.unchanged += 1;
            },
            Some(current) => {
                sqlx::query(
                    r#"
                    UPDATE packages SET
                        destination = $1,
                        title = $2,
                        data_amount_mb = $3,
                        validity_days = $4,
                        price = $5,
                        currency = $6,
                        active = 1,
                        updated_at = $7
                    WHERE id = $8
                    "#,
                )
                .bind(package.destination.to_ascii_uppercase())
                .bind(&package.title)
                .bind(package.data_amount_mb)
                .bind(package.validity_days)
                .bind(package.price)
                .bind(&package.currency)
                .bind(now)
                .bind(current.id)
                .execute(&mut *conn)
                .await?;
                trace!("🗃️ Package {code} of provider #{provider_id} updated");
                result.updated += 1;
            },
        }
    }
    let incoming_codes = incoming.keys().collect::<HashSet<_>>();
    for stale in existing.values().filter(|p| p.active && !incoming_codes.contains(&p.package_code)) {
        sqlx::query("UPDATE packages SET active = 0, updated_at = $1 WHERE id = $2")
            .bind(now)
            .bind(stale.id)
            .execute(&mut *conn)
            .await?;
        trace!("🗃️ Package {} of provider #{provider_id} is no longer offered", stale.package_code);
        result.removed += 1;
    }
    Ok(result)
}

async fn insert_package(
    provider_id: i64,
    package: &NewPackage,
    conn: &mut SqliteConnection,
) -> Result<i64, SqliteDatabaseError> {
    let ids: Vec<i64> = sqlx::query_scalar(
        r#"
        INSERT INTO packages (
            provider_id, package_code, destination, title, data_amount_mb, validity_days, price, currency, active,
            updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 1, $9)
        RETURNING id
        "#,
    )
    .bind(provider_id)
    .bind(&package.package_code)
    .bind(package.destination.to_ascii_uppercase())
    .bind(&package.title)
    .bind(package.data_amount_mb)
    .bind(package.validity_days)
    .bind(package.price)
    .bind(&package.currency)
    .bind(Utc::now())
    .fetch_all(conn)
    .await?;
    returned_row(ids)
}

fn same_offer(current: &Package, package: &NewPackage) -> bool {
    current.destination == package.destination.to_ascii_uppercase() &&
        current.title == package.title &&
        current.data_amount_mb == package.data_amount_mb &&
        current.validity_days == package.validity_days &&
        current.price == package.price &&
        current.currency == package.currency
}

/// Fetches the live offers for a catalog key: active packages belonging to enabled providers.
pub async fn fetch_offers_for_key(
    key: &CatalogKey,
    conn: &mut SqliteConnection,
) -> Result<Vec<CatalogOffer>, SqliteDatabaseError> {
    let offers = sqlx::query_as::<_, CatalogOffer>(
        r#"
        SELECT
            p.id AS package_id,
            p.provider_id,
            pr.is_preferred,
            pr.pricing_margin,
            p.price,
            p.currency
        FROM packages p
        JOIN providers pr ON pr.id = p.provider_id
        WHERE p.active = 1
          AND pr.enabled = 1
          AND p.destination = $1
          AND p.data_amount_mb = $2
          AND p.validity_days = $3
        ORDER BY p.provider_id ASC, p.id ASC
        "#,
    )
    .bind(&key.destination)
    .bind(key.data_amount_mb)
    .bind(key.validity_days)
    .fetch_all(conn)
    .await?;
    Ok(offers)
}
