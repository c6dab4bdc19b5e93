use chrono::{DateTime, Utc};
use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db::sqlite::{returned_row, SqliteDatabaseError},
    db_types::{NewProvider, Provider},
};

const PROVIDER_COLUMNS: &str = r#"
    id,
    slug,
    name,
    enabled,
    is_preferred,
    pricing_margin,
    sync_interval_minutes,
    last_sync_at,
    api_rate_limit_per_hour,
    created_at,
    updated_at
"#;

/// Inserts the provider, or updates the configuration of the provider with the same slug.
pub async fn upsert_provider(
    provider: NewProvider,
    conn: &mut SqliteConnection,
) -> Result<Provider, SqliteDatabaseError> {
    let now = Utc::now();
    let sql = format!(
        r#"
        INSERT INTO providers (
            slug, name, enabled, is_preferred, pricing_margin, sync_interval_minutes, api_rate_limit_per_hour,
            created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
        ON CONFLICT (slug) DO UPDATE SET
            name = excluded.name,
            enabled = excluded.enabled,
            is_preferred = excluded.is_preferred,
            pricing_margin = excluded.pricing_margin,
            sync_interval_minutes = excluded.sync_interval_minutes,
            api_rate_limit_per_hour = excluded.api_rate_limit_per_hour,
            updated_at = excluded.updated_at
        RETURNING {PROVIDER_COLUMNS};
        "#
    );
    let rows = sqlx::query_as::<_, Provider>(&sql)
        .bind(&provider.slug)
        .bind(&provider.name)
        .bind(provider.enabled)
        .bind(provider.is_preferred)
        .bind(provider.pricing_margin)
        .bind(provider.sync_interval_minutes)
        .bind(provider.api_rate_limit_per_hour)
        .bind(now)
        .fetch_all(conn)
        .await?;
    let provider = returned_row(rows)?;
    debug!("🗃️ Provider {} saved with id {}", provider.slug, provider.id);
    Ok(provider)
}

pub async fn fetch_provider(id: i64, conn: &mut SqliteConnection) -> Result<Option<Provider>, SqliteDatabaseError> {
    let sql = format!("SELECT {PROVIDER_COLUMNS} FROM providers WHERE id = $1");
    let provider = sqlx::query_as::<_, Provider>(&sql).bind(id).fetch_optional(conn).await?;
    Ok(provider)
}

pub async fn fetch_provider_by_slug(
    slug: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Provider>, SqliteDatabaseError> {
    let sql = format!("SELECT {PROVIDER_COLUMNS} FROM providers WHERE slug = $1");
    let provider = sqlx::query_as::<_, Provider>(&sql).bind(slug).fetch_optional(conn).await?;
    Ok(provider)
}

/// Fetches all providers, or only the enabled ones, ordered by id.
pub async fn fetch_providers(
    enabled_only: bool,
    conn: &mut SqliteConnection,
) -> Result<Vec<Provider>, SqliteDatabaseError> {
    let filter = if enabled_only { "WHERE enabled = 1" } else { "" };
    let sql = format!("SELECT {PROVIDER_COLUMNS} FROM providers {filter} ORDER BY id ASC");
    let providers = sqlx::query_as::<_, Provider>(&sql).fetch_all(conn).await?;
    Ok(providers)
}

pub async fn set_provider_enabled(
    slug: &str,
    enabled: bool,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteDatabaseError> {
    let result = sqlx::query("UPDATE providers SET enabled = $1, updated_at = $2 WHERE slug = $3")
        .bind(enabled)
        .bind(Utc::now())
        .bind(slug)
        .execute(conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(SqliteDatabaseError::ProviderNotFound(slug.to_string()));
    }
    Ok(())
}

pub async fn mark_provider_synced(
    provider_id: i64,
    synced_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteDatabaseError> {
    let result = sqlx::query("UPDATE providers SET last_sync_at = $1 WHERE id = $2")
        .bind(synced_at)
        .bind(provider_id)
        .execute(conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(SqliteDatabaseError::ProviderNotFound(provider_id.to_string()));
    }
    Ok(())
}
