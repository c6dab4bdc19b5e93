use chrono::Utc;
use sqlx::SqliteConnection;

use crate::db::sqlite::SqliteDatabaseError;

pub async fn get_setting(key: &str, conn: &mut SqliteConnection) -> Result<Option<String>, SqliteDatabaseError> {
    let value = sqlx::query_scalar::<_, String>("SELECT value FROM settings WHERE key = $1")
        .bind(key)
        .fetch_optional(conn)
        .await?;
    Ok(value)
}

pub async fn set_setting(key: &str, value: &str, conn: &mut SqliteConnection) -> Result<(), SqliteDatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO settings (key, value, updated_at) VALUES ($1, $2, $3)
        ON CONFLICT (key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
        "#,
    )
    .bind(key)
    .bind(value)
    .bind(Utc::now())
    .execute(conn)
    .await?;
    Ok(())
}
