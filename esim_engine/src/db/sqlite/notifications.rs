use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::{
    db::sqlite::{returned_row, SqliteDatabaseError},
    db_types::UserNotificationState,
};

pub async fn fetch_state(
    user_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<UserNotificationState>, SqliteDatabaseError> {
    let state = sqlx::query_as::<_, UserNotificationState>(
        r#"
        SELECT user_id, fcm_token, notify_low_data, last_low_data_notified_at, last_low_data_level
        FROM user_notification_state
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(conn)
    .await?;
    Ok(state)
}

pub async fn upsert_preferences(
    user_id: &str,
    fcm_token: Option<String>,
    notify_low_data: bool,
    conn: &mut SqliteConnection,
) -> Result<UserNotificationState, SqliteDatabaseError> {
    let rows = sqlx::query_as::<_, UserNotificationState>(
        r#"
        INSERT INTO user_notification_state (user_id, fcm_token, notify_low_data) VALUES ($1, $2, $3)
        ON CONFLICT (user_id) DO UPDATE SET
            fcm_token = excluded.fcm_token,
            notify_low_data = excluded.notify_low_data
        RETURNING user_id, fcm_token, notify_low_data, last_low_data_notified_at, last_low_data_level
        "#,
    )
    .bind(user_id)
    .bind(fcm_token)
    .bind(notify_low_data)
    .fetch_all(conn)
    .await?;
    returned_row(rows)
}

/// Records the level and time of a delivered low-data notification. Users without a state row get one, with the
/// default preferences.
pub async fn record_low_data_notification(
    user_id: &str,
    level: i64,
    notified_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteDatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO user_notification_state (user_id, last_low_data_notified_at, last_low_data_level)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id) DO UPDATE SET
            last_low_data_notified_at = excluded.last_low_data_notified_at,
            last_low_data_level = excluded.last_low_data_level
        "#,
    )
    .bind(user_id)
    .bind(notified_at)
    .bind(level)
    .execute(conn)
    .await?;
    Ok(())
}
