use chrono::Utc;
use log::{debug, trace};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    db::sqlite::{returned_row, SqliteDatabaseError},
    db_types::{NewOrder, Order, OrderStatusType, PaymentStatus},
};

const ORDER_COLUMNS: &str = r#"
    id,
    display_order_id,
    user_id,
    provider_id,
    provider_order_ref,
    iccid,
    status,
    payment_intent_id,
    payment_status,
    retry_count,
    created_at,
    updated_at
"#;

/// Inserts a new order using the given connection. This is not atomic. You can embed this call inside a transaction
/// if you need atomicity, and pass `&mut *tx` as the connection argument.
pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, SqliteDatabaseError> {
    let now = Utc::now();
    let sql = format!(
        r#"
        INSERT INTO orders (
            display_order_id, user_id, provider_id, provider_order_ref, iccid, status, payment_intent_id, created_at,
            updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
        RETURNING {ORDER_COLUMNS};
        "#
    );
    let rows = sqlx::query_as::<_, Order>(&sql)
        .bind(&order.display_order_id)
        .bind(&order.user_id)
        .bind(order.provider_id)
        .bind(&order.provider_order_ref)
        .bind(&order.iccid)
        .bind(order.status)
        .bind(&order.payment_intent_id)
        .bind(now)
        .fetch_all(conn)
        .await?;
    let order = returned_row(rows)?;
    debug!("🗃️ Order {} has been saved in the DB with id {}", order.display_order_id, order.id);
    Ok(order)
}

pub async fn fetch_order(id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, SqliteDatabaseError> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
    let order = sqlx::query_as::<_, Order>(&sql).bind(id).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_order_by_display_id(
    display_order_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, SqliteDatabaseError> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE display_order_id = $1");
    let order = sqlx::query_as::<_, Order>(&sql).bind(display_order_id).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_order_by_payment_intent(
    payment_intent_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, SqliteDatabaseError> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE payment_intent_id = $1 ORDER BY id DESC LIMIT 1");
    let order = sqlx::query_as::<_, Order>(&sql).bind(payment_intent_id).fetch_optional(conn).await?;
    Ok(order)
}

/// Fetches the orders in any of `statuses`, oldest first. An empty status list returns no orders.
pub async fn fetch_orders_by_status(
    statuses: &[OrderStatusType],
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, SqliteDatabaseError> {
    if statuses.is_empty() {
        return Ok(vec![]);
    }
    let mut builder = QueryBuilder::<Sqlite>::new(format!("SELECT {ORDER_COLUMNS} FROM orders WHERE status IN ("));
    let mut list = builder.separated(", ");
    for status in statuses {
        list.push_bind(*status);
    }
    list.push_unseparated(") ORDER BY created_at ASC, id ASC");
    trace!("🗃️ Executing query: {}", builder.sql());
    let orders = builder.build_query_as::<Order>().fetch_all(conn).await?;
    Ok(orders)
}

pub async fn fetch_retryable_orders(
    max_retries: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, SqliteDatabaseError> {
    let sql = format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE status = $1 AND retry_count < $2 ORDER BY created_at ASC, id ASC"
    );
    let orders = sqlx::query_as::<_, Order>(&sql)
        .bind(OrderStatusType::Failed)
        .bind(max_retries)
        .fetch_all(conn)
        .await?;
    Ok(orders)
}

/// Moves the order to `status`, enforcing the order state machine. Setting the current status again returns the order
/// untouched.
pub async fn update_order_status(
    id: i64,
    status: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<Order, SqliteDatabaseError> {
    let order = fetch_order(id, &mut *conn).await?.ok_or(SqliteDatabaseError::OrderNotFound(id))?;
    if order.status == status {
        return Ok(order);
    }
    if !order.status.can_transition_to(status) {
        return Err(SqliteDatabaseError::InvalidTransition { id, from: order.status, to: status });
    }
    let sql = format!("UPDATE orders SET status = $1, updated_at = $2 WHERE id = $3 RETURNING {ORDER_COLUMNS}");
    let rows = sqlx::query_as::<_, Order>(&sql).bind(status).bind(Utc::now()).bind(id).fetch_all(conn).await?;
    let updated = returned_row(rows)?;
    debug!("🗃️ Order #{id} moved from {} to {status}", order.status);
    Ok(updated)
}

pub async fn retry_order(id: i64, conn: &mut SqliteConnection) -> Result<Order, SqliteDatabaseError> {
    let order = fetch_order(id, &mut *conn).await?.ok_or(SqliteDatabaseError::OrderNotFound(id))?;
    if order.status != OrderStatusType::Failed {
        return Err(SqliteDatabaseError::InvalidTransition {
            id,
            from: order.status,
            to: OrderStatusType::Processing,
        });
    }
    let sql = format!(
        "UPDATE orders SET status = $1, retry_count = retry_count + 1, updated_at = $2 WHERE id = $3 RETURNING \
         {ORDER_COLUMNS}"
    );
    let rows = sqlx::query_as::<_, Order>(&sql)
        .bind(OrderStatusType::Processing)
        .bind(Utc::now())
        .bind(id)
        .fetch_all(conn)
        .await?;
    let updated = returned_row(rows)?;
    debug!("🗃️ Order #{id} queued for retry #{}", updated.retry_count);
    Ok(updated)
}

pub async fn update_payment_status(
    payment_intent_id: &str,
    status: PaymentStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, SqliteDatabaseError> {
    let sql = format!(
        "UPDATE orders SET payment_status = $1, updated_at = $2 WHERE payment_intent_id = $3 RETURNING \
         {ORDER_COLUMNS}"
    );
    let order = sqlx::query_as::<_, Order>(&sql)
        .bind(status)
        .bind(Utc::now())
        .bind(payment_intent_id)
        .fetch_all(conn)
        .await?
        .into_iter()
        .next();
    if let Some(o) = &order {
        debug!("🗃️ Payment status of order {} set to {status}", o.display_order_id);
    }
    Ok(order)
}
