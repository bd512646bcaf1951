//! Order persistence and the transactional application of lifecycle effects.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use crate::db::{points, products, promo_codes, PointsReason};
use crate::domain::aggregates::{Effect, Order, OrderError, OrderKind, OrderRow, OrderStatus};
use crate::domain::events::ProductEvent;
use crate::error::AppError;

const COLUMNS: &str = "order_id, display_order_id, user_id, kind, status, product_id, product_name, size, quantity, unit_price, \
    subtotal, discount, points_redeemed, points_earned, shipping_charge, total, promo_code, customer_name, customer_email, \
    customer_phone, address_line1, address_line2, city, state, pincode, country, razorpay_order_id, razorpay_payment_id, \
    shiprocket_order_id, shipment_id, awb_code, exchange_of, created_at, updated_at";

/// How a `TakeStock` effect treats a size that no longer has enough units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockPolicy {
    /// Fail the whole transaction.
    Strict,
    /// Take what is left and log the shortfall. Used once money has been captured.
    Clamp,
}

#[derive(Debug, Default, Clone)]
pub struct OrderFilter { pub kind: Option<OrderKind>, pub status: Option<OrderStatus>, pub limit: i64, pub offset: i64 }

pub async fn insert(conn: &mut PgConnection, order: &Order) -> Result<(), sqlx::Error> {
    for r in order.to_rows() {
        sqlx::query(&format!(
            "INSERT INTO orders ({COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, \
             $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28, $29, $30, $31, $32, $33, $34)"
        ))
        .bind(&r.order_id).bind(&r.display_order_id).bind(&r.user_id).bind(&r.kind).bind(&r.status)
        .bind(r.product_id).bind(&r.product_name).bind(&r.size).bind(r.quantity).bind(r.unit_price)
        .bind(r.subtotal).bind(r.discount).bind(r.points_redeemed).bind(r.points_earned).bind(r.shipping_charge)
        .bind(r.total).bind(&r.promo_code).bind(&r.customer_name).bind(&r.customer_email).bind(&r.customer_phone)
        .bind(&r.address_line1).bind(&r.address_line2).bind(&r.city).bind(&r.state).bind(&r.pincode).bind(&r.country)
        .bind(&r.razorpay_order_id).bind(&r.razorpay_payment_id).bind(&r.shiprocket_order_id).bind(&r.shipment_id)
        .bind(&r.awb_code).bind(&r.exchange_of).bind(r.created_at).bind(r.updated_at)
        .execute(&mut *conn).await?;
    }
    Ok(())
}

fn rebuild(rows: Vec<OrderRow>) -> Result<Option<Order>, AppError> {
    if rows.is_empty() { return Ok(None); }
    Ok(Some(Order::from_rows(rows)?))
}

pub async fn load(pool: &PgPool, display_order_id: &str) -> Result<Option<Order>, AppError> {
    let rows = sqlx::query_as::<_, OrderRow>(&format!("SELECT {COLUMNS} FROM orders WHERE display_order_id = $1 ORDER BY order_id"))
        .bind(display_order_id).fetch_all(pool).await?;
    rebuild(rows)
}

/// Loads an order with all of its rows locked until the transaction ends.
pub async fn lock(conn: &mut PgConnection, display_order_id: &str) -> Result<Option<Order>, AppError> {
    let rows = sqlx::query_as::<_, OrderRow>(&format!("SELECT {COLUMNS} FROM orders WHERE display_order_id = $1 ORDER BY order_id FOR UPDATE"))
        .bind(display_order_id).fetch_all(conn).await?;
    rebuild(rows)
}

pub async fn display_id_for_payment(pool: &PgPool, razorpay_order_id: &str) -> Result<Option<String>, sqlx::Error> {
    let row: Option<(String,)> = sqlx::query_as("SELECT display_order_id FROM orders WHERE razorpay_order_id = $1 AND order_id = display_order_id")
        .bind(razorpay_order_id).fetch_optional(pool).await?;
    Ok(row.map(|r| r.0))
}

/// Display id of an exchange already raised against `display_order_id`, if any.
pub async fn exchange_for(pool: &PgPool, display_order_id: &str) -> Result<Option<String>, sqlx::Error> {
    let row: Option<(String,)> = sqlx::query_as("SELECT display_order_id FROM orders WHERE exchange_of = $1 AND order_id = display_order_id LIMIT 1")
        .bind(display_order_id).fetch_optional(pool).await?;
    Ok(row.map(|r| r.0))
}

/// Canonical rows only: one entry per order.
pub async fn list(pool: &PgPool, f: &OrderFilter) -> Result<(Vec<OrderRow>, i64), sqlx::Error> {
    let filter = "WHERE order_id = display_order_id AND ($1::TEXT IS NULL OR kind = $1) AND ($2::TEXT IS NULL OR status = $2)";
    let kind = f.kind.map(|k| k.as_str());
    let status = f.status.map(|s| s.as_str());
    let rows = sqlx::query_as::<_, OrderRow>(&format!("SELECT {COLUMNS} FROM orders {filter} ORDER BY created_at DESC LIMIT $3 OFFSET $4"))
        .bind(kind).bind(status).bind(f.limit).bind(f.offset).fetch_all(pool).await?;
    let total: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM orders {filter}"))
        .bind(kind).bind(status).fetch_one(pool).await?;
    Ok((rows, total.0))
}

pub async fn list_for_user(pool: &PgPool, user_id: &str) -> Result<Vec<OrderRow>, sqlx::Error> {
    sqlx::query_as::<_, OrderRow>(&format!("SELECT {COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC, order_id"))
        .bind(user_id).fetch_all(pool).await
}

/// Every row created since `since`, for dashboard aggregation.
pub async fn rows_since(pool: &PgPool, since: DateTime<Utc>) -> Result<Vec<OrderRow>, sqlx::Error> {
    sqlx::query_as::<_, OrderRow>(&format!("SELECT {COLUMNS} FROM orders WHERE created_at >= $1 ORDER BY created_at"))
        .bind(since).fetch_all(pool).await
}

/// Writes the order-level fields to every row of the order.
pub async fn save(conn: &mut PgConnection, order: &Order) -> Result<(), sqlx::Error> {
    let shipment = order.shipment();
    sqlx::query(
        "UPDATE orders SET status = $2, razorpay_order_id = $3, razorpay_payment_id = $4, shiprocket_order_id = $5, \
         shipment_id = $6, awb_code = $7, updated_at = NOW() WHERE display_order_id = $1",
    )
    .bind(order.display_order_id()).bind(order.status().as_str()).bind(order.razorpay_order_id())
    .bind(order.razorpay_payment_id()).bind(&shipment.shiprocket_order_id).bind(&shipment.shipment_id).bind(&shipment.awb_code)
    .execute(conn).await?;
    Ok(())
}

/// Applies lifecycle effects inside the caller's transaction.
///
/// Returns product events raised along the way (sizes coming back into stock).
pub async fn apply_effects(conn: &mut PgConnection, display_order_id: &str, effects: &[Effect], policy: StockPolicy) -> Result<Vec<ProductEvent>, AppError> {
    let mut events = Vec::new();
    for effect in effects {
        match effect {
            Effect::TakeStock { product_id, size, quantity } => {
                let mut product = products::lock(&mut *conn, *product_id).await?
                    .ok_or_else(|| AppError::NotFound(format!("product {product_id}")))?
                    .into_product()?;
                match policy {
                    StockPolicy::Strict => product.reserve(size, *quantity)?,
                    StockPolicy::Clamp => {
                        let taken = product.reserve_up_to(size, *quantity);
                        if taken < *quantity {
                            tracing::warn!(%display_order_id, %product_id, %size, requested = quantity, taken, "short or removed size, took what was left");
                        }
                    }
                }
                products::save_stock(&mut *conn, *product_id, product.stock()).await?;
                events.extend(product.take_events());
            }
            Effect::ReturnStock { product_id, size, quantity } => {
                let mut product = products::lock(&mut *conn, *product_id).await?
                    .ok_or_else(|| AppError::NotFound(format!("product {product_id}")))?
                    .into_product()?;
                product.restock(size, *quantity);
                products::save_stock(&mut *conn, *product_id, product.stock()).await?;
                events.extend(product.take_events());
            }
            Effect::ConsumePromo { code } => promo_codes::consume(&mut *conn, code).await?,
            Effect::ReleasePromo { code } => promo_codes::release(&mut *conn, code).await?,
            Effect::DebitPoints { user_id, points: n } => points::redeem(&mut *conn, user_id, *n, display_order_id).await?,
            Effect::RefundPoints { user_id, points: n } => points::adjust(&mut *conn, user_id, i64::from(*n), PointsReason::Refunded, Some(display_order_id)).await?,
            Effect::CreditPoints { user_id, points: n } => points::adjust(&mut *conn, user_id, i64::from(*n), PointsReason::Earned, Some(display_order_id)).await?,
            Effect::RevokePoints { user_id, points: n } => points::adjust(&mut *conn, user_id, -i64::from(*n), PointsReason::Revoked, Some(display_order_id)).await?,
        }
    }
    Ok(events)
}

/// Outcome of a status change request.
#[derive(Debug)]
pub enum TransitionOutcome {
    Applied { order: Order, from: OrderStatus, product_events: Vec<ProductEvent> },
    /// The order was already in the requested status; nothing was written.
    Unchanged(Order),
}

/// Moves an order to `to`, writing the status and all of its effects in one transaction.
///
/// `before_save` runs on the locked order after the transition and before it is written,
/// for callers that attach payment details.
pub async fn transition(
    pool: &PgPool, display_order_id: &str, to: OrderStatus, policy: StockPolicy, before_save: impl FnOnce(&mut Order),
) -> Result<TransitionOutcome, AppError> {
    let mut tx = pool.begin().await?;
    let mut order = lock(&mut tx, display_order_id).await?
        .ok_or_else(|| AppError::NotFound(format!("order {display_order_id}")))?;
    let transition = match order.transition(to) {
        Ok(t) => t,
        Err(OrderError::AlreadyInStatus(_)) => return Ok(TransitionOutcome::Unchanged(order)),
        Err(e) => return Err(e.into()),
    };
    before_save(&mut order);
    let product_events = apply_effects(&mut tx, display_order_id, &transition.effects, policy).await?;
    save(&mut tx, &order).await?;
    tx.commit().await?;
    tracing::info!(%display_order_id, from = %transition.from, to = %transition.to, effects = transition.effects.len(), "order status changed");
    Ok(TransitionOutcome::Applied { order, from: transition.from, product_events })
}

/// Inserts a new order together with any effects it needs up front: redeemed points at
/// placement, stock for exchanges and orders that need no payment. Nothing is written
/// unless every effect applies.
pub async fn create(pool: &PgPool, order: &Order, effects: &[Effect]) -> Result<Vec<ProductEvent>, AppError> {
    let display_order_id = order.display_order_id();
    let mut tx = pool.begin().await?;
    insert(&mut tx, order).await.map_err(|e| AppError::from_insert(e, format!("order {display_order_id}")))?;
    let events = apply_effects(&mut tx, display_order_id, effects, StockPolicy::Strict).await?;
    tx.commit().await?;
    Ok(events)
}
