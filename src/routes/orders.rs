//! Order lookup, exchanges and the admin order console.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::db::{self, orders::OrderFilter, Page, StockPolicy, TransitionOutcome};
use crate::domain::aggregates::{
    generate_display_order_id, ExchangeLine, Order, OrderError, OrderKind, OrderLine, OrderRow, OrderStatus, OrderTotals,
    Shipment, ShippingAddress, Transition,
};
use crate::domain::events::{OrderEvent, ProductEvent};
use crate::error::{AppError, AppResult};
use crate::routes::{products::notify_back_in_stock, Paginated};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct OrderView {
    pub display_order_id: String,
    pub user_id: String,
    pub kind: OrderKind,
    pub status: OrderStatus,
    pub lines: Vec<OrderLine>,
    pub totals: OrderTotals,
    pub promo_code: Option<String>,
    pub address: ShippingAddress,
    pub razorpay_order_id: Option<String>,
    pub razorpay_payment_id: Option<String>,
    pub shipment: Shipment,
    pub exchange_of: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&Order> for OrderView {
    fn from(o: &Order) -> Self {
        Self {
            display_order_id: o.display_order_id().to_string(), user_id: o.user_id().to_string(), kind: o.kind(),
            status: o.status(), lines: o.lines().to_vec(), totals: o.totals().clone(),
            promo_code: o.promo_code().map(String::from), address: o.address().clone(),
            razorpay_order_id: o.razorpay_order_id().map(String::from),
            razorpay_payment_id: o.razorpay_payment_id().map(String::from), shipment: o.shipment().clone(),
            exchange_of: o.exchange_of().map(String::from), created_at: o.created_at(),
        }
    }
}

/// Groups rows into orders, keeping the order in which each order first appears.
fn group_rows(rows: Vec<OrderRow>) -> Vec<Order> {
    let mut grouped: Vec<(String, Vec<OrderRow>)> = Vec::new();
    for row in rows {
        match grouped.iter_mut().find(|(id, _)| *id == row.display_order_id) {
            Some((_, group)) => group.push(row),
            None => grouped.push((row.display_order_id.clone(), vec![row])),
        }
    }
    grouped.into_iter().filter_map(|(id, rows)| {
        Order::from_rows(rows)
            .map_err(|e| tracing::warn!(display_order_id = %id, error = %e, "skipping unreadable order"))
            .ok()
    }).collect()
}

/// Publishes what a committed status change means to the outside world.
pub(crate) async fn publish_transition(s: &AppState, order: &Order, from: OrderStatus, product_events: Vec<ProductEvent>) {
    let transition = Transition { from, to: order.status(), effects: vec![] };
    s.events().publish_all(transition.events(order.display_order_id(), order.razorpay_payment_id())).await;
    if let Err(e) = notify_back_in_stock(s, &product_events).await {
        tracing::warn!(error = %e, "failed to release size notifications");
    }
    s.events().publish_all(product_events).await;
}

pub async fn get_order(State(s): State<AppState>, Path(id): Path<String>) -> AppResult<Json<OrderView>> {
    let order = db::orders::load(s.pool(), &id).await?.ok_or_else(|| AppError::NotFound(format!("order {id}")))?;
    Ok(Json(OrderView::from(&order)))
}

pub async fn user_orders(State(s): State<AppState>, Path(user_id): Path<String>) -> AppResult<Json<Vec<OrderView>>> {
    let rows = db::orders::list_for_user(s.pool(), &user_id).await?;
    Ok(Json(group_rows(rows).iter().map(OrderView::from).collect()))
}

#[derive(Debug, Deserialize)]
pub struct ExchangeRequest { pub user_id: String, pub lines: Vec<ExchangeLine> }

/// Raises a replacement order for a delivered one. The replacement stock is taken
/// immediately; the returned garment is restocked by hand once it arrives.
#[instrument(skip(s, r), fields(original = %id))]
pub async fn request_exchange(State(s): State<AppState>, Path(id): Path<String>, Json(r): Json<ExchangeRequest>) -> AppResult<(StatusCode, Json<OrderView>)> {
    let original = db::orders::load(s.pool(), &id).await?
        .filter(|o| o.user_id() == r.user_id)
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))?;
    if original.kind() == OrderKind::Exchange {
        return Err(AppError::Conflict("an exchange order cannot be exchanged again".into()));
    }
    if let Some(existing) = db::orders::exchange_for(s.pool(), &id).await? {
        return Err(AppError::Conflict(format!("order {id} already has exchange {existing}")));
    }

    let (exchange, effects) = Order::exchange_from(&original, generate_display_order_id(OrderKind::Exchange, Utc::now()), &r.lines)?;
    let product_events = db::orders::create(s.pool(), &exchange, &effects).await.map_err(|e| match e {
        // Lost a race with a concurrent request for the same order.
        AppError::Conflict(_) => AppError::Conflict(format!("order {id} already has an exchange")),
        e => e,
    })?;
    tracing::info!(exchange = %exchange.display_order_id(), "exchange created");

    s.events().publish(OrderEvent::ExchangeRequested {
        display_order_id: exchange.display_order_id().to_string(),
        original_order_id: id,
    }).await;
    s.events().publish_all(product_events).await;
    Ok((StatusCode::CREATED, Json(OrderView::from(&exchange))))
}

#[derive(Debug, Deserialize)]
pub struct OrderListParams { pub page: Option<u32>, pub per_page: Option<u32>, pub kind: Option<String>, pub status: Option<String> }

/// Admin order table: one canonical row per order.
pub async fn list_orders(State(s): State<AppState>, Query(p): Query<OrderListParams>) -> AppResult<Json<Paginated<OrderRow>>> {
    let page = Page::new(p.page, p.per_page);
    let kind = p.kind.as_deref().filter(|k| !k.is_empty())
        .map(|k| OrderKind::parse(k).ok_or_else(|| OrderError::UnknownKind(k.to_string())))
        .transpose().map_err(|e| AppError::BadRequest(e.to_string()))?;
    let status = p.status.as_deref().filter(|st| !st.is_empty())
        .map(|st| OrderStatus::parse(st).ok_or_else(|| OrderError::UnknownStatus(st.to_string())))
        .transpose().map_err(|e| AppError::BadRequest(e.to_string()))?;
    let filter = OrderFilter { kind, status, limit: page.limit(), offset: page.offset() };
    let (data, total) = db::orders::list(s.pool(), &filter).await?;
    Ok(Json(Paginated { data, total, page: page.page }))
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest { pub status: OrderStatus }

/// Manual status change from the admin console. Cancelling a paid order returns
/// its stock, promo use and points.
#[instrument(skip(s, r), fields(display_order_id = %id, to = %r.status))]
pub async fn update_status(State(s): State<AppState>, Path(id): Path<String>, Json(r): Json<StatusUpdateRequest>) -> AppResult<Json<OrderView>> {
    match db::orders::transition(s.pool(), &id, r.status, StockPolicy::Clamp, |_| {}).await? {
        TransitionOutcome::Applied { order, from, product_events } => {
            publish_transition(&s, &order, from, product_events).await;
            Ok(Json(OrderView::from(&order)))
        }
        TransitionOutcome::Unchanged(_) => Err(OrderError::AlreadyInStatus(r.status).into()),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ShipmentRequest {
    /// Also move the order to `Shipped` once Shiprocket has accepted it.
    #[serde(default)]
    pub mark_shipped: bool,
}

/// Registers a paid order with Shiprocket and stores the shipment ids on it.
#[instrument(skip(s, r), fields(display_order_id = %id))]
pub async fn create_shipment(State(s): State<AppState>, Path(id): Path<String>, r: Option<Json<ShipmentRequest>>) -> AppResult<Json<OrderView>> {
    let r = r.map(|Json(r)| r).unwrap_or_default();
    // The order stays locked across the Shiprocket call so a second request waits here
    // and then sees the stored id instead of registering the order twice.
    let mut tx = s.pool().begin().await?;
    let mut order = db::orders::lock(&mut tx, &id).await?.ok_or_else(|| AppError::NotFound(format!("order {id}")))?;
    if !matches!(order.status(), OrderStatus::PaymentSuccessful | OrderStatus::Shipped) {
        return Err(OrderError::NotShippable(order.status()).into());
    }
    if let Some(existing) = &order.shipment().shiprocket_order_id {
        return Err(AppError::Conflict(format!("order {id} is already registered with Shiprocket as {existing}")));
    }

    let shipment = s.shiprocket().create_order(&order).await?;
    order.record_shipment(shipment)?;
    let transition = if r.mark_shipped && order.status() == OrderStatus::PaymentSuccessful {
        let t = order.transition(OrderStatus::Shipped)?;
        db::orders::apply_effects(&mut tx, &id, &t.effects, StockPolicy::Clamp).await?;
        Some(t)
    } else {
        None
    };
    db::orders::save(&mut tx, &order).await?;
    tx.commit().await?;

    let shipment = order.shipment();
    tracing::info!(shipment_id = ?shipment.shipment_id, awb = ?shipment.awb_code, "shipment created");
    if let Some(t) = transition {
        s.events().publish_all(t.events(&id, order.razorpay_payment_id())).await;
    }
    s.events().publish(OrderEvent::Shipped {
        display_order_id: id, shipment_id: shipment.shipment_id.clone(), awb: shipment.awb_code.clone(),
    }).await;
    Ok(Json(OrderView::from(&order)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn row(order_id: &str, display: &str, minute: u32) -> OrderRow {
        let at = DateTime::parse_from_rfc3339(&format!("2026-10-01T10:{minute:02}:00Z")).unwrap().with_timezone(&Utc);
        OrderRow {
            order_id: order_id.into(), display_order_id: display.into(), user_id: "u".into(), kind: "domestic".into(),
            status: "Payment Successful".into(), product_id: Uuid::nil(), product_name: "Tee".into(), size: "M".into(),
            quantity: 1, unit_price: Decimal::new(500, 0), subtotal: Decimal::new(500, 0), discount: Decimal::ZERO,
            points_redeemed: 0, points_earned: 0, shipping_charge: Decimal::ZERO, total: Decimal::new(500, 0),
            promo_code: None, customer_name: "A".into(), customer_email: "a@b.in".into(), customer_phone: "9999999999".into(),
            address_line1: "x".into(), address_line2: None, city: "c".into(), state: "s".into(), pincode: "560001".into(),
            country: "India".into(), razorpay_order_id: None, razorpay_payment_id: None, shiprocket_order_id: None,
            shipment_id: None, awb_code: None, exchange_of: None, created_at: at, updated_at: at,
        }
    }

    #[test]
    fn test_group_rows_keeps_order_and_drops_broken() {
        let rows = vec![
            row("B", "B", 5), row("B-2", "B", 5),
            row("A", "A", 1),
            row("C-2", "C", 0),
        ];
        let orders = group_rows(rows);
        let ids: Vec<&str> = orders.iter().map(Order::display_order_id).collect();
        assert_eq!(ids, vec!["B", "A"]);
        assert_eq!(orders[0].lines().len(), 2);
    }
}
