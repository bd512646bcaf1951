//! Checkout: pricing a basket and placing an order awaiting payment.

use std::collections::BTreeMap;

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

use crate::db;
use crate::domain::aggregates::{generate_display_order_id, Order, OrderKind, OrderLine, OrderStatus, ShippingAddress};
use crate::domain::events::OrderEvent;
use crate::domain::pricing::{self, Quote};
use crate::domain::value_objects::{Money, Pincode, StockError, DEFAULT_CURRENCY};
use crate::error::{AppError, AppResult};
use crate::routes::promo;
use crate::state::AppState;

const DOMESTIC_COUNTRY: &str = "India";

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CheckoutItem {
    pub product_id: Uuid,
    #[validate(length(min = 1, max = 16))]
    pub size: String,
    #[validate(range(min = 1, max = 20))]
    pub quantity: u32,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AddressInput {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 10, max = 15))]
    pub phone: String,
    #[validate(length(min = 1, max = 200))]
    pub line1: String,
    pub line2: Option<String>,
    #[validate(length(min = 1, max = 80))]
    pub city: String,
    #[validate(length(min = 1, max = 80))]
    pub state: String,
    #[validate(length(min = 3, max = 12))]
    pub pincode: String,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CheckoutRequest {
    #[validate(length(min = 1, max = 128))]
    pub user_id: String,
    /// Cart to empty once the order has been placed.
    pub session_id: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub items: Vec<CheckoutItem>,
    pub promo_code: Option<String>,
    #[serde(default)]
    pub points: u32,
    #[serde(default)]
    pub kind: OrderKind,
    pub address: Option<AddressInput>,
}

impl CheckoutRequest {
    fn check(&self) -> AppResult<()> {
        self.validate()?;
        for item in &self.items { item.validate()?; }
        if let Some(address) = &self.address { address.validate()?; }
        if self.kind == OrderKind::Exchange {
            return Err(AppError::BadRequest("exchanges are requested from a delivered order".into()));
        }
        Ok(())
    }

    fn shipping_address(&self) -> AppResult<ShippingAddress> {
        let a = self.address.as_ref().ok_or_else(|| AppError::BadRequest("address is required".into()))?;
        let country = a.country.clone().filter(|c| !c.trim().is_empty()).unwrap_or_else(|| DOMESTIC_COUNTRY.to_string());
        let pincode = match self.kind {
            OrderKind::Domestic => Pincode::parse(&a.pincode).map_err(|e| AppError::BadRequest(e.to_string()))?.to_string(),
            _ => a.pincode.trim().to_string(),
        };
        Ok(ShippingAddress {
            name: a.name.trim().to_string(), email: a.email.trim().to_lowercase(), phone: a.phone.trim().to_string(),
            line1: a.line1.trim().to_string(), line2: a.line2.clone().filter(|l| !l.trim().is_empty()),
            city: a.city.trim().to_string(), state: a.state.trim().to_string(), pincode, country,
        })
    }
}

struct Priced { lines: Vec<OrderLine>, quote: Quote, promo_code: Option<String> }

/// Resolves the basket against current catalog prices and stock, then prices it.
async fn price(s: &AppState, r: &CheckoutRequest) -> AppResult<Priced> {
    let ids: Vec<Uuid> = r.items.iter().map(|i| i.product_id).collect();
    let mut catalog = BTreeMap::new();
    for row in db::products::get_many(s.pool(), &ids).await? {
        catalog.insert(row.id, row.into_product()?);
    }

    let mut requested: BTreeMap<(Uuid, &str), u32> = BTreeMap::new();
    for item in &r.items {
        *requested.entry((item.product_id, item.size.as_str())).or_default() += item.quantity;
    }

    let mut lines = Vec::with_capacity(requested.len());
    for ((product_id, size), quantity) in requested {
        let product = catalog.get(&product_id)
            .filter(|p| p.is_purchasable())
            .ok_or_else(|| AppError::NotFound(format!("product {product_id}")))?;
        if !product.stock().has_size(size) {
            return Err(StockError::UnknownSize(size.to_string()).into());
        }
        let available = product.stock().available(size);
        if available < quantity {
            return Err(StockError::Insufficient { size: size.to_string(), available, requested: quantity }.into());
        }
        lines.push(OrderLine {
            order_id: String::new(), product_id, product_name: product.name().to_string(), size: size.to_string(),
            quantity, unit_price: product.price().amount(),
        });
    }

    let promo = match r.promo_code.as_deref().filter(|c| !c.trim().is_empty()) {
        Some(code) => Some(promo::find(s, code).await?),
        None => None,
    };
    let points_available = if r.points > 0 { db::points::balance(s.pool(), &r.user_id).await? } else { 0 };
    let quote = pricing::quote(&lines, promo.as_ref(), r.points, points_available, r.kind, s.pricing(), Utc::now())?;
    Ok(Priced { lines, quote, promo_code: promo.map(|p| p.code) })
}

pub async fn quote(State(s): State<AppState>, Json(r): Json<CheckoutRequest>) -> AppResult<Json<Quote>> {
    r.check()?;
    Ok(Json(price(&s, &r).await?.quote))
}

/// What the browser needs to open the Razorpay checkout widget.
#[derive(Debug, Serialize)]
pub struct PaymentSession { pub key_id: String, pub razorpay_order_id: String, pub amount: i64, pub currency: String }

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub display_order_id: String,
    pub status: OrderStatus,
    pub quote: Quote,
    /// Absent when discounts and points cover the whole amount.
    pub payment: Option<PaymentSession>,
}

#[instrument(skip(s, r), fields(user_id = %r.user_id))]
pub async fn checkout(State(s): State<AppState>, Json(r): Json<CheckoutRequest>) -> AppResult<(StatusCode, Json<CheckoutResponse>)> {
    r.check()?;
    let address = r.shipping_address()?;
    let Priced { lines, quote, promo_code } = price(&s, &r).await?;

    let display_order_id = generate_display_order_id(r.kind, Utc::now());
    let mut order = Order::place(display_order_id.clone(), r.user_id.clone(), r.kind, lines, &quote, promo_code, address)?;

    let amount = Money::inr(quote.total).to_minor_units()?;
    let payment = if amount > 0 {
        let mut notes = BTreeMap::new();
        notes.insert("display_order_id".to_string(), display_order_id.clone());
        notes.insert("user_id".to_string(), r.user_id.clone());
        let rp = s.razorpay().create_order(amount, DEFAULT_CURRENCY, &display_order_id, &notes).await?;
        order.attach_payment_order(rp.id.clone());
        Some(PaymentSession { key_id: s.razorpay().key_id().to_string(), razorpay_order_id: rp.id, amount: rp.amount, currency: rp.currency })
    } else {
        None
    };

    // Redeemed points are held from placement. With nothing to collect the order is confirmed
    // in the same transaction, so a sold-out size leaves no order behind.
    let mut effects = order.placement_effects();
    let confirmed = if payment.is_none() {
        let t = order.transition(OrderStatus::PaymentSuccessful)?;
        effects.extend(t.effects.iter().cloned());
        Some(t)
    } else {
        None
    };
    let product_events = db::orders::create(s.pool(), &order, &effects).await?;

    s.events().publish(OrderEvent::Placed { display_order_id: display_order_id.clone(), user_id: r.user_id.clone(), total: quote.total }).await;
    if let Some(t) = &confirmed {
        s.events().publish_all(t.events(&display_order_id, None)).await;
    }
    s.events().publish_all(product_events).await;
    tracing::info!(%display_order_id, total = %quote.total, lines = order.lines().len(), status = %order.status(), "order placed");
    let status = order.status();

    if let Some(session_id) = r.session_id.as_deref().filter(|id| !id.is_empty()) {
        if let Err(e) = db::cart::clear(s.pool(), session_id).await {
            tracing::warn!(error = %e, %session_id, "failed to clear cart after checkout");
        }
    }

    Ok((StatusCode::CREATED, Json(CheckoutResponse { display_order_id, status, quote, payment })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(kind: OrderKind, pincode: &str) -> CheckoutRequest {
        CheckoutRequest {
            user_id: "user-1".into(), session_id: None,
            items: vec![CheckoutItem { product_id: Uuid::nil(), size: "M".into(), quantity: 1 }],
            promo_code: None, points: 0, kind,
            address: Some(AddressInput {
                name: "Asha Rao".into(), email: "Asha@Example.com".into(), phone: "9876543210".into(),
                line1: "12 MG Road".into(), line2: Some(" ".into()), city: "Bengaluru".into(), state: "Karnataka".into(),
                pincode: pincode.into(), country: None,
            }),
        }
    }

    #[test]
    fn test_domestic_address_requires_pincode() {
        let r = request(OrderKind::Domestic, "560001");
        r.check().unwrap();
        let a = r.shipping_address().unwrap();
        assert_eq!(a.email, "asha@example.com");
        assert_eq!(a.country, "India");
        assert_eq!(a.line2, None);

        let r = request(OrderKind::Domestic, "SW1A 1AA");
        assert!(matches!(r.shipping_address(), Err(AppError::BadRequest(_))));
        let r = request(OrderKind::International, "SW1A 1AA");
        assert_eq!(r.shipping_address().unwrap().pincode, "SW1A 1AA");
    }

    #[test]
    fn test_check_rejects_bad_items() {
        let mut r = request(OrderKind::Domestic, "560001");
        r.items[0].quantity = 0;
        assert!(matches!(r.check(), Err(AppError::BadRequest(_))));

        let mut r = request(OrderKind::Domestic, "560001");
        r.items.clear();
        assert!(r.check().is_err());

        let r = request(OrderKind::Exchange, "560001");
        assert!(r.check().is_err());
    }
}
