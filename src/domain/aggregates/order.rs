//! Order Aggregate
//!
//! An order is persisted as one row per purchased line. Rows of one checkout
//! share `display_order_id`, and the row whose `order_id` equals it is the
//! canonical row carrying order-level fields. The aggregate rebuilds itself
//! from those rows and decides, for every status change, which stock, promo
//! and points effects have to be applied alongside it.

use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::domain::events::OrderEvent;
use crate::domain::pricing::Quote;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    #[serde(rename = "Payment Pending")]
    PaymentPending,
    #[serde(rename = "Payment Successful")]
    PaymentSuccessful,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [Self::PaymentPending, Self::PaymentSuccessful, Self::Shipped, Self::Delivered, Self::Cancelled];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PaymentPending => "Payment Pending",
            Self::PaymentSuccessful => "Payment Successful",
            Self::Shipped => "Shipped",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> { Self::ALL.into_iter().find(|st| st.as_str() == s) }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (PaymentPending, PaymentSuccessful) | (PaymentPending, Cancelled)
                | (PaymentSuccessful, Shipped) | (PaymentSuccessful, Cancelled)
                | (Shipped, Delivered)
        )
    }

    pub fn is_terminal(&self) -> bool { matches!(self, Self::Delivered | Self::Cancelled) }

    /// Whether the order has been paid for and not reversed; used for sales figures.
    pub fn counts_as_sale(&self) -> bool { matches!(self, Self::PaymentSuccessful | Self::Shipped | Self::Delivered) }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderKind { #[default] Domestic, Exchange, International }

impl OrderKind {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Domestic => "domestic", Self::Exchange => "exchange", Self::International => "international" }
    }
    pub fn parse(s: &str) -> Option<Self> {
        match s { "domestic" => Some(Self::Domestic), "exchange" => Some(Self::Exchange), "international" => Some(Self::International), _ => None }
    }
    fn id_prefix(&self) -> &'static str {
        match self { Self::Domestic => "ORD", Self::Exchange => "EXC", Self::International => "INT" }
    }
}

/// Flat storage shape of one order line.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrderRow {
    pub order_id: String, pub display_order_id: String, pub user_id: String, pub kind: String, pub status: String,
    pub product_id: Uuid, pub product_name: String, pub size: String, pub quantity: i32, pub unit_price: Decimal,
    pub subtotal: Decimal, pub discount: Decimal, pub points_redeemed: i32, pub points_earned: i32,
    pub shipping_charge: Decimal, pub total: Decimal, pub promo_code: Option<String>,
    pub customer_name: String, pub customer_email: String, pub customer_phone: String,
    pub address_line1: String, pub address_line2: Option<String>, pub city: String, pub state: String,
    pub pincode: String, pub country: String,
    pub razorpay_order_id: Option<String>, pub razorpay_payment_id: Option<String>,
    pub shiprocket_order_id: Option<String>, pub shipment_id: Option<String>, pub awb_code: Option<String>,
    pub exchange_of: Option<String>,
    pub created_at: DateTime<Utc>, pub updated_at: DateTime<Utc>,
}

impl OrderRow {
    pub fn is_canonical(&self) -> bool { self.order_id == self.display_order_id }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OrderLine { pub order_id: String, pub product_id: Uuid, pub product_name: String, pub size: String, pub quantity: u32, pub unit_price: Decimal }

impl OrderLine {
    pub fn line_total(&self) -> Decimal { self.unit_price * Decimal::from(self.quantity) }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub name: String, pub email: String, pub phone: String, pub line1: String, pub line2: Option<String>,
    pub city: String, pub state: String, pub pincode: String, pub country: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct OrderTotals { pub subtotal: Decimal, pub discount: Decimal, pub points_redeemed: u32, pub points_earned: u32, pub shipping: Decimal, pub total: Decimal }

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Shipment { pub shiprocket_order_id: Option<String>, pub shipment_id: Option<String>, pub awb_code: Option<String> }

/// Side effect a status change requires, applied in the same transaction as the status write.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum Effect {
    TakeStock { product_id: Uuid, size: String, quantity: u32 },
    ReturnStock { product_id: Uuid, size: String, quantity: u32 },
    ConsumePromo { code: String },
    ReleasePromo { code: String },
    DebitPoints { user_id: String, points: u32 },
    RefundPoints { user_id: String, points: u32 },
    CreditPoints { user_id: String, points: u32 },
    RevokePoints { user_id: String, points: u32 },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Transition { pub from: OrderStatus, pub to: OrderStatus, pub effects: Vec<Effect> }

impl Transition {
    pub fn events(&self, display_order_id: &str, payment_id: Option<&str>) -> Vec<OrderEvent> {
        let id = display_order_id.to_string();
        let mut events = vec![OrderEvent::StatusChanged { display_order_id: id.clone(), from: self.from, to: self.to }];
        match self.to {
            OrderStatus::PaymentSuccessful => events.push(OrderEvent::Paid { display_order_id: id, payment_id: payment_id.map(String::from) }),
            OrderStatus::Cancelled => events.push(OrderEvent::Cancelled { display_order_id: id }),
            _ => {}
        }
        events
    }
}

#[derive(Clone, Debug)]
pub struct Order {
    display_order_id: String,
    user_id: String,
    kind: OrderKind,
    status: OrderStatus,
    lines: Vec<OrderLine>,
    totals: OrderTotals,
    promo_code: Option<String>,
    address: ShippingAddress,
    razorpay_order_id: Option<String>,
    razorpay_payment_id: Option<String>,
    shipment: Shipment,
    exchange_of: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// A line requested for an exchange: which line of the delivered order, and the replacement size.
#[derive(Clone, Debug, Deserialize)]
pub struct ExchangeLine { pub order_id: String, pub new_size: String, pub quantity: u32 }

pub fn generate_display_order_id(kind: OrderKind, now: DateTime<Utc>) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..10_000);
    format!("{}{}{:04}", kind.id_prefix(), now.format("%y%m%d%H%M%S"), suffix)
}

fn line_order_id(display_order_id: &str, index: usize) -> String {
    if index == 0 { display_order_id.to_string() } else { format!("{display_order_id}-{}", index + 1) }
}

/// Position encoded in a line id: `ORD..` is line 1, `ORD..-2` line 2 and so on.
fn line_number(order_id: &str) -> u32 {
    order_id.rsplit_once('-').and_then(|(_, n)| n.parse().ok()).unwrap_or(1)
}

impl Order {
    /// Creates a new order awaiting payment from a checkout quote.
    pub fn place(
        display_order_id: String, user_id: impl Into<String>, kind: OrderKind, lines: Vec<OrderLine>,
        quote: &Quote, promo_code: Option<String>, address: ShippingAddress,
    ) -> Result<Self, OrderError> {
        if lines.is_empty() { return Err(OrderError::NoItems); }
        if lines.iter().any(|l| l.quantity == 0) { return Err(OrderError::InvalidQuantity); }
        let now = Utc::now();
        let lines = lines.into_iter().enumerate()
            .map(|(i, l)| OrderLine { order_id: line_order_id(&display_order_id, i), ..l })
            .collect();
        Ok(Self {
            display_order_id, user_id: user_id.into(), kind, status: OrderStatus::PaymentPending, lines,
            totals: OrderTotals {
                subtotal: quote.subtotal, discount: quote.discount, points_redeemed: quote.points_redeemed,
                points_earned: quote.points_earned, shipping: quote.shipping, total: quote.total,
            },
            promo_code: promo_code.filter(|_| !quote.discount.is_zero()),
            address, razorpay_order_id: None, razorpay_payment_id: None, shipment: Shipment::default(),
            exchange_of: None, created_at: now, updated_at: now,
        })
    }

    /// Creates an exchange for a delivered order. Exchanges need no payment, so they start
    /// in `Payment Successful` and the replacement stock is taken immediately.
    pub fn exchange_from(original: &Order, display_order_id: String, requested: &[ExchangeLine]) -> Result<(Self, Vec<Effect>), OrderError> {
        if original.status != OrderStatus::Delivered { return Err(OrderError::NotExchangeable(original.status)); }
        if requested.is_empty() { return Err(OrderError::NoItems); }
        let mut lines = Vec::with_capacity(requested.len());
        for (i, req) in requested.iter().enumerate() {
            let line = original.lines.iter().find(|l| l.order_id == req.order_id)
                .ok_or_else(|| OrderError::UnknownLine(req.order_id.clone()))?;
            if req.quantity == 0 || req.quantity > line.quantity { return Err(OrderError::InvalidQuantity); }
            lines.push(OrderLine {
                order_id: line_order_id(&display_order_id, i), product_id: line.product_id,
                product_name: line.product_name.clone(), size: req.new_size.clone(),
                quantity: req.quantity, unit_price: line.unit_price,
            });
        }
        let effects = lines.iter()
            .map(|l| Effect::TakeStock { product_id: l.product_id, size: l.size.clone(), quantity: l.quantity })
            .collect();
        let now = Utc::now();
        let order = Self {
            display_order_id, user_id: original.user_id.clone(), kind: OrderKind::Exchange,
            status: OrderStatus::PaymentSuccessful, lines, totals: OrderTotals::default(), promo_code: None,
            address: original.address.clone(), razorpay_order_id: None, razorpay_payment_id: None,
            shipment: Shipment::default(), exchange_of: Some(original.display_order_id.clone()),
            created_at: now, updated_at: now,
        };
        Ok((order, effects))
    }

    pub fn from_rows(rows: Vec<OrderRow>) -> Result<Self, OrderError> {
        let display_order_id = rows.first().map(|r| r.display_order_id.clone()).ok_or(OrderError::NoItems)?;
        if rows.iter().any(|r| r.display_order_id != display_order_id) { return Err(OrderError::MixedRows); }
        let canonical = match rows.iter().filter(|r| r.is_canonical()).collect::<Vec<_>>().as_slice() {
            [one] => (*one).clone(),
            [] => return Err(OrderError::MissingCanonicalRow(display_order_id)),
            _ => return Err(OrderError::DuplicateCanonicalRow(display_order_id)),
        };
        let status = OrderStatus::parse(&canonical.status).ok_or_else(|| OrderError::UnknownStatus(canonical.status.clone()))?;
        let kind = OrderKind::parse(&canonical.kind).ok_or_else(|| OrderError::UnknownKind(canonical.kind.clone()))?;

        let mut rows = rows;
        // Canonical line first, then the rest by line number, so `X-10` follows `X-9`.
        rows.sort_by_key(|r| (!r.is_canonical(), line_number(&r.order_id), r.order_id.clone()));
        let lines = rows.into_iter()
            .map(|r| {
                let quantity = u32::try_from(r.quantity).ok().filter(|&q| q > 0).ok_or(OrderError::InvalidQuantity)?;
                Ok(OrderLine { order_id: r.order_id, product_id: r.product_id, product_name: r.product_name, size: r.size, quantity, unit_price: r.unit_price })
            })
            .collect::<Result<Vec<_>, OrderError>>()?;

        Ok(Self {
            display_order_id, user_id: canonical.user_id, kind, status, lines,
            totals: OrderTotals {
                subtotal: canonical.subtotal, discount: canonical.discount,
                points_redeemed: u32::try_from(canonical.points_redeemed).unwrap_or(0),
                points_earned: u32::try_from(canonical.points_earned).unwrap_or(0),
                shipping: canonical.shipping_charge, total: canonical.total,
            },
            promo_code: canonical.promo_code,
            address: ShippingAddress {
                name: canonical.customer_name, email: canonical.customer_email, phone: canonical.customer_phone,
                line1: canonical.address_line1, line2: canonical.address_line2, city: canonical.city,
                state: canonical.state, pincode: canonical.pincode, country: canonical.country,
            },
            razorpay_order_id: canonical.razorpay_order_id, razorpay_payment_id: canonical.razorpay_payment_id,
            shipment: Shipment { shiprocket_order_id: canonical.shiprocket_order_id, shipment_id: canonical.shipment_id, awb_code: canonical.awb_code },
            exchange_of: canonical.exchange_of, created_at: canonical.created_at, updated_at: canonical.updated_at,
        })
    }

    /// Flattens the order back into one row per line. Order-level fields are written to every row.
    pub fn to_rows(&self) -> Vec<OrderRow> {
        self.lines.iter().map(|l| OrderRow {
            order_id: l.order_id.clone(), display_order_id: self.display_order_id.clone(), user_id: self.user_id.clone(),
            kind: self.kind.as_str().to_string(), status: self.status.as_str().to_string(),
            product_id: l.product_id, product_name: l.product_name.clone(), size: l.size.clone(),
            quantity: i32::try_from(l.quantity).unwrap_or(i32::MAX), unit_price: l.unit_price,
            subtotal: self.totals.subtotal, discount: self.totals.discount,
            points_redeemed: i32::try_from(self.totals.points_redeemed).unwrap_or(i32::MAX),
            points_earned: i32::try_from(self.totals.points_earned).unwrap_or(i32::MAX),
            shipping_charge: self.totals.shipping, total: self.totals.total, promo_code: self.promo_code.clone(),
            customer_name: self.address.name.clone(), customer_email: self.address.email.clone(),
            customer_phone: self.address.phone.clone(), address_line1: self.address.line1.clone(),
            address_line2: self.address.line2.clone(), city: self.address.city.clone(), state: self.address.state.clone(),
            pincode: self.address.pincode.clone(), country: self.address.country.clone(),
            razorpay_order_id: self.razorpay_order_id.clone(), razorpay_payment_id: self.razorpay_payment_id.clone(),
            shiprocket_order_id: self.shipment.shiprocket_order_id.clone(), shipment_id: self.shipment.shipment_id.clone(),
            awb_code: self.shipment.awb_code.clone(), exchange_of: self.exchange_of.clone(),
            created_at: self.created_at, updated_at: self.updated_at,
        }).collect()
    }

    pub fn display_order_id(&self) -> &str { &self.display_order_id }
    pub fn user_id(&self) -> &str { &self.user_id }
    pub fn kind(&self) -> OrderKind { self.kind }
    pub fn status(&self) -> OrderStatus { self.status }
    pub fn lines(&self) -> &[OrderLine] { &self.lines }
    pub fn totals(&self) -> &OrderTotals { &self.totals }
    pub fn promo_code(&self) -> Option<&str> { self.promo_code.as_deref() }
    pub fn address(&self) -> &ShippingAddress { &self.address }
    pub fn razorpay_order_id(&self) -> Option<&str> { self.razorpay_order_id.as_deref() }
    pub fn razorpay_payment_id(&self) -> Option<&str> { self.razorpay_payment_id.as_deref() }
    pub fn shipment(&self) -> &Shipment { &self.shipment }
    pub fn exchange_of(&self) -> Option<&str> { self.exchange_of.as_deref() }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn item_count(&self) -> u32 { self.lines.iter().map(|l| l.quantity).sum() }

    pub fn attach_payment_order(&mut self, razorpay_order_id: impl Into<String>) {
        self.razorpay_order_id = Some(razorpay_order_id.into());
        self.touch();
    }

    pub fn record_payment(&mut self, razorpay_payment_id: impl Into<String>) {
        self.razorpay_payment_id = Some(razorpay_payment_id.into());
        self.touch();
    }

    pub fn record_shipment(&mut self, shipment: Shipment) -> Result<(), OrderError> {
        if !matches!(self.status, OrderStatus::PaymentSuccessful | OrderStatus::Shipped) {
            return Err(OrderError::NotShippable(self.status));
        }
        self.shipment = shipment;
        self.touch();
        Ok(())
    }

    /// Effects applied in the same transaction that inserts a new order. Redeemed points
    /// are held from placement so two pending orders cannot spend the same balance.
    pub fn placement_effects(&self) -> Vec<Effect> {
        self.points_debit().into_iter().collect()
    }

    /// Moves the order to `to` and returns the effects that must be applied with it.
    pub fn transition(&mut self, to: OrderStatus) -> Result<Transition, OrderError> {
        let from = self.status;
        if from == to { return Err(OrderError::AlreadyInStatus(to)); }
        if !from.can_transition_to(to) { return Err(OrderError::IllegalTransition { from, to }); }
        let effects = match (from, to) {
            (OrderStatus::PaymentPending, OrderStatus::PaymentSuccessful) => self.payment_effects(),
            (OrderStatus::PaymentPending, OrderStatus::Cancelled) => self.points_debit().map(Effect::inverse).into_iter().collect(),
            (OrderStatus::PaymentSuccessful, OrderStatus::Cancelled) => self.payment_effects().into_iter()
                .chain(self.points_debit())
                .map(Effect::inverse)
                .collect(),
            _ => vec![],
        };
        self.status = to;
        self.touch();
        Ok(Transition { from, to, effects })
    }

    fn points_debit(&self) -> Option<Effect> {
        (self.totals.points_redeemed > 0)
            .then(|| Effect::DebitPoints { user_id: self.user_id.clone(), points: self.totals.points_redeemed })
    }

    fn payment_effects(&self) -> Vec<Effect> {
        let mut effects: Vec<Effect> = self.lines.iter()
            .map(|l| Effect::TakeStock { product_id: l.product_id, size: l.size.clone(), quantity: l.quantity })
            .collect();
        if let Some(code) = &self.promo_code { effects.push(Effect::ConsumePromo { code: code.clone() }); }
        if self.totals.points_earned > 0 {
            effects.push(Effect::CreditPoints { user_id: self.user_id.clone(), points: self.totals.points_earned });
        }
        effects
    }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

impl Effect {
    pub fn inverse(self) -> Effect {
        match self {
            Self::TakeStock { product_id, size, quantity } => Self::ReturnStock { product_id, size, quantity },
            Self::ReturnStock { product_id, size, quantity } => Self::TakeStock { product_id, size, quantity },
            Self::ConsumePromo { code } => Self::ReleasePromo { code },
            Self::ReleasePromo { code } => Self::ConsumePromo { code },
            Self::DebitPoints { user_id, points } => Self::RefundPoints { user_id, points },
            Self::RefundPoints { user_id, points } => Self::DebitPoints { user_id, points },
            Self::CreditPoints { user_id, points } => Self::RevokePoints { user_id, points },
            Self::RevokePoints { user_id, points } => Self::CreditPoints { user_id, points },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderError {
    #[error("Order has no items")]
    NoItems,
    #[error("Quantity must be positive and within the original order")]
    InvalidQuantity,
    #[error("Order is already {0}")]
    AlreadyInStatus(OrderStatus),
    #[error("Cannot move order from {from} to {to}")]
    IllegalTransition { from: OrderStatus, to: OrderStatus },
    #[error("Only delivered orders can be exchanged (order is {0})")]
    NotExchangeable(OrderStatus),
    #[error("Cannot ship an order that is {0}")]
    NotShippable(OrderStatus),
    #[error("Order line {0} not found")]
    UnknownLine(String),
    #[error("Order rows belong to different orders")]
    MixedRows,
    #[error("Order {0} has no canonical row")]
    MissingCanonicalRow(String),
    #[error("Only {available} points available, {requested} requested")]
    InsufficientPoints { available: u32, requested: u32 },
    #[error("Order {0} has more than one canonical row")]
    DuplicateCanonicalRow(String),
    #[error("Unknown order status {0:?}")]
    UnknownStatus(String),
    #[error("Unknown order kind {0:?}")]
    UnknownKind(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(points_redeemed: u32, points_earned: u32, discount: i64) -> Quote {
        Quote {
            subtotal: Decimal::new(2000, 0), discount: Decimal::new(discount, 0), points_redeemed,
            shipping: Decimal::ZERO, total: Decimal::new(2000 - discount - i64::from(points_redeemed), 0), points_earned,
        }
    }

    fn line(size: &str, qty: u32) -> OrderLine {
        OrderLine { order_id: String::new(), product_id: Uuid::nil(), product_name: "Tee".into(), size: size.into(), quantity: qty, unit_price: Decimal::new(1000, 0) }
    }

    fn placed(promo: Option<&str>, q: &Quote) -> Order {
        Order::place("ORD1".into(), "user-1", OrderKind::Domestic, vec![line("M", 1), line("L", 1)], q, promo.map(String::from), ShippingAddress::default()).unwrap()
    }

    #[test]
    fn test_order_workflow() {
        let mut order = placed(None, &quote(0, 0, 0));
        assert_eq!(order.status(), OrderStatus::PaymentPending);
        order.transition(OrderStatus::PaymentSuccessful).unwrap();
        order.transition(OrderStatus::Shipped).unwrap();
        order.transition(OrderStatus::Delivered).unwrap();
        assert_eq!(order.status(), OrderStatus::Delivered);
        assert!(order.status().is_terminal());
    }

    #[test]
    fn test_line_ids_share_display_id() {
        let order = placed(None, &quote(0, 0, 0));
        let ids: Vec<_> = order.lines().iter().map(|l| l.order_id.as_str()).collect();
        assert_eq!(ids, vec!["ORD1", "ORD1-2"]);
        let rows = order.to_rows();
        assert_eq!(rows.iter().filter(|r| r.is_canonical()).count(), 1);
    }

    #[test]
    fn test_payment_effects() {
        let mut order = placed(Some("SAVE10"), &quote(50, 97, 200));
        let t = order.transition(OrderStatus::PaymentSuccessful).unwrap();
        assert_eq!(t.effects, vec![
            Effect::TakeStock { product_id: Uuid::nil(), size: "M".into(), quantity: 1 },
            Effect::TakeStock { product_id: Uuid::nil(), size: "L".into(), quantity: 1 },
            Effect::ConsumePromo { code: "SAVE10".into() },
            Effect::CreditPoints { user_id: "user-1".into(), points: 97 },
        ]);
    }

    #[test]
    fn test_points_held_at_placement() {
        let order = placed(None, &quote(50, 0, 0));
        assert_eq!(order.placement_effects(), vec![Effect::DebitPoints { user_id: "user-1".into(), points: 50 }]);
        assert!(placed(None, &quote(0, 0, 0)).placement_effects().is_empty());
    }

    #[test]
    fn test_cancel_after_payment_reverts_everything() {
        let mut order = placed(Some("SAVE10"), &quote(50, 97, 200));
        let mut applied = order.placement_effects();
        applied.extend(order.transition(OrderStatus::PaymentSuccessful).unwrap().effects);
        let cancelled = order.transition(OrderStatus::Cancelled).unwrap();
        assert_eq!(cancelled.effects.len(), applied.len());
        assert!(cancelled.effects.contains(&Effect::RefundPoints { user_id: "user-1".into(), points: 50 }));
        let mut reverted: Vec<Effect> = cancelled.effects.into_iter().map(Effect::inverse).collect();
        reverted.sort_by_key(|e| format!("{e:?}"));
        applied.sort_by_key(|e| format!("{e:?}"));
        assert_eq!(reverted, applied);
        assert!(matches!(
            order.transition(OrderStatus::PaymentSuccessful),
            Err(OrderError::IllegalTransition { from: OrderStatus::Cancelled, .. })
        ));
    }

    #[test]
    fn test_cancel_before_payment_only_refunds_points() {
        let mut order = placed(Some("SAVE10"), &quote(50, 97, 200));
        let t = order.transition(OrderStatus::Cancelled).unwrap();
        assert_eq!(t.effects, vec![Effect::RefundPoints { user_id: "user-1".into(), points: 50 }]);

        let mut order = placed(None, &quote(0, 0, 0));
        assert!(order.transition(OrderStatus::Cancelled).unwrap().effects.is_empty());
    }

    #[test]
    fn test_lines_ordered_by_number() {
        let lines: Vec<OrderLine> = (0..11).map(|i| line(&format!("S{i}"), 1)).collect();
        let order = Order::place("ORD1".into(), "user-1", OrderKind::Domestic, lines, &quote(0, 0, 0), None, ShippingAddress::default()).unwrap();
        let mut rows = order.to_rows();
        rows.reverse();
        let rebuilt = Order::from_rows(rows).unwrap();
        let ids: Vec<&str> = rebuilt.lines().iter().map(|l| l.order_id.as_str()).collect();
        assert_eq!(ids[0], "ORD1");
        assert_eq!(ids[8..], ["ORD1-9", "ORD1-10", "ORD1-11"]);
        assert_eq!(rebuilt.lines(), order.lines());
    }

    #[test]
    fn test_illegal_transitions() {
        let mut order = placed(None, &quote(0, 0, 0));
        assert_eq!(
            order.transition(OrderStatus::Shipped),
            Err(OrderError::IllegalTransition { from: OrderStatus::PaymentPending, to: OrderStatus::Shipped })
        );
        assert_eq!(order.transition(OrderStatus::PaymentPending), Err(OrderError::AlreadyInStatus(OrderStatus::PaymentPending)));
        order.transition(OrderStatus::PaymentSuccessful).unwrap();
        order.transition(OrderStatus::Shipped).unwrap();
        assert!(order.transition(OrderStatus::Cancelled).is_err());
    }

    #[test]
    fn test_promo_dropped_when_no_discount() {
        let order = placed(Some("SAVE10"), &quote(0, 0, 0));
        assert_eq!(order.promo_code(), None);
    }

    #[test]
    fn test_from_rows_round_trip_and_errors() {
        let order = placed(Some("SAVE10"), &quote(0, 0, 100));
        let rows = order.to_rows();
        let rebuilt = Order::from_rows(rows.clone()).unwrap();
        assert_eq!(rebuilt.lines(), order.lines());
        assert_eq!(rebuilt.totals(), order.totals());

        let without_canonical: Vec<_> = rows.iter().filter(|r| !r.is_canonical()).cloned().collect();
        assert_eq!(Order::from_rows(without_canonical).unwrap_err(), OrderError::MissingCanonicalRow("ORD1".into()));

        let mut bad_status = rows.clone();
        bad_status[0].status = "Lost".into();
        assert_eq!(Order::from_rows(bad_status).unwrap_err(), OrderError::UnknownStatus("Lost".into()));

        let mut mixed = rows;
        mixed[1].display_order_id = "ORD2".into();
        assert_eq!(Order::from_rows(mixed).unwrap_err(), OrderError::MixedRows);
        assert_eq!(Order::from_rows(vec![]).unwrap_err(), OrderError::NoItems);
    }

    #[test]
    fn test_exchange() {
        let mut original = placed(None, &quote(0, 0, 0));
        let req = vec![ExchangeLine { order_id: "ORD1-2".into(), new_size: "XL".into(), quantity: 1 }];
        assert_eq!(Order::exchange_from(&original, "EXC1".into(), &req).unwrap_err(), OrderError::NotExchangeable(OrderStatus::PaymentPending));

        for s in [OrderStatus::PaymentSuccessful, OrderStatus::Shipped, OrderStatus::Delivered] { original.transition(s).unwrap(); }
        let (mut exchange, effects) = Order::exchange_from(&original, "EXC1".into(), &req).unwrap();
        assert_eq!(exchange.kind(), OrderKind::Exchange);
        assert_eq!(exchange.status(), OrderStatus::PaymentSuccessful);
        assert_eq!(exchange.exchange_of(), Some("ORD1"));
        assert_eq!(exchange.totals().total, Decimal::ZERO);
        assert_eq!(effects, vec![Effect::TakeStock { product_id: Uuid::nil(), size: "XL".into(), quantity: 1 }]);

        let cancel = exchange.transition(OrderStatus::Cancelled).unwrap();
        assert_eq!(cancel.effects, vec![Effect::ReturnStock { product_id: Uuid::nil(), size: "XL".into(), quantity: 1 }]);

        let too_many = vec![ExchangeLine { order_id: "ORD1".into(), new_size: "S".into(), quantity: 2 }];
        assert_eq!(Order::exchange_from(&original, "EXC2".into(), &too_many).unwrap_err(), OrderError::InvalidQuantity);
        let unknown = vec![ExchangeLine { order_id: "ORD9".into(), new_size: "S".into(), quantity: 1 }];
        assert_eq!(Order::exchange_from(&original, "EXC3".into(), &unknown).unwrap_err(), OrderError::UnknownLine("ORD9".into()));
    }

    #[test]
    fn test_status_strings() {
        for s in OrderStatus::ALL { assert_eq!(OrderStatus::parse(s.as_str()), Some(s)); }
        assert_eq!(serde_json::to_string(&OrderStatus::PaymentPending).unwrap(), "\"Payment Pending\"");
    }

    #[test]
    fn test_generated_ids() {
        let id = generate_display_order_id(OrderKind::International, Utc::now());
        assert!(id.starts_with("INT"));
        assert_eq!(id.len(), 3 + 12 + 4);
    }
}
