//! Admin dashboard figures aggregated from order rows.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::aggregates::{OrderRow, OrderStatus};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySales { pub date: NaiveDate, pub revenue: Decimal, pub orders: u32, pub units: u32 }

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductSales { pub product_id: Uuid, pub name: String, pub units: u32, pub revenue: Decimal }

fn is_sale(row: &OrderRow) -> bool {
    OrderStatus::parse(&row.status).is_some_and(|s| s.counts_as_sale())
}

fn units(row: &OrderRow) -> u32 { u32::try_from(row.quantity).unwrap_or(0) }

/// Revenue per calendar day (UTC). Revenue is the amount paid, taken from canonical rows.
pub fn sales_by_day(rows: &[OrderRow]) -> Vec<DailySales> {
    let mut days: BTreeMap<NaiveDate, DailySales> = BTreeMap::new();
    for row in rows.iter().filter(|r| is_sale(r)) {
        let date = row.created_at.date_naive();
        let day = days.entry(date).or_insert_with(|| DailySales { date, revenue: Decimal::ZERO, orders: 0, units: 0 });
        day.units += units(row);
        if row.is_canonical() {
            day.orders += 1;
            day.revenue += row.total;
        }
    }
    days.into_values().collect()
}

/// Best sellers by units, ties broken by revenue then name.
pub fn top_products(rows: &[OrderRow], n: usize) -> Vec<ProductSales> {
    let mut by_product: HashMap<Uuid, ProductSales> = HashMap::new();
    for row in rows.iter().filter(|r| is_sale(r)) {
        let entry = by_product.entry(row.product_id).or_insert_with(|| ProductSales {
            product_id: row.product_id, name: row.product_name.clone(), units: 0, revenue: Decimal::ZERO,
        });
        entry.units += units(row);
        entry.revenue += row.unit_price * Decimal::from(units(row));
    }
    let mut ranked: Vec<ProductSales> = by_product.into_values().collect();
    ranked.sort_by(|a, b| b.units.cmp(&a.units).then_with(|| b.revenue.cmp(&a.revenue)).then_with(|| a.name.cmp(&b.name)));
    ranked.truncate(n);
    ranked
}

/// Number of orders in each status, counting canonical rows only.
pub fn status_breakdown(rows: &[OrderRow]) -> BTreeMap<&'static str, u32> {
    let mut counts: BTreeMap<&'static str, u32> = OrderStatus::ALL.iter().map(|s| (s.as_str(), 0)).collect();
    for row in rows.iter().filter(|r| r.is_canonical()) {
        if let Some(status) = OrderStatus::parse(&row.status) {
            *counts.entry(status.as_str()).or_default() += 1;
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn row(order_id: &str, display: &str, status: OrderStatus, product: u128, qty: i32, price: i64, total: i64, at: &str) -> OrderRow {
        OrderRow {
            order_id: order_id.into(), display_order_id: display.into(), user_id: "u".into(), kind: "domestic".into(),
            status: status.as_str().into(), product_id: Uuid::from_u128(product), product_name: format!("P{product}"),
            size: "M".into(), quantity: qty, unit_price: Decimal::new(price, 0), subtotal: Decimal::ZERO,
            discount: Decimal::ZERO, points_redeemed: 0, points_earned: 0, shipping_charge: Decimal::ZERO,
            total: Decimal::new(total, 0), promo_code: None, customer_name: String::new(), customer_email: String::new(),
            customer_phone: String::new(), address_line1: String::new(), address_line2: None, city: String::new(),
            state: String::new(), pincode: String::new(), country: String::new(), razorpay_order_id: None,
            razorpay_payment_id: None, shiprocket_order_id: None, shipment_id: None, awb_code: None, exchange_of: None,
            created_at: DateTime::parse_from_rfc3339(at).unwrap().with_timezone(&Utc),
            updated_at: DateTime::parse_from_rfc3339(at).unwrap().with_timezone(&Utc),
        }
    }

    fn fixture() -> Vec<OrderRow> {
        vec![
            row("A", "A", OrderStatus::Delivered, 1, 2, 500, 1100, "2026-10-01T10:00:00Z"),
            row("A-2", "A", OrderStatus::Delivered, 2, 1, 100, 1100, "2026-10-01T10:00:00Z"),
            row("B", "B", OrderStatus::PaymentSuccessful, 2, 3, 100, 300, "2026-10-01T18:00:00Z"),
            row("C", "C", OrderStatus::Cancelled, 1, 5, 500, 2500, "2026-10-02T09:00:00Z"),
            row("D", "D", OrderStatus::PaymentPending, 1, 1, 500, 500, "2026-10-02T09:30:00Z"),
            row("E", "E", OrderStatus::Shipped, 3, 1, 900, 900, "2026-10-03T12:00:00Z"),
        ]
    }

    #[test]
    fn test_sales_by_day() {
        let days = sales_by_day(&fixture());
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].date, NaiveDate::from_ymd_opt(2026, 10, 1).unwrap());
        assert_eq!(days[0].revenue, Decimal::new(1400, 0));
        assert_eq!(days[0].orders, 2);
        assert_eq!(days[0].units, 6);
        assert_eq!(days[1].date, NaiveDate::from_ymd_opt(2026, 10, 3).unwrap());
        assert_eq!(days[1].revenue, Decimal::new(900, 0));
    }

    #[test]
    fn test_top_products() {
        let top = top_products(&fixture(), 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].product_id, Uuid::from_u128(2));
        assert_eq!(top[0].units, 4);
        assert_eq!(top[1].product_id, Uuid::from_u128(1));
        assert_eq!(top[1].revenue, Decimal::new(1000, 0));
    }

    #[test]
    fn test_status_breakdown() {
        let counts = status_breakdown(&fixture());
        assert_eq!(counts["Delivered"], 1);
        assert_eq!(counts["Cancelled"], 1);
        assert_eq!(counts["Payment Pending"], 1);
        assert_eq!(counts["Shipped"], 1);
        assert_eq!(counts["Payment Successful"], 1);
    }
}
