//! Checkout pricing: subtotal, promo, points, shipping and points earned.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::domain::aggregates::{OrderKind, OrderLine};
use crate::domain::promo::{PromoCode, PromoError};

#[derive(Clone, Debug, PartialEq)]
pub struct PricingRules {
    pub flat_shipping: Decimal,
    pub free_shipping_threshold: Decimal,
    pub international_shipping: Decimal,
    /// Points credited per 100 rupees of merchandise paid for.
    pub points_earn_percent: u32,
}

impl Default for PricingRules {
    fn default() -> Self {
        Self {
            flat_shipping: Decimal::new(99, 0),
            free_shipping_threshold: Decimal::new(1499, 0),
            international_shipping: Decimal::new(2500, 0),
            points_earn_percent: 5,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Quote {
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub points_redeemed: u32,
    pub shipping: Decimal,
    pub total: Decimal,
    pub points_earned: u32,
}

/// Prices a checkout. One point is worth one rupee.
pub fn quote(
    lines: &[OrderLine], promo: Option<&PromoCode>, points_requested: u32, points_available: u32,
    kind: OrderKind, rules: &PricingRules, now: DateTime<Utc>,
) -> Result<Quote, PromoError> {
    if kind == OrderKind::Exchange { return Ok(Quote::default()); }

    let subtotal: Decimal = lines.iter().map(OrderLine::line_total).sum();
    let discount = match promo {
        Some(p) => p.discount_for(subtotal, now)?,
        None => Decimal::ZERO,
    };
    let after_discount = subtotal - discount;

    let redeemable = after_discount.floor().to_u32().unwrap_or(u32::MAX);
    let points_redeemed = points_requested.min(points_available).min(redeemable);
    let merchandise = after_discount - Decimal::from(points_redeemed);

    let shipping = match kind {
        OrderKind::International => rules.international_shipping,
        // Judged after the promo discount and before points.
        _ if subtotal.is_zero() || after_discount >= rules.free_shipping_threshold => Decimal::ZERO,
        _ => rules.flat_shipping,
    };

    let points_earned = (merchandise * Decimal::from(rules.points_earn_percent) / Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::ToZero)
        .to_u32()
        .unwrap_or(0);

    Ok(Quote { subtotal, discount, points_redeemed, shipping, total: merchandise + shipping, points_earned })
}
