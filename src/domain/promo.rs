//! Promo codes

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Discount {
    /// Percentage of the subtotal, 0-100.
    Percent(Decimal),
    Flat(Decimal),
}

impl Discount {
    pub fn kind(&self) -> &'static str {
        match self { Self::Percent(_) => "percent", Self::Flat(_) => "flat" }
    }
    pub fn value(&self) -> Decimal {
        match self { Self::Percent(v) | Self::Flat(v) => *v }
    }
    pub fn from_parts(kind: &str, value: Decimal) -> Option<Self> {
        match kind { "percent" => Some(Self::Percent(value)), "flat" => Some(Self::Flat(value)), _ => None }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PromoCode {
    pub code: String,
    pub discount: Discount,
    pub min_order_value: Decimal,
    pub max_discount: Option<Decimal>,
    pub usage_limit: Option<u32>,
    pub times_used: u32,
    pub active: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PromoError {
    #[error("Promo code not found")]
    NotFound,
    #[error("Promo code is not active")]
    Inactive,
    #[error("Promo code has expired")]
    Expired,
    #[error("Promo code has reached its usage limit")]
    UsageExhausted,
    #[error("Order must be at least {0} to use this code")]
    BelowMinimum(Decimal),
    #[error("Invalid discount: {0}")]
    InvalidDiscount(String),
}

/// Codes are matched case-insensitively and stored upper-case.
pub fn normalize_code(code: &str) -> String { code.trim().to_uppercase() }

impl PromoCode {
    pub fn new(code: &str, discount: Discount) -> Result<Self, PromoError> {
        let promo = Self {
            code: normalize_code(code), discount, min_order_value: Decimal::ZERO, max_discount: None,
            usage_limit: None, times_used: 0, active: true, expires_at: None,
        };
        promo.check()?;
        Ok(promo)
    }

    /// Structural checks for codes created or edited by an admin.
    pub fn check(&self) -> Result<(), PromoError> {
        if self.code.is_empty() { return Err(PromoError::InvalidDiscount("code is empty".into())); }
        match self.discount {
            Discount::Percent(p) if p <= Decimal::ZERO || p > Decimal::ONE_HUNDRED => {
                Err(PromoError::InvalidDiscount(format!("percent must be in (0, 100], got {p}")))
            }
            Discount::Flat(v) if v <= Decimal::ZERO => Err(PromoError::InvalidDiscount(format!("flat amount must be positive, got {v}"))),
            _ => Ok(()),
        }
    }

    pub fn is_usable(&self, now: DateTime<Utc>) -> Result<(), PromoError> {
        if !self.active { return Err(PromoError::Inactive); }
        if self.expires_at.is_some_and(|at| at <= now) { return Err(PromoError::Expired); }
        if self.usage_limit.is_some_and(|limit| self.times_used >= limit) { return Err(PromoError::UsageExhausted); }
        Ok(())
    }

    /// Discount this code grants on `subtotal`. Never more than the subtotal.
    pub fn discount_for(&self, subtotal: Decimal, now: DateTime<Utc>) -> Result<Decimal, PromoError> {
        self.is_usable(now)?;
        if subtotal < self.min_order_value { return Err(PromoError::BelowMinimum(self.min_order_value)); }
        let raw = match self.discount {
            Discount::Percent(p) => (subtotal * p / Decimal::ONE_HUNDRED).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
            Discount::Flat(v) => v,
        };
        let capped = self.max_discount.map_or(raw, |max| raw.min(max));
        Ok(capped.min(subtotal).max(Decimal::ZERO))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn dec(n: i64) -> Decimal { Decimal::new(n, 0) }

    #[test]
    fn test_percent_with_cap() {
        let mut promo = PromoCode::new(" save20 ", Discount::Percent(dec(20))).unwrap();
        assert_eq!(promo.code, "SAVE20");
        assert_eq!(promo.discount_for(dec(1000), Utc::now()), Ok(dec(200)));
        promo.max_discount = Some(dec(150));
        assert_eq!(promo.discount_for(dec(1000), Utc::now()), Ok(dec(150)));
    }

    #[test]
    fn test_flat_never_exceeds_subtotal() {
        let promo = PromoCode::new("FLAT500", Discount::Flat(dec(500))).unwrap();
        assert_eq!(promo.discount_for(dec(300), Utc::now()), Ok(dec(300)));
    }

    #[test]
    fn test_rejections() {
        let now = Utc::now();
        let mut promo = PromoCode::new("X", Discount::Flat(dec(100))).unwrap();
        promo.min_order_value = dec(999);
        assert_eq!(promo.discount_for(dec(500), now), Err(PromoError::BelowMinimum(dec(999))));

        promo.usage_limit = Some(3);
        promo.times_used = 3;
        assert_eq!(promo.discount_for(dec(1000), now), Err(PromoError::UsageExhausted));

        promo.expires_at = Some(now - Duration::hours(1));
        assert_eq!(promo.discount_for(dec(1000), now), Err(PromoError::Expired));

        promo.active = false;
        assert_eq!(promo.discount_for(dec(1000), now), Err(PromoError::Inactive));
    }

    #[test]
    fn test_invalid_discounts() {
        assert!(PromoCode::new("A", Discount::Percent(dec(0))).is_err());
        assert!(PromoCode::new("A", Discount::Percent(dec(101))).is_err());
        assert!(PromoCode::new("A", Discount::Flat(dec(-5))).is_err());
        assert!(PromoCode::new("  ", Discount::Flat(dec(5))).is_err());
    }
}
