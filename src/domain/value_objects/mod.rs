//! Value Objects for the storefront

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

pub const DEFAULT_CURRENCY: &str = "INR";

const MAX_SKU_LENGTH: usize = 50;

/// Catalog SKU, stored upper-case. Letters, digits, `-` and `_` only.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Sku(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkuError {
    #[error("SKU is empty")]
    Empty,
    #[error("SKU is longer than 50 characters")]
    TooLong,
    #[error("SKU contains {0:?}")]
    InvalidChar(char),
}

impl Sku {
    pub fn new(value: impl Into<String>) -> Result<Self, SkuError> {
        let value = value.into().trim().to_uppercase();
        if value.is_empty() {
            return Err(SkuError::Empty);
        }
        if value.len() > MAX_SKU_LENGTH {
            return Err(SkuError::TooLong);
        }
        if let Some(c) = value.chars().find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_')) {
            return Err(SkuError::InvalidChar(c));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Sku {
    type Error = SkuError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Sku> for String {
    fn from(sku: Sku) -> Self {
        sku.0
    }
}

impl fmt::Display for Sku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An amount in a currency. Prices in this shop are rupees.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    amount: Decimal,
    currency: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    #[error("cannot combine amounts in different currencies")]
    CurrencyMismatch,
    #[error("amount is negative")]
    Negative,
    #[error("amount is out of range")]
    Overflow,
}

impl Money {
    pub fn new(amount: Decimal, currency: &str) -> Self {
        Self { amount, currency: currency.to_string() }
    }

    pub fn inr(amount: Decimal) -> Self {
        Self::new(amount, DEFAULT_CURRENCY)
    }

    pub fn zero(currency: &str) -> Self {
        Self::new(Decimal::ZERO, currency)
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn add(&self, other: &Money) -> Result<Money, MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch);
        }
        Ok(Money::new(self.amount + other.amount, &self.currency))
    }

    pub fn multiply(&self, qty: u32) -> Money {
        Money::new(self.amount * Decimal::from(qty), &self.currency)
    }

    /// Amount in the currency's minor unit (paise for INR), as payment gateways expect it.
    pub fn to_minor_units(&self) -> Result<i64, MoneyError> {
        if self.amount.is_sign_negative() {
            return Err(MoneyError::Negative);
        }
        (self.amount * Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .ok_or(MoneyError::Overflow)
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::inr(Decimal::ZERO)
    }
}

/// Indian postal code: six digits, never starting with zero.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pincode(String);

impl Pincode {
    pub fn parse(value: &str) -> Result<Self, PincodeError> {
        let value = value.trim();
        if value.len() != 6 || !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PincodeError(value.to_string()));
        }
        if value.starts_with('0') { return Err(PincodeError(value.to_string())); }
        Ok(Self(value.to_string()))
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl TryFrom<String> for Pincode {
    type Error = PincodeError;
    fn try_from(value: String) -> Result<Self, Self::Error> { Self::parse(&value) }
}

impl From<Pincode> for String {
    fn from(p: Pincode) -> Self { p.0 }
}

impl fmt::Display for Pincode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid pincode: {0:?}")]
pub struct PincodeError(String);

/// Per-size stock counts.
///
/// Persisted as a JSON object in a text column (`{"S":4,"M":0}`). Older rows
/// sometimes carry counts as strings, so parsing accepts both.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeStock(BTreeMap<String, u32>);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StockError {
    #[error("size {0} does not exist for this product")]
    UnknownSize(String),
    #[error("only {available} left in size {size}, {requested} requested")]
    Insufficient { size: String, available: u32, requested: u32 },
    #[error("malformed size stock: {0}")]
    Malformed(String),
}

impl SizeStock {
    pub fn new() -> Self { Self::default() }

    pub fn parse(text: &str) -> Result<Self, StockError> {
        if text.trim().is_empty() { return Ok(Self::default()); }
        let raw: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(text).map_err(|e| StockError::Malformed(e.to_string()))?;
        let mut sizes = BTreeMap::new();
        for (size, value) in raw {
            let count = match &value {
                serde_json::Value::Number(n) => n.as_i64(),
                serde_json::Value::String(s) => s.trim().parse::<i64>().ok(),
                serde_json::Value::Null => Some(0),
                _ => None,
            }
            .ok_or_else(|| StockError::Malformed(format!("{size}: {value}")))?;
            sizes.insert(size, u32::try_from(count.max(0)).unwrap_or(u32::MAX));
        }
        Ok(Self(sizes))
    }

    pub fn to_text(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn available(&self, size: &str) -> u32 { self.0.get(size).copied().unwrap_or(0) }
    pub fn has_size(&self, size: &str) -> bool { self.0.contains_key(size) }
    pub fn total(&self) -> u64 { self.0.values().map(|&n| u64::from(n)).sum() }
    pub fn sizes(&self) -> impl Iterator<Item = (&str, u32)> { self.0.iter().map(|(k, v)| (k.as_str(), *v)) }

    pub fn take(&mut self, size: &str, qty: u32) -> Result<(), StockError> {
        let slot = self.0.get_mut(size).ok_or_else(|| StockError::UnknownSize(size.to_string()))?;
        if *slot < qty {
            return Err(StockError::Insufficient { size: size.to_string(), available: *slot, requested: qty });
        }
        *slot -= qty;
        Ok(())
    }

    /// Takes at most `qty` units; a size that does not exist has none. Returns the units taken.
    pub fn take_up_to(&mut self, size: &str, qty: u32) -> u32 {
        match self.0.get_mut(size) {
            Some(slot) => {
                let taken = (*slot).min(qty);
                *slot -= taken;
                taken
            }
            None => 0,
        }
    }

    /// Adds stock, creating the size if it is new. Returns the previous count.
    pub fn restock(&mut self, size: &str, qty: u32) -> u32 {
        let slot = self.0.entry(size.to_string()).or_insert(0);
        let before = *slot;
        *slot = slot.saturating_add(qty);
        before
    }
}

impl FromIterator<(String, u32)> for SizeStock {
    fn from_iter<I: IntoIterator<Item = (String, u32)>>(iter: I) -> Self { Self(iter.into_iter().collect()) }
}
