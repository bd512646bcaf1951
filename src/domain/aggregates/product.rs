//! Product Aggregate

use chrono::{DateTime, Utc};
use uuid::Uuid;
use crate::domain::value_objects::{Money, SizeStock, Sku, StockError};
use crate::domain::events::ProductEvent;

#[derive(Clone, Debug)]
pub struct Product {
    id: Uuid,
    sku: Sku,
    name: String,
    description: String,
    category: Option<String>,
    price: Money,
    compare_at_price: Option<Money>,
    stock: SizeStock,
    status: ProductStatus,
    images: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    events: Vec<ProductEvent>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)] pub enum ProductStatus { #[default] Draft, Active, Archived }

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Draft => "draft", Self::Active => "active", Self::Archived => "archived" }
    }
    pub fn parse(s: &str) -> Option<Self> {
        match s { "draft" => Some(Self::Draft), "active" => Some(Self::Active), "archived" => Some(Self::Archived), _ => None }
    }
}

impl Product {
    pub fn create(sku: Sku, name: impl Into<String>, price: Money) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(), sku, name: name.into(), description: String::new(), category: None,
            price, compare_at_price: None, stock: SizeStock::new(), status: ProductStatus::Draft,
            images: vec![], created_at: now, updated_at: now, events: vec![],
        }
    }

    /// Rehydrates a product loaded from storage.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: Uuid, sku: Sku, name: String, description: String, category: Option<String>, price: Money,
        compare_at_price: Option<Money>, stock: SizeStock, status: ProductStatus, images: Vec<String>,
        created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
    ) -> Self {
        Self { id, sku, name, description, category, price, compare_at_price, stock, status, images, created_at, updated_at, events: vec![] }
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn sku(&self) -> &Sku { &self.sku }
    pub fn name(&self) -> &str { &self.name }
    pub fn description(&self) -> &str { &self.description }
    pub fn category(&self) -> Option<&str> { self.category.as_deref() }
    pub fn price(&self) -> &Money { &self.price }
    pub fn compare_at_price(&self) -> Option<&Money> { self.compare_at_price.as_ref() }
    pub fn stock(&self) -> &SizeStock { &self.stock }
    pub fn status(&self) -> ProductStatus { self.status }
    pub fn images(&self) -> &[String] { &self.images }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }
    pub fn is_in_stock(&self) -> bool { self.stock.total() > 0 }
    pub fn is_purchasable(&self) -> bool { self.status == ProductStatus::Active }

    pub fn publish(&mut self) -> Result<(), ProductError> {
        if self.name.trim().is_empty() { return Err(ProductError::MissingName); }
        if self.price.amount().is_sign_negative() || self.price.amount().is_zero() { return Err(ProductError::InvalidPrice); }
        self.status = ProductStatus::Active;
        self.touch();
        Ok(())
    }

    pub fn unpublish(&mut self) { self.status = ProductStatus::Draft; self.touch(); }
    pub fn archive(&mut self) { self.status = ProductStatus::Archived; self.touch(); }

    pub fn rename(&mut self, name: impl Into<String>) -> Result<(), ProductError> {
        let name = name.into();
        if name.trim().is_empty() { return Err(ProductError::MissingName); }
        self.name = name;
        self.touch();
        Ok(())
    }

    pub fn describe(&mut self, description: impl Into<String>, category: Option<String>, images: Vec<String>) {
        self.description = description.into();
        self.category = category;
        self.images = images;
        self.touch();
    }

    pub fn update_price(&mut self, price: Money, compare_at_price: Option<Money>) {
        self.price = price;
        self.compare_at_price = compare_at_price;
        self.touch();
    }

    pub fn reserve(&mut self, size: &str, qty: u32) -> Result<(), ProductError> {
        self.stock.take(size, qty)?;
        self.touch();
        self.events.push(ProductEvent::StockTaken { product_id: self.id, size: size.to_string(), quantity: qty });
        Ok(())
    }

    /// Takes whatever is left of `qty` in `size`, which may be nothing. Returns the units taken.
    pub fn reserve_up_to(&mut self, size: &str, qty: u32) -> u32 {
        let taken = self.stock.take_up_to(size, qty);
        if taken > 0 {
            self.touch();
            self.events.push(ProductEvent::StockTaken { product_id: self.id, size: size.to_string(), quantity: taken });
        }
        taken
    }

    /// Adds stock to a size. Raises `BackInStock` when the size goes from empty to available.
    pub fn restock(&mut self, size: &str, qty: u32) {
        let before = self.stock.restock(size, qty);
        self.touch();
        if before == 0 && qty > 0 {
            self.events.push(ProductEvent::BackInStock { product_id: self.id, size: size.to_string() });
        }
    }

    /// Replaces the stock map wholesale, raising `BackInStock` for every size that was empty.
    pub fn replace_stock(&mut self, stock: SizeStock) {
        for (size, qty) in stock.sizes() {
            if qty > 0 && self.stock.available(size) == 0 {
                self.events.push(ProductEvent::BackInStock { product_id: self.id, size: size.to_string() });
            }
        }
        self.stock = stock;
        self.touch();
    }

    pub fn take_events(&mut self) -> Vec<ProductEvent> { std::mem::take(&mut self.events) }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProductError {
    #[error("Missing name")]
    MissingName,
    #[error("Price must be positive")]
    InvalidPrice,
    #[error(transparent)]
    Stock(#[from] StockError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn tee() -> Product {
        Product::create(Sku::new("TEE-001").unwrap(), "Oversized Tee", Money::inr(Decimal::new(1299, 0)))
    }

    #[test]
    fn test_product_create() {
        let p = tee();
        assert_eq!(p.name(), "Oversized Tee");
        assert_eq!(p.status(), ProductStatus::Draft);
        assert!(!p.is_in_stock());
    }

    #[test]
    fn test_publish_requires_price() {
        let mut p = Product::create(Sku::new("X").unwrap(), "Free", Money::inr(Decimal::ZERO));
        assert_eq!(p.publish(), Err(ProductError::InvalidPrice));
        let mut p = tee();
        p.publish().unwrap();
        assert!(p.is_purchasable());
    }

    #[test]
    fn test_rename_rejects_blank() {
        let mut p = tee();
        assert_eq!(p.rename("  "), Err(ProductError::MissingName));
        p.rename("Boxy Tee").unwrap();
        assert_eq!(p.name(), "Boxy Tee");
    }

    #[test]
    fn test_stock() {
        let mut p = tee();
        p.restock("M", 3);
        assert!(p.is_in_stock());
        p.reserve("M", 2).unwrap();
        assert_eq!(p.stock().available("M"), 1);
        assert!(matches!(p.reserve("M", 2), Err(ProductError::Stock(StockError::Insufficient { .. }))));
    }

    #[test]
    fn test_reserve_up_to_clamps_short_and_missing_sizes() {
        let mut p = tee();
        p.replace_stock(SizeStock::parse(r#"{"M":3}"#).unwrap());
        p.take_events();
        assert_eq!(p.reserve_up_to("M", 5), 3);
        assert_eq!(p.reserve_up_to("L", 1), 0);
        assert_eq!(p.stock().total(), 0);
        assert_eq!(p.take_events(), vec![ProductEvent::StockTaken { product_id: p.id(), size: "M".into(), quantity: 3 }]);
    }

    #[test]
    fn test_back_in_stock_events() {
        let mut p = tee();
        p.restock("S", 1);
        p.restock("S", 1);
        let events = p.take_events();
        assert_eq!(events, vec![ProductEvent::BackInStock { product_id: p.id(), size: "S".into() }]);

        p.replace_stock(SizeStock::parse(r#"{"S":5,"L":2}"#).unwrap());
        let events = p.take_events();
        assert_eq!(events, vec![ProductEvent::BackInStock { product_id: p.id(), size: "L".into() }]);
    }
}
