//! Cart Aggregate

use serde::Serialize;
use uuid::Uuid;
use crate::domain::value_objects::{Money, DEFAULT_CURRENCY};

#[derive(Clone, Debug, Serialize)]
pub struct Cart {
    session_id: String,
    items: Vec<CartItem>,
    subtotal: Money,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CartItem {
    pub product_id: Uuid,
    pub size: String,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Money,
}

impl CartItem {
    pub fn line_total(&self) -> Money { self.unit_price.multiply(self.quantity) }
}

impl Cart {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self { session_id: session_id.into(), items: vec![], subtotal: Money::zero(DEFAULT_CURRENCY) }
    }

    pub fn session_id(&self) -> &str { &self.session_id }
    pub fn items(&self) -> &[CartItem] { &self.items }
    pub fn subtotal(&self) -> &Money { &self.subtotal }
    pub fn item_count(&self) -> u32 { self.items.iter().map(|i| i.quantity).sum() }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    pub fn add_item(&mut self, item: CartItem) {
        if let Some(existing) = self.items.iter_mut().find(|i| i.product_id == item.product_id && i.size == item.size) {
            existing.quantity += item.quantity;
        } else {
            self.items.push(item);
        }
        self.recalculate();
    }

    pub fn update_quantity(&mut self, product_id: Uuid, size: &str, quantity: u32) -> Result<(), CartError> {
        let item = self.items.iter_mut().find(|i| i.product_id == product_id && i.size == size).ok_or(CartError::ItemNotFound)?;
        if quantity == 0 { self.items.retain(|i| !(i.product_id == product_id && i.size == size)); }
        else { item.quantity = quantity; }
        self.recalculate();
        Ok(())
    }

    fn recalculate(&mut self) {
        self.subtotal = self.items.iter().fold(Money::zero(DEFAULT_CURRENCY), |acc, i| acc.add(&i.line_total()).unwrap_or(acc));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum CartError { ItemNotFound }
impl std::error::Error for CartError {}
impl std::fmt::Display for CartError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "Item not found in cart") }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn item(size: &str, quantity: u32) -> CartItem {
        CartItem { product_id: Uuid::nil(), size: size.into(), name: "Hoodie".into(), quantity, unit_price: Money::inr(Decimal::new(10, 0)) }
    }

    #[test]
    fn test_cart_operations() {
        let mut cart = Cart::new("sess-1");
        cart.add_item(item("M", 2));
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.subtotal().amount(), Decimal::new(20, 0));
        cart.add_item(item("M", 1));
        assert_eq!(cart.items()[0].quantity, 3); // Merged
        cart.add_item(item("L", 1));
        assert_eq!(cart.items().len(), 2);
        assert_eq!(cart.item_count(), 4);
    }

    #[test]
    fn test_update_to_zero_removes() {
        let mut cart = Cart::new("sess-1");
        cart.add_item(item("M", 2));
        cart.add_item(item("L", 1));
        cart.update_quantity(Uuid::nil(), "M", 0).unwrap();
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.subtotal().amount(), Decimal::new(10, 0));
        assert_eq!(cart.update_quantity(Uuid::nil(), "XS", 1), Err(CartError::ItemNotFound));
    }
}
