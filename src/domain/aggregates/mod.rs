//! Aggregates module
pub mod product;
pub mod order;
pub mod cart;

pub use product::{Product, ProductError, ProductStatus};
pub use order::{
    generate_display_order_id, Effect, ExchangeLine, Order, OrderError, OrderKind, OrderLine, OrderRow, OrderStatus,
    OrderTotals, Shipment, ShippingAddress, Transition,
};
pub use cart::{Cart, CartError, CartItem};
