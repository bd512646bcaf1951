//! Storefront domain: catalog, orders, promotions and pricing.
pub mod aggregates;
pub mod events;
pub mod pricing;
pub mod promo;
pub mod value_objects;
