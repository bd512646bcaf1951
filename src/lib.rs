//! Storefront API
//!
//! Backend for an apparel storefront and its admin console.
//!
//! ## Features
//! - Product catalog with per-size stock
//! - Session carts, wishlists and back-in-stock requests
//! - Checkout with promo codes, loyalty points and shipping charges
//! - Razorpay payments (browser callback and webhook)
//! - Shiprocket serviceability checks and shipment creation
//! - Order lifecycle with stock, promo and points bookkeeping
//! - Admin dashboards over order history

pub mod config;
pub mod dashboard;
pub mod db;
pub mod domain;
pub mod error;
pub mod payments;
pub mod routes;
pub mod shipping;
pub mod state;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use state::AppState;

/// The full HTTP application.
pub fn app(state: AppState) -> axum::Router {
    routes::router(state)
}
