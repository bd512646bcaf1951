//! HTTP routes.
//!
//! ```text
//! GET  /health
//!
//! # Storefront
//! GET  /api/v1/products                        GET /api/v1/products/:id
//! GET|POST|PUT|DELETE /api/v1/cart/:session
//! GET|POST /api/v1/wishlist/:user_id           DELETE /api/v1/wishlist/:user_id/:product_id
//! POST /api/v1/promo/validate
//! POST /api/v1/checkout/quote                  POST /api/v1/checkout
//! POST /api/v1/payments/verify                 POST /api/v1/payments/webhook
//! GET  /api/v1/shipping/serviceability
//! GET  /api/v1/users/:user_id/orders           GET /api/v1/users/:user_id/points
//! GET  /api/v1/orders/:id                      POST /api/v1/orders/:id/exchange
//! POST /api/v1/subscribers                     POST /api/v1/size-notifications
//! GET  /api/v1/hero-images                     GET /api/v1/videos
//!
//! # Admin (Authorization: Bearer $ADMIN_API_TOKEN)
//! POST /api/v1/admin/products                  PUT|DELETE /api/v1/admin/products/:id
//! PUT  /api/v1/admin/products/:id/stock
//! GET  /api/v1/admin/orders                    PUT /api/v1/admin/orders/:id/status
//! POST /api/v1/admin/orders/:id/shipment
//! GET|POST /api/v1/admin/promo-codes           PUT|DELETE /api/v1/admin/promo-codes/:code
//! GET  /api/v1/admin/subscribers               DELETE /api/v1/admin/subscribers/:id
//! POST /api/v1/admin/hero-images               DELETE /api/v1/admin/hero-images/:id
//! POST /api/v1/admin/videos                    DELETE /api/v1/admin/videos/:id
//! GET  /api/v1/admin/size-notifications
//! POST /api/v1/admin/users/:user_id/points
//! GET  /api/v1/admin/dashboard/sales           GET /api/v1/admin/dashboard/products
//! ```

use axum::{
    extract::{Request, State},
    http::header,
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post, put},
    Json, Router,
};
use secrecy::ExposeSecret;
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::error::AppError;
use crate::payments::razorpay::constant_time_eq;
use crate::state::AppState;

pub mod cart;
pub mod checkout;
pub mod content;
pub mod customers;
pub mod dashboard;
pub mod orders;
pub mod payments;
pub mod products;
pub mod promo;
pub mod shipping;

#[derive(Debug, Serialize)]
pub struct Paginated<T> { pub data: Vec<T>, pub total: i64, pub page: u32 }

pub fn router(state: AppState) -> Router {
    let storefront = Router::new()
        .route("/products", get(products::list_products))
        .route("/products/:id", get(products::get_product))
        .route("/cart/:session", get(cart::get_cart).post(cart::add_to_cart).put(cart::update_cart).delete(cart::clear_cart))
        .route("/wishlist/:user_id", get(customers::get_wishlist).post(customers::add_to_wishlist))
        .route("/wishlist/:user_id/:product_id", delete(customers::remove_from_wishlist))
        .route("/promo/validate", post(promo::validate_promo))
        .route("/checkout/quote", post(checkout::quote))
        .route("/checkout", post(checkout::checkout))
        .route("/payments/verify", post(payments::verify_payment))
        .route("/payments/webhook", post(payments::webhook))
        .route("/shipping/serviceability", get(shipping::serviceability))
        .route("/users/:user_id/orders", get(orders::user_orders))
        .route("/users/:user_id/points", get(customers::get_points))
        .route("/orders/:id", get(orders::get_order))
        .route("/orders/:id/exchange", post(orders::request_exchange))
        .route("/subscribers", post(customers::subscribe))
        .route("/size-notifications", post(customers::request_size_notification))
        .route("/hero-images", get(content::list_hero_images))
        .route("/videos", get(content::list_videos));

    let admin = Router::new()
        .route("/products", post(products::create_product))
        .route("/products/:id", put(products::update_product).delete(products::delete_product))
        .route("/products/:id/stock", put(products::update_stock))
        .route("/orders", get(orders::list_orders))
        .route("/orders/:id/status", put(orders::update_status))
        .route("/orders/:id/shipment", post(orders::create_shipment))
        .route("/promo-codes", get(promo::list_promo_codes).post(promo::create_promo_code))
        .route("/promo-codes/:code", put(promo::update_promo_code).delete(promo::delete_promo_code))
        .route("/subscribers", get(customers::list_subscribers))
        .route("/subscribers/:id", delete(customers::delete_subscriber))
        .route("/size-notifications", get(customers::list_size_notifications))
        .route("/users/:user_id/points", post(customers::adjust_points))
        .route("/hero-images", post(content::add_hero_image))
        .route("/hero-images/:id", delete(content::delete_hero_image))
        .route("/videos", post(content::add_video))
        .route("/videos/:id", delete(content::delete_video))
        .route("/dashboard/sales", get(dashboard::sales))
        .route("/dashboard/products", get(dashboard::products))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "storefront-api"})) }))
        .nest("/api/v1", storefront.nest("/admin", admin))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Rejects admin requests that do not carry the configured bearer token.
pub async fn require_admin(State(state): State<AppState>, request: Request, next: Next) -> Result<Response, AppError> {
    let token = request.headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthorized("missing bearer token".into()))?;
    if !constant_time_eq(token.trim().as_bytes(), state.config().admin_token.expose_secret().as_bytes()) {
        tracing::warn!(path = %request.uri().path(), "rejected admin request");
        return Err(AppError::Unauthorized("invalid admin token".into()));
    }
    Ok(next.run(request).await)
}
