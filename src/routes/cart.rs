//! Anonymous session carts.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::db;
use crate::domain::aggregates::Cart;
use crate::domain::value_objects::StockError;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub async fn get_cart(State(s): State<AppState>, Path(session): Path<String>) -> AppResult<Json<Cart>> {
    Ok(Json(db::cart::get(s.pool(), &session).await?))
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddToCartRequest {
    pub product_id: Uuid,
    #[validate(length(min = 1, max = 16))]
    pub size: String,
    #[validate(range(min = 1, max = 20))]
    pub quantity: i32,
}

pub async fn add_to_cart(State(s): State<AppState>, Path(session): Path<String>, Json(r): Json<AddToCartRequest>) -> AppResult<(StatusCode, Json<Cart>)> {
    r.validate()?;
    let product = db::products::get(s.pool(), r.product_id).await?
        .ok_or_else(|| AppError::NotFound(format!("product {}", r.product_id)))?
        .into_product()?;
    if !product.is_purchasable() {
        return Err(AppError::NotFound(format!("product {}", r.product_id)));
    }
    if !product.stock().has_size(&r.size) {
        return Err(StockError::UnknownSize(r.size).into());
    }
    db::cart::add(s.pool(), &session, r.product_id, &r.size, r.quantity).await?;
    Ok((StatusCode::CREATED, Json(db::cart::get(s.pool(), &session).await?)))
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCartRequest {
    pub product_id: Uuid,
    pub size: String,
    #[validate(range(max = 20))]
    pub quantity: u32,
}

/// Sets the quantity of a line already in the cart; zero removes it.
pub async fn update_cart(State(s): State<AppState>, Path(session): Path<String>, Json(r): Json<UpdateCartRequest>) -> AppResult<Json<Cart>> {
    r.validate()?;
    let mut cart = db::cart::get(s.pool(), &session).await?;
    cart.update_quantity(r.product_id, &r.size, r.quantity)
        .map_err(|e| AppError::NotFound(format!("{e}: {} size {}", r.product_id, r.size)))?;
    db::cart::set_quantity(s.pool(), &session, r.product_id, &r.size, r.quantity).await?;
    Ok(Json(cart))
}

pub async fn clear_cart(State(s): State<AppState>, Path(session): Path<String>) -> AppResult<StatusCode> {
    db::cart::clear(s.pool(), &session).await?;
    Ok(StatusCode::NO_CONTENT)
}
