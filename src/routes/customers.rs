//! Wishlists, loyalty points, newsletter subscribers and back-in-stock requests.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::db::{
    self,
    customers::{SizeNotification, Subscriber, WishlistEntry},
    points::PointTransaction,
    Page, PointsReason,
};
use crate::error::{AppError, AppResult};
use crate::routes::Paginated;
use crate::state::AppState;

const POINTS_HISTORY_LIMIT: i64 = 50;

pub async fn get_wishlist(State(s): State<AppState>, Path(user_id): Path<String>) -> AppResult<Json<Vec<WishlistEntry>>> {
    Ok(Json(db::customers::wishlist(s.pool(), &user_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct WishlistRequest { pub product_id: Uuid }

pub async fn add_to_wishlist(State(s): State<AppState>, Path(user_id): Path<String>, Json(r): Json<WishlistRequest>) -> AppResult<StatusCode> {
    if db::products::get(s.pool(), r.product_id).await?.is_none() {
        return Err(AppError::NotFound(format!("product {}", r.product_id)));
    }
    let created = db::customers::add_to_wishlist(s.pool(), &user_id, r.product_id).await?;
    Ok(if created { StatusCode::CREATED } else { StatusCode::OK })
}

pub async fn remove_from_wishlist(State(s): State<AppState>, Path((user_id, product_id)): Path<(String, Uuid)>) -> AppResult<StatusCode> {
    db::customers::remove_from_wishlist(s.pool(), &user_id, product_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub struct PointsResponse { pub user_id: String, pub balance: u32, pub history: Vec<PointTransaction> }

pub async fn get_points(State(s): State<AppState>, Path(user_id): Path<String>) -> AppResult<Json<PointsResponse>> {
    let balance = db::points::balance(s.pool(), &user_id).await?;
    let history = db::points::history(s.pool(), &user_id, POINTS_HISTORY_LIMIT).await?;
    Ok(Json(PointsResponse { user_id, balance, history }))
}

#[derive(Debug, Deserialize)]
pub struct AdjustPointsRequest { pub delta: i64 }

/// Manual correction by an admin. The balance still never drops below zero.
pub async fn adjust_points(State(s): State<AppState>, Path(user_id): Path<String>, Json(r): Json<AdjustPointsRequest>) -> AppResult<Json<PointsResponse>> {
    if r.delta == 0 {
        return Err(AppError::BadRequest("delta must be non-zero".into()));
    }
    let mut tx = s.pool().begin().await?;
    db::points::adjust(&mut tx, &user_id, r.delta, PointsReason::Adjusted, None).await?;
    tx.commit().await?;
    tracing::info!(%user_id, delta = r.delta, "points adjusted by admin");
    get_points(State(s), Path(user_id)).await
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubscribeRequest {
    #[validate(email)]
    pub email: String,
}

pub async fn subscribe(State(s): State<AppState>, Json(r): Json<SubscribeRequest>) -> AppResult<(StatusCode, Json<Subscriber>)> {
    r.validate()?;
    Ok((StatusCode::CREATED, Json(db::customers::subscribe(s.pool(), &r.email).await?)))
}

#[derive(Debug, Deserialize)]
pub struct PageParams { pub page: Option<u32>, pub per_page: Option<u32> }

pub async fn list_subscribers(State(s): State<AppState>, Query(p): Query<PageParams>) -> AppResult<Json<Paginated<Subscriber>>> {
    let page = Page::new(p.page, p.per_page);
    let (data, total) = db::customers::subscribers(s.pool(), page.limit(), page.offset()).await?;
    Ok(Json(Paginated { data, total, page: page.page }))
}

pub async fn delete_subscriber(State(s): State<AppState>, Path(id): Path<Uuid>) -> AppResult<StatusCode> {
    if !db::customers::unsubscribe(s.pool(), id).await? {
        return Err(AppError::NotFound(format!("subscriber {id}")));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize, Validate)]
pub struct SizeNotificationRequest {
    pub product_id: Uuid,
    #[validate(length(min = 1, max = 16))]
    pub size: String,
    #[validate(email)]
    pub email: String,
}

/// Registers interest in a size that is currently sold out.
pub async fn request_size_notification(State(s): State<AppState>, Json(r): Json<SizeNotificationRequest>) -> AppResult<StatusCode> {
    r.validate()?;
    let product = db::products::get(s.pool(), r.product_id).await?
        .ok_or_else(|| AppError::NotFound(format!("product {}", r.product_id)))?
        .into_product()?;
    if !product.stock().has_size(&r.size) {
        return Err(AppError::BadRequest(format!("size {} does not exist for this product", r.size)));
    }
    if product.stock().available(&r.size) > 0 {
        return Err(AppError::Conflict(format!("size {} is in stock", r.size)));
    }
    db::customers::request_size_notification(s.pool(), r.product_id, &r.size, &r.email).await?;
    Ok(StatusCode::ACCEPTED)
}

#[derive(Debug, Deserialize)]
pub struct SizeNotificationParams { #[serde(default)] pub pending: bool }

pub async fn list_size_notifications(State(s): State<AppState>, Query(p): Query<SizeNotificationParams>) -> AppResult<Json<Vec<SizeNotification>>> {
    Ok(Json(db::customers::size_notifications(s.pool(), p.pending).await?))
}
