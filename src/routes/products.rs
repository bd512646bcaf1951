//! Catalog browsing and admin product management.

use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::db::{self, products::{ProductFilter, ProductView}, Page};
use crate::domain::aggregates::{Product, ProductStatus};
use crate::domain::events::ProductEvent;
use crate::domain::value_objects::{Money, SizeStock, Sku};
use crate::error::{AppError, AppResult};
use crate::routes::Paginated;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListParams { pub page: Option<u32>, pub per_page: Option<u32>, pub category: Option<String>, pub search: Option<String> }

pub async fn list_products(State(s): State<AppState>, Query(p): Query<ListParams>) -> AppResult<Json<Paginated<ProductView>>> {
    let page = Page::new(p.page, p.per_page);
    let filter = ProductFilter {
        category: p.category.filter(|c| !c.trim().is_empty()),
        search: p.search.filter(|q| !q.trim().is_empty()),
        include_inactive: false,
        limit: page.limit(),
        offset: page.offset(),
    };
    let (rows, total) = db::products::list(s.pool(), &filter).await?;
    let data = rows.into_iter().filter_map(|row| {
        let id = row.id;
        row.into_product()
            .map_err(|e| tracing::warn!(product_id = %id, error = %e, "skipping unreadable product"))
            .ok()
            .map(|p| ProductView::from(&p))
    }).collect();
    Ok(Json(Paginated { data, total, page: page.page }))
}

pub async fn get_product(State(s): State<AppState>, Path(id): Path<Uuid>) -> AppResult<Json<ProductView>> {
    let product = db::products::get(s.pool(), id).await?
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))?
        .into_product()?;
    if !product.is_purchasable() {
        return Err(AppError::NotFound(format!("product {id}")));
    }
    Ok(Json(ProductView::from(&product)))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 64))]
    pub sku: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: Option<String>,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub sizes: BTreeMap<String, u32>,
    #[serde(default = "publish_by_default")]
    pub publish: bool,
}

fn publish_by_default() -> bool { true }

pub async fn create_product(State(s): State<AppState>, Json(r): Json<CreateProductRequest>) -> AppResult<(StatusCode, Json<ProductView>)> {
    r.validate()?;
    if r.price.is_sign_negative() {
        return Err(AppError::BadRequest("price cannot be negative".into()));
    }
    let sku = Sku::new(&r.sku).map_err(|e| AppError::BadRequest(e.to_string()))?;
    let mut product = Product::create(sku, r.name, Money::inr(r.price));
    product.describe(r.description, r.category, r.images);
    product.update_price(Money::inr(r.price), r.compare_at_price.map(Money::inr));
    product.replace_stock(r.sizes.into_iter().collect());
    product.take_events();
    if r.publish {
        product.publish()?;
    }
    let row = db::products::insert(s.pool(), &product).await
        .map_err(|e| AppError::from_insert(e, format!("sku {}", product.sku())))?;
    tracing::info!(product_id = %row.id, sku = %row.sku, "product created");
    Ok((StatusCode::CREATED, Json(ProductView::from(&row.into_product()?))))
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: Option<String>,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    #[serde(default)]
    pub images: Vec<String>,
    pub status: Option<String>,
}

pub async fn update_product(State(s): State<AppState>, Path(id): Path<Uuid>, Json(r): Json<UpdateProductRequest>) -> AppResult<Json<ProductView>> {
    r.validate()?;
    let status = r.status.as_deref().map(|st| ProductStatus::parse(st).ok_or_else(|| AppError::BadRequest(format!("unknown product status {st:?}")))).transpose()?;
    if r.price.is_sign_negative() {
        return Err(AppError::BadRequest("price cannot be negative".into()));
    }

    let mut tx = s.pool().begin().await?;
    let mut product = db::products::lock(&mut tx, id).await?
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))?
        .into_product()?;
    product.rename(r.name)?;
    product.describe(r.description, r.category, r.images);
    product.update_price(Money::inr(r.price), r.compare_at_price.map(Money::inr));
    match status {
        Some(ProductStatus::Active) => product.publish()?,
        Some(ProductStatus::Draft) => product.unpublish(),
        Some(ProductStatus::Archived) => product.archive(),
        None => {}
    }
    let row = db::products::update(&mut tx, &product).await?
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))?;
    tx.commit().await?;
    Ok(Json(ProductView::from(&row.into_product()?)))
}

pub async fn delete_product(State(s): State<AppState>, Path(id): Path<Uuid>) -> AppResult<StatusCode> {
    if !db::products::archive(s.pool(), id).await? {
        return Err(AppError::NotFound(format!("product {id}")));
    }
    tracing::info!(product_id = %id, "product archived");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct StockUpdateRequest { pub sizes: BTreeMap<String, u32> }

/// Replaces a product's size stock. Sizes coming back into stock release pending
/// back-in-stock requests.
pub async fn update_stock(State(s): State<AppState>, Path(id): Path<Uuid>, Json(r): Json<StockUpdateRequest>) -> AppResult<Json<ProductView>> {
    let mut tx = s.pool().begin().await?;
    let mut product = db::products::lock(&mut tx, id).await?
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))?
        .into_product()?;
    product.replace_stock(r.sizes.into_iter().collect::<SizeStock>());
    db::products::save_stock(&mut tx, id, product.stock()).await?;
    tx.commit().await?;

    let events = product.take_events();
    notify_back_in_stock(&s, &events).await?;
    s.events().publish_all(events).await;
    Ok(Json(ProductView::from(&product)))
}

/// Marks size notification requests as served for every size that came back into stock.
pub(crate) async fn notify_back_in_stock(s: &AppState, events: &[ProductEvent]) -> AppResult<()> {
    for event in events {
        if let ProductEvent::BackInStock { product_id, size } = event {
            let emails = db::customers::mark_size_notified(s.pool(), *product_id, size).await?;
            if !emails.is_empty() {
                tracing::info!(%product_id, %size, waiting = emails.len(), "size back in stock");
            }
        }
    }
    Ok(())
}
