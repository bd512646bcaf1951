//! Product catalog queries.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::domain::aggregates::{Product, ProductStatus};
use crate::domain::value_objects::{Money, SizeStock, Sku, StockError};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductRow {
    pub id: Uuid, pub sku: String, pub name: String, pub description: String, pub category: Option<String>,
    pub price: Decimal, pub compare_at_price: Option<Decimal>, pub images: Vec<String>, pub sizes: String,
    pub status: String, pub created_at: DateTime<Utc>, pub updated_at: DateTime<Utc>,
}

impl ProductRow {
    pub fn into_product(self) -> Result<Product, StockError> {
        let stock = SizeStock::parse(&self.sizes)?;
        let sku = Sku::new(&self.sku).map_err(|e| StockError::Malformed(format!("product {} sku: {e}", self.id)))?;
        Ok(Product::restore(
            self.id, sku, self.name, self.description, self.category, Money::inr(self.price),
            self.compare_at_price.map(Money::inr), stock,
            ProductStatus::parse(&self.status).unwrap_or_default(), self.images, self.created_at, self.updated_at,
        ))
    }
}

/// Product as served to the storefront and admin screens.
#[derive(Debug, Clone, Serialize)]
pub struct ProductView {
    pub id: Uuid, pub sku: String, pub name: String, pub description: String, pub category: Option<String>,
    pub price: Decimal, pub compare_at_price: Option<Decimal>, pub images: Vec<String>, pub sizes: SizeStock,
    pub in_stock: bool, pub status: &'static str, pub created_at: DateTime<Utc>, pub updated_at: DateTime<Utc>,
}

impl From<&Product> for ProductView {
    fn from(p: &Product) -> Self {
        Self {
            id: p.id(), sku: p.sku().to_string(), name: p.name().to_string(), description: p.description().to_string(),
            category: p.category().map(String::from), price: p.price().amount(),
            compare_at_price: p.compare_at_price().map(Money::amount), images: p.images().to_vec(),
            sizes: p.stock().clone(), in_stock: p.is_in_stock(), status: p.status().as_str(),
            created_at: p.created_at(), updated_at: p.updated_at(),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct ProductFilter { pub category: Option<String>, pub search: Option<String>, pub include_inactive: bool, pub limit: i64, pub offset: i64 }

const COLUMNS: &str = "id, sku, name, description, category, price, compare_at_price, images, sizes, status, created_at, updated_at";

pub async fn list(pool: &PgPool, f: &ProductFilter) -> Result<(Vec<ProductRow>, i64), sqlx::Error> {
    let search = f.search.as_deref().map(|s| format!("%{}%", s.trim()));
    let filter = "WHERE ($1 OR status = 'active') AND ($2::TEXT IS NULL OR category = $2) AND ($3::TEXT IS NULL OR name ILIKE $3 OR description ILIKE $3)";
    let rows = sqlx::query_as::<_, ProductRow>(&format!("SELECT {COLUMNS} FROM products {filter} ORDER BY created_at DESC LIMIT $4 OFFSET $5"))
        .bind(f.include_inactive).bind(&f.category).bind(&search).bind(f.limit).bind(f.offset)
        .fetch_all(pool).await?;
    let total: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM products {filter}"))
        .bind(f.include_inactive).bind(&f.category).bind(&search)
        .fetch_one(pool).await?;
    Ok((rows, total.0))
}

pub async fn get(pool: &PgPool, id: Uuid) -> Result<Option<ProductRow>, sqlx::Error> {
    sqlx::query_as::<_, ProductRow>(&format!("SELECT {COLUMNS} FROM products WHERE id = $1")).bind(id).fetch_optional(pool).await
}

pub async fn get_many(pool: &PgPool, ids: &[Uuid]) -> Result<Vec<ProductRow>, sqlx::Error> {
    sqlx::query_as::<_, ProductRow>(&format!("SELECT {COLUMNS} FROM products WHERE id = ANY($1)")).bind(ids).fetch_all(pool).await
}

/// Loads a product and locks its row until the surrounding transaction ends.
pub async fn lock(conn: &mut PgConnection, id: Uuid) -> Result<Option<ProductRow>, sqlx::Error> {
    sqlx::query_as::<_, ProductRow>(&format!("SELECT {COLUMNS} FROM products WHERE id = $1 FOR UPDATE")).bind(id).fetch_optional(conn).await
}

pub async fn insert(pool: &PgPool, p: &Product) -> Result<ProductRow, sqlx::Error> {
    sqlx::query_as::<_, ProductRow>(&format!(
        "INSERT INTO products ({COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) RETURNING {COLUMNS}"
    ))
    .bind(p.id()).bind(p.sku().as_str()).bind(p.name()).bind(p.description()).bind(p.category())
    .bind(p.price().amount()).bind(p.compare_at_price().map(Money::amount)).bind(p.images()).bind(p.stock().to_text())
    .bind(p.status().as_str()).bind(p.created_at()).bind(p.updated_at())
    .fetch_one(pool).await
}

pub async fn update(conn: &mut PgConnection, p: &Product) -> Result<Option<ProductRow>, sqlx::Error> {
    sqlx::query_as::<_, ProductRow>(&format!(
        "UPDATE products SET name = $2, description = $3, category = $4, price = $5, compare_at_price = $6, images = $7, sizes = $8, status = $9, updated_at = $10 WHERE id = $1 RETURNING {COLUMNS}"
    ))
    .bind(p.id()).bind(p.name()).bind(p.description()).bind(p.category()).bind(p.price().amount())
    .bind(p.compare_at_price().map(Money::amount)).bind(p.images()).bind(p.stock().to_text())
    .bind(p.status().as_str()).bind(p.updated_at())
    .fetch_optional(conn).await
}

pub async fn save_stock(conn: &mut PgConnection, id: Uuid, stock: &SizeStock) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE products SET sizes = $2, updated_at = NOW() WHERE id = $1").bind(id).bind(stock.to_text()).execute(conn).await?;
    Ok(())
}

/// Products are archived rather than deleted; order rows keep referencing them.
pub async fn archive(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let r = sqlx::query("UPDATE products SET status = 'archived', updated_at = NOW() WHERE id = $1").bind(id).execute(pool).await?;
    Ok(r.rows_affected() > 0)
}
