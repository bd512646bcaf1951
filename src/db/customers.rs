//! Wishlists, newsletter subscribers and back-in-stock requests.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct WishlistEntry { pub product_id: Uuid, pub name: String, pub price: Decimal, pub images: Vec<String>, pub added_at: DateTime<Utc> }

pub async fn wishlist(pool: &PgPool, user_id: &str) -> Result<Vec<WishlistEntry>, sqlx::Error> {
    sqlx::query_as::<_, WishlistEntry>(
        "SELECT w.product_id, p.name, p.price, p.images, w.created_at AS added_at FROM wishlists w \
         JOIN products p ON p.id = w.product_id WHERE w.user_id = $1 AND p.status = 'active' ORDER BY w.created_at DESC",
    )
    .bind(user_id).fetch_all(pool).await
}

/// Adding a product twice is a no-op. Returns whether a row was created.
pub async fn add_to_wishlist(pool: &PgPool, user_id: &str, product_id: Uuid) -> Result<bool, sqlx::Error> {
    let r = sqlx::query("INSERT INTO wishlists (user_id, product_id, created_at) VALUES ($1, $2, NOW()) ON CONFLICT DO NOTHING")
        .bind(user_id).bind(product_id).execute(pool).await?;
    Ok(r.rows_affected() > 0)
}

pub async fn remove_from_wishlist(pool: &PgPool, user_id: &str, product_id: Uuid) -> Result<bool, sqlx::Error> {
    let r = sqlx::query("DELETE FROM wishlists WHERE user_id = $1 AND product_id = $2").bind(user_id).bind(product_id).execute(pool).await?;
    Ok(r.rows_affected() > 0)
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Subscriber { pub id: Uuid, pub email: String, pub created_at: DateTime<Utc> }

/// Subscribes an email, returning the existing row if it is already subscribed.
pub async fn subscribe(pool: &PgPool, email: &str) -> Result<Subscriber, sqlx::Error> {
    let email = email.trim().to_lowercase();
    sqlx::query_as::<_, Subscriber>(
        "INSERT INTO subscribers (id, email, created_at) VALUES ($1, $2, NOW()) \
         ON CONFLICT (email) DO UPDATE SET email = EXCLUDED.email RETURNING id, email, created_at",
    )
    .bind(Uuid::now_v7()).bind(&email).fetch_one(pool).await
}

pub async fn subscribers(pool: &PgPool, limit: i64, offset: i64) -> Result<(Vec<Subscriber>, i64), sqlx::Error> {
    let rows = sqlx::query_as::<_, Subscriber>("SELECT id, email, created_at FROM subscribers ORDER BY created_at DESC LIMIT $1 OFFSET $2")
        .bind(limit).bind(offset).fetch_all(pool).await?;
    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM subscribers").fetch_one(pool).await?;
    Ok((rows, total.0))
}

pub async fn unsubscribe(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    Ok(sqlx::query("DELETE FROM subscribers WHERE id = $1").bind(id).execute(pool).await?.rows_affected() > 0)
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SizeNotification {
    pub id: Uuid, pub product_id: Uuid, pub product_name: String, pub size: String, pub email: String,
    pub notified_at: Option<DateTime<Utc>>, pub created_at: DateTime<Utc>,
}

pub async fn request_size_notification(pool: &PgPool, product_id: Uuid, size: &str, email: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO size_notifications (id, product_id, size, email, created_at) VALUES ($1, $2, $3, $4, NOW()) \
         ON CONFLICT (product_id, size, email) DO UPDATE SET notified_at = NULL",
    )
    .bind(Uuid::now_v7()).bind(product_id).bind(size).bind(email.trim().to_lowercase()).execute(pool).await?;
    Ok(())
}

pub async fn size_notifications(pool: &PgPool, pending_only: bool) -> Result<Vec<SizeNotification>, sqlx::Error> {
    sqlx::query_as::<_, SizeNotification>(
        "SELECT n.id, n.product_id, p.name AS product_name, n.size, n.email, n.notified_at, n.created_at \
         FROM size_notifications n JOIN products p ON p.id = n.product_id \
         WHERE NOT $1 OR n.notified_at IS NULL ORDER BY n.created_at",
    )
    .bind(pending_only).fetch_all(pool).await
}

/// Marks pending requests for a size as notified. Returns the emails to contact.
pub async fn mark_size_notified(pool: &PgPool, product_id: Uuid, size: &str) -> Result<Vec<String>, sqlx::Error> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "UPDATE size_notifications SET notified_at = NOW() WHERE product_id = $1 AND size = $2 AND notified_at IS NULL RETURNING email",
    )
    .bind(product_id).bind(size).fetch_all(pool).await?;
    Ok(rows.into_iter().map(|r| r.0).collect())
}
