//! Homepage media managed from the admin console: hero banners and videos.
//!
//! Files live in object storage; these rows hold their public URLs.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct HeroImage { pub id: Uuid, pub url: String, pub alt_text: Option<String>, pub link: Option<String>, pub position: i32, pub created_at: DateTime<Utc> }

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Video { pub id: Uuid, pub url: String, pub title: Option<String>, pub position: i32, pub created_at: DateTime<Utc> }

pub async fn hero_images(pool: &PgPool) -> Result<Vec<HeroImage>, sqlx::Error> {
    sqlx::query_as::<_, HeroImage>("SELECT id, url, alt_text, link, position, created_at FROM hero_images ORDER BY position, created_at")
        .fetch_all(pool).await
}

pub async fn add_hero_image(pool: &PgPool, url: &str, alt_text: Option<&str>, link: Option<&str>, position: i32) -> Result<HeroImage, sqlx::Error> {
    sqlx::query_as::<_, HeroImage>(
        "INSERT INTO hero_images (id, url, alt_text, link, position, created_at) VALUES ($1, $2, $3, $4, $5, NOW()) \
         RETURNING id, url, alt_text, link, position, created_at",
    )
    .bind(Uuid::now_v7()).bind(url).bind(alt_text).bind(link).bind(position).fetch_one(pool).await
}

pub async fn delete_hero_image(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    Ok(sqlx::query("DELETE FROM hero_images WHERE id = $1").bind(id).execute(pool).await?.rows_affected() > 0)
}

pub async fn videos(pool: &PgPool) -> Result<Vec<Video>, sqlx::Error> {
    sqlx::query_as::<_, Video>("SELECT id, url, title, position, created_at FROM videos ORDER BY position, created_at").fetch_all(pool).await
}

pub async fn add_video(pool: &PgPool, url: &str, title: Option<&str>, position: i32) -> Result<Video, sqlx::Error> {
    sqlx::query_as::<_, Video>(
        "INSERT INTO videos (id, url, title, position, created_at) VALUES ($1, $2, $3, $4, NOW()) RETURNING id, url, title, position, created_at",
    )
    .bind(Uuid::now_v7()).bind(url).bind(title).bind(position).fetch_one(pool).await
}

pub async fn delete_video(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    Ok(sqlx::query("DELETE FROM videos WHERE id = $1").bind(id).execute(pool).await?.rows_affected() > 0)
}
