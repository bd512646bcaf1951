//! Homepage hero banners and videos.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::db::{self, content::{HeroImage, Video}};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub async fn list_hero_images(State(s): State<AppState>) -> AppResult<Json<Vec<HeroImage>>> {
    Ok(Json(db::content::hero_images(s.pool()).await?))
}

pub async fn list_videos(State(s): State<AppState>) -> AppResult<Json<Vec<Video>>> {
    Ok(Json(db::content::videos(s.pool()).await?))
}

#[derive(Debug, Deserialize, Validate)]
pub struct HeroImageRequest {
    #[validate(url)]
    pub url: String,
    pub alt_text: Option<String>,
    pub link: Option<String>,
    #[serde(default)]
    pub position: i32,
}

pub async fn add_hero_image(State(s): State<AppState>, Json(r): Json<HeroImageRequest>) -> AppResult<(StatusCode, Json<HeroImage>)> {
    r.validate()?;
    let image = db::content::add_hero_image(s.pool(), &r.url, r.alt_text.as_deref(), r.link.as_deref(), r.position).await?;
    Ok((StatusCode::CREATED, Json(image)))
}

pub async fn delete_hero_image(State(s): State<AppState>, Path(id): Path<Uuid>) -> AppResult<StatusCode> {
    if !db::content::delete_hero_image(s.pool(), id).await? {
        return Err(AppError::NotFound(format!("hero image {id}")));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize, Validate)]
pub struct VideoRequest {
    #[validate(url)]
    pub url: String,
    pub title: Option<String>,
    #[serde(default)]
    pub position: i32,
}

pub async fn add_video(State(s): State<AppState>, Json(r): Json<VideoRequest>) -> AppResult<(StatusCode, Json<Video>)> {
    r.validate()?;
    Ok((StatusCode::CREATED, Json(db::content::add_video(s.pool(), &r.url, r.title.as_deref(), r.position).await?)))
}

pub async fn delete_video(State(s): State<AppState>, Path(id): Path<Uuid>) -> AppResult<StatusCode> {
    if !db::content::delete_video(s.pool(), id).await? {
        return Err(AppError::NotFound(format!("video {id}")));
    }
    Ok(StatusCode::NO_CONTENT)
}
