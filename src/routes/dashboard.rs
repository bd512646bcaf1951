//! Admin dashboard charts.

use std::collections::BTreeMap;

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::dashboard::{self, DailySales, ProductSales};
use crate::db;
use crate::error::AppResult;
use crate::state::AppState;

const DEFAULT_DAYS: u32 = 30;
const MAX_DAYS: u32 = 365;

#[derive(Debug, Deserialize)]
pub struct DashboardParams { pub days: Option<u32>, pub limit: Option<usize> }

impl DashboardParams {
    fn days(&self) -> u32 { self.days.unwrap_or(DEFAULT_DAYS).clamp(1, MAX_DAYS) }
}

#[derive(Debug, Serialize)]
pub struct SalesResponse { pub days: Vec<DailySales>, pub statuses: BTreeMap<&'static str, u32> }

pub async fn sales(State(s): State<AppState>, Query(p): Query<DashboardParams>) -> AppResult<Json<SalesResponse>> {
    let rows = db::orders::rows_since(s.pool(), Utc::now() - Duration::days(i64::from(p.days()))).await?;
    Ok(Json(SalesResponse { days: dashboard::sales_by_day(&rows), statuses: dashboard::status_breakdown(&rows) }))
}

pub async fn products(State(s): State<AppState>, Query(p): Query<DashboardParams>) -> AppResult<Json<Vec<ProductSales>>> {
    let rows = db::orders::rows_since(s.pool(), Utc::now() - Duration::days(i64::from(p.days()))).await?;
    Ok(Json(dashboard::top_products(&rows, p.limit.unwrap_or(10).clamp(1, 50))))
}
