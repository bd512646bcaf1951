use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::domain::value_objects::Pincode;
use crate::error::{AppError, AppResult};
use crate::shipping::{shiprocket::parcel_weight, Serviceability};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ServiceabilityParams {
    pub pincode: String,
    /// Garments in the parcel, used to estimate its weight.
    pub items: Option<u32>,
    #[serde(default)]
    pub cod: bool,
}

/// Couriers that can deliver from the warehouse to `pincode`, cheapest first.
pub async fn serviceability(State(s): State<AppState>, Query(p): Query<ServiceabilityParams>) -> AppResult<Json<Serviceability>> {
    let delivery = Pincode::parse(&p.pincode).map_err(|e| AppError::BadRequest(e.to_string()))?;
    let weight = parcel_weight(p.items.unwrap_or(1));
    Ok(Json(s.shiprocket().serviceability(&delivery, weight, p.cod).await?))
}
