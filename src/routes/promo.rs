//! Promo code validation and admin management.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::db::{self, promo_codes::PromoCodeRow};
use crate::domain::promo::{normalize_code, Discount, PromoCode, PromoError};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Loads a code by its customer-entered form.
pub(crate) async fn find(s: &AppState, code: &str) -> AppResult<PromoCode> {
    let row = db::promo_codes::get(s.pool(), &normalize_code(code)).await?.ok_or(PromoError::NotFound)?;
    Ok(PromoCode::try_from(row)?)
}

#[derive(Debug, Deserialize)]
pub struct ValidatePromoRequest { pub code: String, pub subtotal: Decimal }

#[derive(Debug, Serialize)]
pub struct ValidatePromoResponse { pub code: String, pub discount: Decimal, pub discount_type: &'static str, pub discount_value: Decimal }

pub async fn validate_promo(State(s): State<AppState>, Json(r): Json<ValidatePromoRequest>) -> AppResult<Json<ValidatePromoResponse>> {
    let promo = find(&s, &r.code).await?;
    let discount = promo.discount_for(r.subtotal, Utc::now())?;
    Ok(Json(ValidatePromoResponse { code: promo.code, discount, discount_type: promo.discount.kind(), discount_value: promo.discount.value() }))
}

pub async fn list_promo_codes(State(s): State<AppState>) -> AppResult<Json<Vec<PromoCodeRow>>> {
    Ok(Json(db::promo_codes::list(s.pool()).await?))
}

#[derive(Debug, Deserialize)]
pub struct PromoCodeRequest {
    pub code: String,
    pub discount_type: String,
    pub discount_value: Decimal,
    #[serde(default)]
    pub min_order_value: Decimal,
    pub max_discount: Option<Decimal>,
    pub usage_limit: Option<u32>,
    #[serde(default = "active_by_default")]
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

fn active_by_default() -> bool { true }

impl PromoCodeRequest {
    fn into_promo(self) -> Result<PromoCode, PromoError> {
        let discount = Discount::from_parts(&self.discount_type, self.discount_value)
            .ok_or_else(|| PromoError::InvalidDiscount(format!("discount_type must be percent or flat, got {:?}", self.discount_type)))?;
        let promo = PromoCode {
            code: normalize_code(&self.code), discount, min_order_value: self.min_order_value.max(Decimal::ZERO),
            max_discount: self.max_discount, usage_limit: self.usage_limit, times_used: 0, active: self.is_active,
            expires_at: self.expires_at,
        };
        promo.check()?;
        Ok(promo)
    }
}

pub async fn create_promo_code(State(s): State<AppState>, Json(r): Json<PromoCodeRequest>) -> AppResult<(StatusCode, Json<PromoCodeRow>)> {
    let promo = r.into_promo()?;
    let row = db::promo_codes::insert(s.pool(), &promo).await?
        .ok_or_else(|| AppError::Conflict(format!("promo code {} already exists", promo.code)))?;
    tracing::info!(code = %row.code, "promo code created");
    Ok((StatusCode::CREATED, Json(row)))
}

/// The path names the code; a `code` in the body is ignored.
pub async fn update_promo_code(State(s): State<AppState>, Path(code): Path<String>, Json(mut r): Json<PromoCodeRequest>) -> AppResult<Json<PromoCodeRow>> {
    r.code = code;
    let promo = r.into_promo()?;
    let row = db::promo_codes::update(s.pool(), &promo).await?
        .ok_or_else(|| AppError::NotFound(format!("promo code {}", promo.code)))?;
    Ok(Json(row))
}

pub async fn delete_promo_code(State(s): State<AppState>, Path(code): Path<String>) -> AppResult<StatusCode> {
    if !db::promo_codes::delete(s.pool(), &normalize_code(&code)).await? {
        return Err(AppError::NotFound(format!("promo code {code}")));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(kind: &str, value: i64) -> PromoCodeRequest {
        PromoCodeRequest {
            code: " diwali ".into(), discount_type: kind.into(), discount_value: Decimal::new(value, 0),
            min_order_value: Decimal::ZERO, max_discount: None, usage_limit: Some(100), is_active: true, expires_at: None,
        }
    }

    #[test]
    fn test_request_into_promo() {
        let promo = request("percent", 15).into_promo().unwrap();
        assert_eq!(promo.code, "DIWALI");
        assert_eq!(promo.discount, Discount::Percent(Decimal::new(15, 0)));
        assert_eq!(promo.usage_limit, Some(100));
    }

    #[test]
    fn test_request_rejects_bad_discount() {
        assert!(matches!(request("bogo", 1).into_promo(), Err(PromoError::InvalidDiscount(_))));
        assert!(matches!(request("percent", 150).into_promo(), Err(PromoError::InvalidDiscount(_))));
    }
}
