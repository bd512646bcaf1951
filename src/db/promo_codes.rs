//! Promo code storage.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{PgConnection, PgPool};

use crate::domain::promo::{Discount, PromoCode, PromoError};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PromoCodeRow {
    pub code: String, pub discount_type: String, pub discount_value: Decimal, pub min_order_value: Decimal,
    pub max_discount: Option<Decimal>, pub usage_limit: Option<i32>, pub times_used: i32, pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>, pub created_at: DateTime<Utc>,
}

impl TryFrom<PromoCodeRow> for PromoCode {
    type Error = PromoError;
    fn try_from(r: PromoCodeRow) -> Result<Self, Self::Error> {
        let discount = Discount::from_parts(&r.discount_type, r.discount_value)
            .ok_or_else(|| PromoError::InvalidDiscount(format!("unknown discount type {:?}", r.discount_type)))?;
        Ok(PromoCode {
            code: r.code, discount, min_order_value: r.min_order_value, max_discount: r.max_discount,
            usage_limit: r.usage_limit.map(|n| u32::try_from(n).unwrap_or(0)),
            times_used: u32::try_from(r.times_used).unwrap_or(0), active: r.is_active, expires_at: r.expires_at,
        })
    }
}

const COLUMNS: &str = "code, discount_type, discount_value, min_order_value, max_discount, usage_limit, times_used, is_active, expires_at, created_at";

pub async fn list(pool: &PgPool) -> Result<Vec<PromoCodeRow>, sqlx::Error> {
    sqlx::query_as::<_, PromoCodeRow>(&format!("SELECT {COLUMNS} FROM promo_codes ORDER BY created_at DESC")).fetch_all(pool).await
}

pub async fn get(pool: &PgPool, code: &str) -> Result<Option<PromoCodeRow>, sqlx::Error> {
    sqlx::query_as::<_, PromoCodeRow>(&format!("SELECT {COLUMNS} FROM promo_codes WHERE code = $1")).bind(code).fetch_optional(pool).await
}

fn bind_limit(p: &PromoCode) -> Option<i32> { p.usage_limit.map(|n| i32::try_from(n).unwrap_or(i32::MAX)) }

/// Inserts a new code. Returns `None` when the code already exists.
pub async fn insert(pool: &PgPool, p: &PromoCode) -> Result<Option<PromoCodeRow>, sqlx::Error> {
    sqlx::query_as::<_, PromoCodeRow>(&format!(
        "INSERT INTO promo_codes (code, discount_type, discount_value, min_order_value, max_discount, usage_limit, times_used, is_active, expires_at, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, 0, $7, $8, NOW()) ON CONFLICT (code) DO NOTHING RETURNING {COLUMNS}"
    ))
    .bind(&p.code).bind(p.discount.kind()).bind(p.discount.value()).bind(p.min_order_value).bind(p.max_discount)
    .bind(bind_limit(p)).bind(p.active).bind(p.expires_at)
    .fetch_optional(pool).await
}

pub async fn update(pool: &PgPool, p: &PromoCode) -> Result<Option<PromoCodeRow>, sqlx::Error> {
    sqlx::query_as::<_, PromoCodeRow>(&format!(
        "UPDATE promo_codes SET discount_type = $2, discount_value = $3, min_order_value = $4, max_discount = $5, usage_limit = $6, \
         is_active = $7, expires_at = $8 WHERE code = $1 RETURNING {COLUMNS}"
    ))
    .bind(&p.code).bind(p.discount.kind()).bind(p.discount.value()).bind(p.min_order_value).bind(p.max_discount)
    .bind(bind_limit(p)).bind(p.active).bind(p.expires_at)
    .fetch_optional(pool).await
}

pub async fn delete(pool: &PgPool, code: &str) -> Result<bool, sqlx::Error> {
    Ok(sqlx::query("DELETE FROM promo_codes WHERE code = $1").bind(code).execute(pool).await?.rows_affected() > 0)
}

/// Counts one use of a code. Limits are enforced at checkout; by the time payment
/// has been captured the use is recorded even if the limit was reached meanwhile.
pub async fn consume(conn: &mut PgConnection, code: &str) -> Result<(), sqlx::Error> {
    let over: Option<(bool,)> = sqlx::query_as(
        "UPDATE promo_codes SET times_used = times_used + 1 WHERE code = $1 \
         RETURNING usage_limit IS NOT NULL AND times_used > usage_limit",
    )
    .bind(code).fetch_optional(conn).await?;
    match over {
        Some((true,)) => tracing::warn!(%code, "promo code used past its limit"),
        None => tracing::warn!(%code, "consumed promo code no longer exists"),
        Some((false,)) => {}
    }
    Ok(())
}

pub async fn release(conn: &mut PgConnection, code: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE promo_codes SET times_used = GREATEST(times_used - 1, 0) WHERE code = $1").bind(code).execute(conn).await?;
    Ok(())
}
