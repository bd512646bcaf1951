//! Loyalty points balance and ledger.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::domain::aggregates::OrderError;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointsReason { Earned, Redeemed, Refunded, Revoked, Adjusted }

impl PointsReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Earned => "earned", Self::Redeemed => "redeemed", Self::Refunded => "refunded",
            Self::Revoked => "revoked", Self::Adjusted => "adjusted",
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PointTransaction { pub id: Uuid, pub user_id: String, pub display_order_id: Option<String>, pub delta: i32, pub reason: String, pub created_at: DateTime<Utc> }

pub async fn balance(pool: &PgPool, user_id: &str) -> Result<u32, sqlx::Error> {
    let row: Option<(i32,)> = sqlx::query_as("SELECT balance FROM user_points WHERE user_id = $1").bind(user_id).fetch_optional(pool).await?;
    Ok(row.map_or(0, |r| u32::try_from(r.0).unwrap_or(0)))
}

pub async fn history(pool: &PgPool, user_id: &str, limit: i64) -> Result<Vec<PointTransaction>, sqlx::Error> {
    sqlx::query_as::<_, PointTransaction>(
        "SELECT id, user_id, display_order_id, delta, reason, created_at FROM point_transactions WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2",
    )
    .bind(user_id).bind(limit).fetch_all(pool).await
}

/// Changes a balance by `delta` and records it in the ledger. Balances never go below zero;
/// the ledger records the change actually applied.
pub async fn adjust(conn: &mut PgConnection, user_id: &str, delta: i64, reason: PointsReason, display_order_id: Option<&str>) -> Result<(), sqlx::Error> {
    let delta = i32::try_from(delta).unwrap_or(if delta < 0 { i32::MIN } else { i32::MAX });
    let before: Option<(i32,)> = sqlx::query_as("SELECT balance FROM user_points WHERE user_id = $1 FOR UPDATE")
        .bind(user_id).fetch_optional(&mut *conn).await?;
    let before = before.map_or(0, |r| r.0);
    let after = before.saturating_add(delta).max(0);
    let applied = after - before;
    if applied != delta {
        tracing::warn!(%user_id, requested = delta, applied, "points balance would go negative, clamped");
    }

    sqlx::query(
        "INSERT INTO user_points (user_id, balance, updated_at) VALUES ($1, $2, NOW()) \
         ON CONFLICT (user_id) DO UPDATE SET balance = EXCLUDED.balance, updated_at = NOW()",
    )
    .bind(user_id).bind(after).execute(&mut *conn).await?;

    if applied != 0 {
        sqlx::query("INSERT INTO point_transactions (id, user_id, display_order_id, delta, reason, created_at) VALUES ($1, $2, $3, $4, $5, NOW())")
            .bind(Uuid::now_v7()).bind(user_id).bind(display_order_id).bind(applied).bind(reason.as_str())
            .execute(&mut *conn).await?;
    }
    Ok(())
}

/// Spends `points` for an order. Unlike `adjust`, a short balance is an error and nothing is written.
pub async fn redeem(conn: &mut PgConnection, user_id: &str, points: u32, display_order_id: &str) -> Result<(), AppError> {
    let row: Option<(i32,)> = sqlx::query_as("SELECT balance FROM user_points WHERE user_id = $1 FOR UPDATE")
        .bind(user_id).fetch_optional(&mut *conn).await?;
    let available = row.map_or(0, |r| u32::try_from(r.0).unwrap_or(0));
    if available < points {
        return Err(OrderError::InsufficientPoints { available, requested: points }.into());
    }
    adjust(conn, user_id, -i64::from(points), PointsReason::Redeemed, Some(display_order_id)).await?;
    Ok(())
}
