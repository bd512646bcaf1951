//! Unified error handling for the HTTP layer.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::domain::aggregates::{OrderError, ProductError};
use crate::domain::promo::PromoError;
use crate::domain::value_objects::{MoneyError, StockError};
use crate::payments::razorpay::RazorpayError;
use crate::shipping::shiprocket::ShiprocketError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Promo(#[from] PromoError),

    #[error(transparent)]
    Stock(#[from] StockError),

    #[error("Payment provider error: {0}")]
    Razorpay(#[from] RazorpayError),

    #[error("Shipping provider error: {0}")]
    Shiprocket(#[from] ShiprocketError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl From<ProductError> for AppError {
    fn from(e: ProductError) -> Self {
        match e {
            ProductError::Stock(s) => Self::Stock(s),
            other => Self::BadRequest(other.to_string()),
        }
    }
}

impl From<MoneyError> for AppError {
    fn from(e: MoneyError) -> Self { Self::BadRequest(e.to_string()) }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(e: validator::ValidationErrors) -> Self { Self::BadRequest(e.to_string()) }
}

impl AppError {
    /// Unique-constraint violations become `Conflict`, anything else stays a database error.
    pub fn from_insert(e: sqlx::Error, what: impl Into<String>) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => Self::Conflict(format!("{} already exists", what.into())),
            _ => Self::Database(e),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Razorpay(RazorpayError::InvalidSignature) => StatusCode::UNAUTHORIZED,
            Self::Razorpay(RazorpayError::WebhookNotConfigured) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Razorpay(_) | Self::Shiprocket(_) => StatusCode::BAD_GATEWAY,
            Self::Order(OrderError::AlreadyInStatus(_) | OrderError::IllegalTransition { .. } | OrderError::NotExchangeable(_) | OrderError::NotShippable(_) | OrderError::InsufficientPoints { .. }) => StatusCode::CONFLICT,
            Self::Order(OrderError::MissingCanonicalRow(_) | OrderError::DuplicateCanonicalRow(_) | OrderError::MixedRows | OrderError::UnknownStatus(_) | OrderError::UnknownKind(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Order(_) | Self::Promo(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Stock(StockError::Insufficient { .. }) | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Stock(StockError::UnknownSize(_)) => StatusCode::BAD_REQUEST,
            Self::Stock(StockError::Malformed(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else if status == StatusCode::BAD_GATEWAY {
            tracing::warn!(error = %self, "upstream provider failed");
        }

        // Internal details stay in the logs.
        let message = match status {
            StatusCode::INTERNAL_SERVER_ERROR => "Internal server error".to_string(),
            StatusCode::BAD_GATEWAY => "External service error".to_string(),
            _ => self.to_string(),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::OrderStatus;

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::from(PromoError::Expired).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::from(OrderError::IllegalTransition { from: OrderStatus::Delivered, to: OrderStatus::Cancelled }).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(AppError::from(OrderError::InsufficientPoints { available: 10, requested: 50 }).status(), StatusCode::CONFLICT);
        assert_eq!(AppError::from(RazorpayError::InvalidSignature).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::from(StockError::Insufficient { size: "M".into(), available: 0, requested: 1 }).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(AppError::from(ProductError::MissingName).status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_internal_details_hidden() {
        let response = AppError::from(sqlx::Error::PoolTimedOut).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let response = AppError::BadRequest("quantity must be positive".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
