//! Razorpay payment confirmation: the browser callback and the server webhook.
//!
//! Both paths can report the same payment, in either order and more than once.
//! Confirmation is idempotent: an order that is already paid is returned as is.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use validator::Validate;

use crate::db::{self, StockPolicy, TransitionOutcome};
use crate::domain::aggregates::{Order, OrderError, OrderStatus};
use crate::error::{AppError, AppResult};
use crate::payments::{razorpay::parse_webhook, RazorpayError};
use crate::routes::orders::publish_transition;
use crate::state::AppState;

const SIGNATURE_HEADER: &str = "x-razorpay-signature";

/// Moves the order behind `razorpay_order_id` to `Payment Successful`.
///
/// Money has been captured by now, so oversold sizes are clamped rather than
/// failing the confirmation.
async fn confirm_payment(s: &AppState, razorpay_order_id: &str, payment_id: &str) -> AppResult<Order> {
    let display_order_id = db::orders::display_id_for_payment(s.pool(), razorpay_order_id).await?
        .ok_or_else(|| AppError::NotFound(format!("no order for razorpay order {razorpay_order_id}")))?;
    let outcome = db::orders::transition(s.pool(), &display_order_id, OrderStatus::PaymentSuccessful, StockPolicy::Clamp, |o| {
        o.record_payment(payment_id)
    }).await;

    match outcome {
        Ok(TransitionOutcome::Applied { order, from, product_events }) => {
            tracing::info!(%display_order_id, %payment_id, "payment confirmed");
            publish_transition(s, &order, from, product_events).await;
            Ok(order)
        }
        Ok(TransitionOutcome::Unchanged(order)) => {
            tracing::debug!(%display_order_id, %payment_id, "payment already confirmed");
            Ok(order)
        }
        Err(AppError::Order(OrderError::IllegalTransition { from, .. })) if from != OrderStatus::PaymentPending => {
            // Paid after it was cancelled or moved on: needs a manual refund.
            tracing::error!(%display_order_id, %payment_id, status = %from, "payment captured for an order that is no longer pending");
            db::orders::load(s.pool(), &display_order_id).await?
                .ok_or_else(|| AppError::NotFound(format!("order {display_order_id}")))
        }
        Err(e) => Err(e),
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyPaymentRequest {
    #[validate(length(min = 1))]
    pub razorpay_order_id: String,
    #[validate(length(min = 1))]
    pub razorpay_payment_id: String,
    #[validate(length(min = 1))]
    pub razorpay_signature: String,
}

#[derive(Debug, Serialize)]
pub struct PaymentStatus { pub display_order_id: String, pub status: OrderStatus }

#[instrument(skip(s, r), fields(razorpay_order_id = %r.razorpay_order_id))]
pub async fn verify_payment(State(s): State<AppState>, Json(r): Json<VerifyPaymentRequest>) -> AppResult<Json<PaymentStatus>> {
    r.validate()?;
    s.razorpay().verify_payment_signature(&r.razorpay_order_id, &r.razorpay_payment_id, &r.razorpay_signature)?;
    let order = confirm_payment(&s, &r.razorpay_order_id, &r.razorpay_payment_id).await?;
    Ok(Json(PaymentStatus { display_order_id: order.display_order_id().to_string(), status: order.status() }))
}

/// Razorpay webhook. Anything other than a bad signature or a storage failure is
/// acknowledged with 200 so Razorpay does not keep redelivering it.
#[instrument(skip_all)]
pub async fn webhook(State(s): State<AppState>, headers: HeaderMap, body: Bytes) -> AppResult<StatusCode> {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok())
        .ok_or(RazorpayError::InvalidSignature)?;
    s.razorpay().verify_webhook_signature(&body, signature)?;

    let event = match parse_webhook(&body) {
        Ok(e) => e,
        Err(e) => {
            tracing::warn!(error = %e, "ignoring webhook without a payment");
            return Ok(StatusCode::OK);
        }
    };

    match event.event.as_str() {
        "payment.captured" | "order.paid" => match confirm_payment(&s, &event.order_id, &event.payment_id).await {
            Ok(_) => {}
            Err(AppError::NotFound(msg)) => tracing::warn!(%msg, "webhook for unknown order"),
            Err(e) => return Err(e),
        },
        "payment.failed" => {
            // The customer can retry from the same Razorpay order; the order stays pending.
            tracing::warn!(razorpay_order_id = %event.order_id, payment_id = %event.payment_id, "payment failed");
        }
        other => tracing::debug!(event = %other, "ignoring webhook event"),
    }
    Ok(StatusCode::OK)
}
