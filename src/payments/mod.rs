//! Payment gateway integration.
pub mod razorpay;

pub use razorpay::{RazorpayClient, RazorpayError, RazorpayOrder, WebhookEvent};
