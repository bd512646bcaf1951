//! Shiprocket REST client.
//!
//! Covers the three calls the storefront needs: token login, courier
//! serviceability between two pincodes, and ad-hoc order creation once an
//! order has been paid for.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::instrument;

use crate::config::ShiprocketConfig;
use crate::domain::aggregates::{Order, Shipment};
use crate::domain::value_objects::Pincode;

pub const DEFAULT_BASE_URL: &str = "https://apiv2.shiprocket.in";

/// Tokens are valid for ten days; renew a day early.
const TOKEN_LIFETIME: Duration = Duration::from_secs(9 * 24 * 60 * 60);

/// Default parcel for a single apparel order.
const PARCEL_WEIGHT_KG: Decimal = Decimal::from_parts(5, 0, 0, false, 1);
const PARCEL_DIMENSIONS_CM: (u32, u32, u32) = (30, 25, 3);

/// Billed weight for a parcel holding `items` garments.
pub fn parcel_weight(items: u32) -> Decimal { PARCEL_WEIGHT_KG * Decimal::from(items.max(1)) }

#[derive(Debug, Error)]
pub enum ShiprocketError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),
    #[error("Shiprocket rejected the request ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

#[derive(Clone)]
pub struct ShiprocketClient {
    inner: Arc<ShiprocketClientInner>,
}

struct ShiprocketClientInner {
    client: reqwest::Client,
    base_url: String,
    email: String,
    password: SecretString,
    pickup_postcode: Pincode,
    pickup_location: String,
    token: RwLock<Option<CachedToken>>,
}

#[derive(Clone)]
struct CachedToken { token: String, obtained_at: Instant }

impl CachedToken {
    fn is_fresh(&self) -> bool { self.obtained_at.elapsed() < TOKEN_LIFETIME }
}

#[derive(Debug, Deserialize)]
struct LoginResponse { token: Option<String>, message: Option<String> }

#[derive(Debug, Deserialize)]
struct ServiceabilityResponse { data: Option<ServiceabilityData> }

#[derive(Debug, Deserialize)]
struct ServiceabilityData {
    #[serde(default)]
    available_courier_companies: Vec<RawCourier>,
}

#[derive(Debug, Deserialize)]
struct RawCourier {
    courier_company_id: Option<i64>,
    courier_name: String,
    rate: Decimal,
    #[serde(default)]
    estimated_delivery_days: Option<serde_json::Value>,
    #[serde(default)]
    etd: Option<String>,
    #[serde(default)]
    cod: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourierOption {
    pub courier_id: Option<i64>,
    pub name: String,
    pub rate: Decimal,
    pub estimated_days: Option<u32>,
    pub etd: Option<String>,
    pub cod_available: bool,
    pub recommended: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Serviceability {
    pub serviceable: bool,
    pub couriers: Vec<CourierOption>,
}

impl Serviceability {
    fn from_raw(raw: Vec<RawCourier>) -> Self {
        let mut couriers: Vec<CourierOption> = raw.into_iter().map(|c| CourierOption {
            courier_id: c.courier_company_id,
            name: c.courier_name,
            rate: c.rate,
            estimated_days: c.estimated_delivery_days.as_ref().and_then(|v| match v {
                serde_json::Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
                serde_json::Value::String(s) => s.trim().parse().ok(),
                _ => None,
            }),
            etd: c.etd,
            cod_available: c.cod == Some(1),
            recommended: false,
        }).collect();
        couriers.sort_by(|a, b| a.rate.cmp(&b.rate).then_with(|| a.estimated_days.cmp(&b.estimated_days)));
        if let Some(first) = couriers.first_mut() { first.recommended = true; }
        Self { serviceable: !couriers.is_empty(), couriers }
    }

    pub fn cheapest(&self) -> Option<&CourierOption> { self.couriers.first() }
}

/// Body of `POST /v1/external/orders/create/adhoc`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AdhocOrder {
    pub order_id: String,
    pub order_date: String,
    pub pickup_location: String,
    pub billing_customer_name: String,
    pub billing_last_name: String,
    pub billing_address: String,
    pub billing_address_2: String,
    pub billing_city: String,
    pub billing_pincode: String,
    pub billing_state: String,
    pub billing_country: String,
    pub billing_email: String,
    pub billing_phone: String,
    pub shipping_is_billing: bool,
    pub order_items: Vec<AdhocItem>,
    pub payment_method: String,
    pub shipping_charges: Decimal,
    pub total_discount: Decimal,
    pub sub_total: Decimal,
    pub length: u32,
    pub breadth: u32,
    pub height: u32,
    pub weight: Decimal,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AdhocItem { pub name: String, pub sku: String, pub units: u32, pub selling_price: Decimal }

impl AdhocOrder {
    pub fn from_order(order: &Order, pickup_location: &str, now: DateTime<Utc>) -> Self {
        let addr = order.address();
        let (first, last) = match addr.name.trim().split_once(' ') {
            Some((f, l)) => (f.to_string(), l.trim().to_string()),
            None => (addr.name.trim().to_string(), String::new()),
        };
        let totals = order.totals();
        let (length, breadth, height) = PARCEL_DIMENSIONS_CM;
        Self {
            order_id: order.display_order_id().to_string(),
            order_date: now.format("%Y-%m-%d %H:%M").to_string(),
            pickup_location: pickup_location.to_string(),
            billing_customer_name: first,
            billing_last_name: last,
            billing_address: addr.line1.clone(),
            billing_address_2: addr.line2.clone().unwrap_or_default(),
            billing_city: addr.city.clone(),
            billing_pincode: addr.pincode.clone(),
            billing_state: addr.state.clone(),
            billing_country: addr.country.clone(),
            billing_email: addr.email.clone(),
            billing_phone: addr.phone.clone(),
            shipping_is_billing: true,
            order_items: order.lines().iter().map(|l| AdhocItem {
                name: format!("{} ({})", l.product_name, l.size),
                sku: format!("{}-{}", l.product_id.simple(), l.size),
                units: l.quantity,
                selling_price: l.unit_price,
            }).collect(),
            payment_method: "Prepaid".to_string(),
            shipping_charges: totals.shipping,
            total_discount: totals.discount + Decimal::from(totals.points_redeemed),
            sub_total: totals.subtotal,
            length, breadth, height,
            weight: parcel_weight(order.item_count()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AdhocResponse {
    order_id: Option<serde_json::Value>,
    shipment_id: Option<serde_json::Value>,
    #[serde(default)]
    awb_code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

fn id_string(v: Option<serde_json::Value>) -> Option<String> {
    match v? {
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::String(s) if !s.is_empty() => Some(s),
        _ => None,
    }
}

impl ShiprocketClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &ShiprocketConfig) -> Result<Self, ShiprocketError> {
        let client = reqwest::Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            inner: Arc::new(ShiprocketClientInner {
                client,
                base_url: config.base_url.trim_end_matches('/').to_string(),
                email: config.email.clone(),
                password: config.password.clone(),
                pickup_postcode: config.pickup_postcode.clone(),
                pickup_location: config.pickup_location.clone(),
                token: RwLock::new(None),
            }),
        })
    }

    #[instrument(skip(self), fields(email = %self.inner.email))]
    async fn login(&self) -> Result<String, ShiprocketError> {
        let response = self.inner.client
            .post(format!("{}/v1/external/auth/login", self.inner.base_url))
            .json(&serde_json::json!({ "email": self.inner.email, "password": self.inner.password.expose_secret() }))
            .send()
            .await?;
        let status = response.status();
        let body: LoginResponse = response.json().await
            .map_err(|e| ShiprocketError::UnexpectedResponse(e.to_string()))?;
        match body.token {
            Some(token) if status.is_success() => Ok(token),
            _ => Err(ShiprocketError::AuthenticationFailed(body.message.unwrap_or_else(|| status.to_string()))),
        }
    }

    async fn token(&self) -> Result<String, ShiprocketError> {
        if let Some(cached) = self.inner.token.read().await.as_ref().filter(|t| t.is_fresh()) {
            return Ok(cached.token.clone());
        }
        let mut slot = self.inner.token.write().await;
        // Another task may have logged in while we waited for the lock.
        if let Some(cached) = slot.as_ref().filter(|t| t.is_fresh()) {
            return Ok(cached.token.clone());
        }
        let token = self.login().await?;
        tracing::info!("obtained shiprocket token");
        *slot = Some(CachedToken { token: token.clone(), obtained_at: Instant::now() });
        Ok(token)
    }

    async fn invalidate_token(&self) { *self.inner.token.write().await = None; }

    /// Sends an authenticated request, logging in again once if the token was rejected.
    async fn send(&self, build: impl Fn(&reqwest::Client, &str) -> reqwest::RequestBuilder) -> Result<reqwest::Response, ShiprocketError> {
        for attempt in 0..2 {
            let token = self.token().await?;
            let response = build(&self.inner.client, &self.inner.base_url).bearer_auth(&token).send().await?;
            if response.status() == reqwest::StatusCode::UNAUTHORIZED && attempt == 0 {
                tracing::warn!("shiprocket token rejected, logging in again");
                self.invalidate_token().await;
                continue;
            }
            return Ok(response);
        }
        Err(ShiprocketError::AuthenticationFailed("token rejected after re-login".into()))
    }

    async fn error_from(response: reqwest::Response) -> ShiprocketError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<serde_json::Value>(&body).ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
            .unwrap_or(body);
        ShiprocketError::Api { status, message }
    }

    /// Couriers able to carry a parcel from the warehouse to `delivery`.
    #[instrument(skip(self))]
    pub async fn serviceability(&self, delivery: &Pincode, weight_kg: Decimal, cod: bool) -> Result<Serviceability, ShiprocketError> {
        let query = [
            ("pickup_postcode", self.inner.pickup_postcode.to_string()),
            ("delivery_postcode", delivery.to_string()),
            ("weight", weight_kg.to_string()),
            ("cod", if cod { "1" } else { "0" }.to_string()),
        ];
        let response = self.send(|c, base| c.get(format!("{base}/v1/external/courier/serviceability/")).query(&query)).await?;
        // Unserviceable routes come back as 404 with a message.
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(Serviceability::from_raw(vec![]));
        }
        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }
        let body: ServiceabilityResponse = response.json().await
            .map_err(|e| ShiprocketError::UnexpectedResponse(e.to_string()))?;
        Ok(Serviceability::from_raw(body.data.map(|d| d.available_courier_companies).unwrap_or_default()))
    }

    /// Registers a paid order with Shiprocket.
    #[instrument(skip(self, order), fields(display_order_id = %order.display_order_id()))]
    pub async fn create_order(&self, order: &Order) -> Result<Shipment, ShiprocketError> {
        let body = AdhocOrder::from_order(order, &self.inner.pickup_location, Utc::now());
        let response = self.send(|c, base| c.post(format!("{base}/v1/external/orders/create/adhoc")).json(&body)).await?;
        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }
        let created: AdhocResponse = response.json().await
            .map_err(|e| ShiprocketError::UnexpectedResponse(e.to_string()))?;
        let shiprocket_order_id = id_string(created.order_id);
        if shiprocket_order_id.is_none() {
            return Err(ShiprocketError::UnexpectedResponse(created.message.unwrap_or_else(|| "no order_id in response".into())));
        }
        tracing::info!(shiprocket_order_id = ?shiprocket_order_id, "created shiprocket order");
        Ok(Shipment {
            shiprocket_order_id,
            shipment_id: id_string(created.shipment_id),
            awb_code: created.awb_code.filter(|a| !a.is_empty()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{OrderKind, OrderLine, ShippingAddress};
    use crate::domain::pricing::Quote;
    use uuid::Uuid;

    #[test]
    fn test_serviceability_sorting() {
        let body = r#"{"status":200,"data":{"available_courier_companies":[
            {"courier_company_id":1,"courier_name":"Slow Post","rate":80.5,"estimated_delivery_days":"6","etd":"Oct 25, 2026","cod":1},
            {"courier_company_id":2,"courier_name":"Fast Air","rate":120,"estimated_delivery_days":2,"cod":0},
            {"courier_company_id":3,"courier_name":"Cheap Ground","rate":65,"estimated_delivery_days":"x"}
        ]}}"#;
        let parsed: ServiceabilityResponse = serde_json::from_str(body).unwrap();
        let s = Serviceability::from_raw(parsed.data.unwrap().available_courier_companies);
        assert!(s.serviceable);
        let names: Vec<_> = s.couriers.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Cheap Ground", "Slow Post", "Fast Air"]);
        assert!(s.couriers[0].recommended);
        assert!(!s.couriers[1].recommended);
        assert_eq!(s.couriers[0].estimated_days, None);
        assert_eq!(s.couriers[1].estimated_days, Some(6));
        assert!(s.couriers[1].cod_available);
        assert_eq!(s.couriers[2].estimated_days, Some(2));
    }

    #[test]
    fn test_unserviceable() {
        let s = Serviceability::from_raw(vec![]);
        assert!(!s.serviceable);
        assert!(s.cheapest().is_none());
    }

    #[test]
    fn test_adhoc_order_payload() {
        let quote = Quote {
            subtotal: Decimal::new(2598, 0), discount: Decimal::new(100, 0), points_redeemed: 50,
            shipping: Decimal::ZERO, total: Decimal::new(2448, 0), points_earned: 0,
        };
        let lines = vec![OrderLine {
            order_id: String::new(), product_id: Uuid::nil(), product_name: "Boxy Tee".into(), size: "M".into(),
            quantity: 2, unit_price: Decimal::new(1299, 0),
        }];
        let address = ShippingAddress {
            name: "Asha Rao Kulkarni".into(), email: "asha@example.com".into(), phone: "9876543210".into(),
            line1: "12 MG Road".into(), line2: None, city: "Bengaluru".into(), state: "Karnataka".into(),
            pincode: "560001".into(), country: "India".into(),
        };
        let order = Order::place("ORD1".into(), "u1", OrderKind::Domestic, lines, &quote, None, address).unwrap();
        let now = DateTime::parse_from_rfc3339("2026-10-19T08:30:00Z").unwrap().with_timezone(&Utc);
        let body = AdhocOrder::from_order(&order, "Primary", now);
        assert_eq!(body.order_id, "ORD1");
        assert_eq!(body.order_date, "2026-10-19 08:30");
        assert_eq!(body.billing_customer_name, "Asha");
        assert_eq!(body.billing_last_name, "Rao Kulkarni");
        assert_eq!(body.total_discount, Decimal::new(150, 0));
        assert_eq!(body.order_items[0].units, 2);
        assert_eq!(body.order_items[0].name, "Boxy Tee (M)");
        assert_eq!(body.weight, Decimal::new(10, 1));
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["payment_method"], "Prepaid");
    }

    #[test]
    fn test_id_string() {
        assert_eq!(id_string(Some(serde_json::json!(12345))), Some("12345".into()));
        assert_eq!(id_string(Some(serde_json::json!("SR-9"))), Some("SR-9".into()));
        assert_eq!(id_string(Some(serde_json::json!(""))), None);
        assert_eq!(id_string(None), None);
    }
}
