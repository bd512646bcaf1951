//! Configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DATABASE_URL` - Postgres connection string of the hosted database
//! - `ADMIN_API_TOKEN` - Bearer token for `/api/v1/admin/*`
//! - `RAZORPAY_KEY_ID`, `RAZORPAY_KEY_SECRET` - Razorpay API credentials
//! - `SHIPROCKET_EMAIL`, `SHIPROCKET_PASSWORD` - Shiprocket API user
//! - `SHIPROCKET_PICKUP_POSTCODE` - Warehouse pincode used for serviceability
//!
//! ## Optional
//! - `PORT` (default: 8083)
//! - `DATABASE_MAX_CONNECTIONS` (default: 10)
//! - `NATS_URL` - enables order event publishing
//! - `RAZORPAY_WEBHOOK_SECRET` - enables `/api/v1/payments/webhook`
//! - `SHIPROCKET_PICKUP_LOCATION` (default: Primary)
//! - `SHIPPING_FLAT_RATE` (default: 99), `FREE_SHIPPING_THRESHOLD` (default: 1499),
//!   `INTERNATIONAL_SHIPPING_RATE` (default: 2500)
//! - `POINTS_EARN_PERCENT` (default: 5)

use std::str::FromStr;

use secrecy::SecretString;
use thiserror::Error;

use crate::domain::pricing::PricingRules;
use crate::domain::value_objects::Pincode;

const MIN_ADMIN_TOKEN_LENGTH: usize = 24;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: SecretString,
    pub database_max_connections: u32,
    pub port: u16,
    pub admin_token: SecretString,
    pub nats_url: Option<String>,
    pub razorpay: RazorpayConfig,
    pub shiprocket: ShiprocketConfig,
    pub pricing: PricingRules,
}

/// Implements `Debug` through `SecretString`, which redacts the secrets.
#[derive(Debug, Clone)]
pub struct RazorpayConfig {
    pub key_id: String,
    pub key_secret: SecretString,
    pub webhook_secret: Option<SecretString>,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct ShiprocketConfig {
    pub email: String,
    pub password: SecretString,
    pub pickup_postcode: Pincode,
    pub pickup_location: String,
    pub base_url: String,
}

impl Config {
    /// Reads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a required variable is missing or a value does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |key: &str| {
            get(key).filter(|v| !v.trim().is_empty()).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
        };
        let optional = |key: &str, default: &str| {
            get(key).filter(|v| !v.trim().is_empty()).unwrap_or_else(|| default.to_string())
        };

        let admin_token = required("ADMIN_API_TOKEN")?;
        if admin_token.len() < MIN_ADMIN_TOKEN_LENGTH {
            return Err(ConfigError::InvalidEnvVar(
                "ADMIN_API_TOKEN".into(),
                format!("must be at least {MIN_ADMIN_TOKEN_LENGTH} characters"),
            ));
        }

        let pickup = required("SHIPROCKET_PICKUP_POSTCODE")?;
        let pickup_postcode = Pincode::parse(&pickup)
            .map_err(|e| ConfigError::InvalidEnvVar("SHIPROCKET_PICKUP_POSTCODE".into(), e.to_string()))?;

        Ok(Self {
            database_url: SecretString::from(required("DATABASE_URL")?),
            database_max_connections: parse_value("DATABASE_MAX_CONNECTIONS", &optional("DATABASE_MAX_CONNECTIONS", "10"))?,
            port: parse_value("PORT", &optional("PORT", "8083"))?,
            admin_token: SecretString::from(admin_token),
            nats_url: get("NATS_URL").filter(|v| !v.trim().is_empty()),
            razorpay: RazorpayConfig {
                key_id: required("RAZORPAY_KEY_ID")?,
                key_secret: SecretString::from(required("RAZORPAY_KEY_SECRET")?),
                webhook_secret: get("RAZORPAY_WEBHOOK_SECRET").filter(|v| !v.trim().is_empty()).map(SecretString::from),
                base_url: optional("RAZORPAY_BASE_URL", crate::payments::razorpay::DEFAULT_BASE_URL),
            },
            shiprocket: ShiprocketConfig {
                email: required("SHIPROCKET_EMAIL")?,
                password: SecretString::from(required("SHIPROCKET_PASSWORD")?),
                pickup_postcode,
                pickup_location: optional("SHIPROCKET_PICKUP_LOCATION", "Primary"),
                base_url: optional("SHIPROCKET_BASE_URL", crate::shipping::shiprocket::DEFAULT_BASE_URL),
            },
            pricing: PricingRules {
                flat_shipping: parse_value("SHIPPING_FLAT_RATE", &optional("SHIPPING_FLAT_RATE", "99"))?,
                free_shipping_threshold: parse_value("FREE_SHIPPING_THRESHOLD", &optional("FREE_SHIPPING_THRESHOLD", "1499"))?,
                international_shipping: parse_value("INTERNATIONAL_SHIPPING_RATE", &optional("INTERNATIONAL_SHIPPING_RATE", "2500"))?,
                points_earn_percent: parse_value("POINTS_EARN_PERCENT", &optional("POINTS_EARN_PERCENT", "5"))?,
            },
        })
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn base() -> HashMap<&'static str, String> {
        HashMap::from([
            ("DATABASE_URL", "postgres://localhost/shop".to_string()),
            ("ADMIN_API_TOKEN", "a".repeat(32)),
            ("RAZORPAY_KEY_ID", "rzp_test_123".to_string()),
            ("RAZORPAY_KEY_SECRET", "rzp-secret".to_string()),
            ("SHIPROCKET_EMAIL", "ops@example.com".to_string()),
            ("SHIPROCKET_PASSWORD", "pw".to_string()),
            ("SHIPROCKET_PICKUP_POSTCODE", "560034".to_string()),
        ])
    }

    fn load(env: &HashMap<&'static str, String>) -> Result<Config, ConfigError> {
        Config::from_lookup(|k| env.get(k).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = load(&base()).unwrap();
        assert_eq!(cfg.port, 8083);
        assert_eq!(cfg.database_max_connections, 10);
        assert_eq!(cfg.pricing, PricingRules::default());
        assert_eq!(cfg.shiprocket.pickup_location, "Primary");
        assert!(cfg.razorpay.webhook_secret.is_none());
        assert_eq!(cfg.razorpay.key_secret.expose_secret(), "rzp-secret");
    }

    #[test]
    fn test_missing_and_invalid() {
        let mut env = base();
        env.remove("RAZORPAY_KEY_ID");
        assert!(matches!(load(&env), Err(ConfigError::MissingEnvVar(k)) if k == "RAZORPAY_KEY_ID"));

        let mut env = base();
        env.insert("PORT", "eighty".into());
        assert!(matches!(load(&env), Err(ConfigError::InvalidEnvVar(k, _)) if k == "PORT"));

        let mut env = base();
        env.insert("ADMIN_API_TOKEN", "short".into());
        assert!(matches!(load(&env), Err(ConfigError::InvalidEnvVar(k, _)) if k == "ADMIN_API_TOKEN"));

        let mut env = base();
        env.insert("SHIPROCKET_PICKUP_POSTCODE", "12".into());
        assert!(matches!(load(&env), Err(ConfigError::InvalidEnvVar(k, _)) if k == "SHIPROCKET_PICKUP_POSTCODE"));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let cfg = load(&base()).unwrap();
        let dbg = format!("{cfg:?}");
        assert!(!dbg.contains("rzp-secret"));
        assert!(!dbg.contains("postgres://localhost/shop"));
    }
}
