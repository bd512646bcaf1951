//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::domain::events::EventPublisher;
use crate::domain::pricing::PricingRules;
use crate::payments::RazorpayClient;
use crate::shipping::ShiprocketClient;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    pool: PgPool,
    razorpay: RazorpayClient,
    shiprocket: ShiprocketClient,
    events: EventPublisher,
}

impl AppState {
    pub fn new(config: Config, pool: PgPool, razorpay: RazorpayClient, shiprocket: ShiprocketClient, events: EventPublisher) -> Self {
        Self { inner: Arc::new(AppStateInner { config, pool, razorpay, shiprocket, events }) }
    }

    pub fn config(&self) -> &Config { &self.inner.config }
    pub fn pool(&self) -> &PgPool { &self.inner.pool }
    pub fn razorpay(&self) -> &RazorpayClient { &self.inner.razorpay }
    pub fn shiprocket(&self) -> &ShiprocketClient { &self.inner.shiprocket }
    pub fn events(&self) -> &EventPublisher { &self.inner.events }
    pub fn pricing(&self) -> &PricingRules { &self.inner.config.pricing }
}
