//! Storefront API server.

use anyhow::Result;
use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront_api::{
    domain::events::EventPublisher, payments::RazorpayClient, shipping::ShiprocketClient, AppState, Config,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let db = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(config.database_url.expose_secret())
        .await?;
    sqlx::migrate!("./migrations").run(&db).await?;

    let nats = match &config.nats_url {
        Some(url) => match async_nats::connect(url).await {
            Ok(client) => Some(client),
            Err(e) => {
                tracing::warn!(error = %e, "NATS unavailable, events will not be published");
                None
            }
        },
        None => None,
    };
    if config.razorpay.webhook_secret.is_none() {
        tracing::warn!("RAZORPAY_WEBHOOK_SECRET not set, webhook deliveries will be rejected");
    }

    let razorpay = RazorpayClient::new(&config.razorpay)?;
    let shiprocket = ShiprocketClient::new(&config.shiprocket)?;
    let port = config.port;
    let state = AppState::new(config, db, razorpay, shiprocket, EventPublisher::new(nats));
    let app = storefront_api::app(state);

    tracing::info!("storefront-api listening on 0.0.0.0:{}", port);
    axum::serve(tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?, app).await?;
    Ok(())
}
