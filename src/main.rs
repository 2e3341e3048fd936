//! Ayurvedic Store - storefront and admin API server

use anyhow::{Context, Result};
use ayurvedic_store::db;
use ayurvedic_store::services::{AuthService, EventPublisher};
use ayurvedic_store::{routes, AppConfig, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env().context("loading configuration")?;
    let pool = db::create_pool(&config.database_url).await.context("connecting to database")?;
    db::migrate(&pool).await.context("running migrations")?;

    if let Some(admin) = &config.bootstrap_admin {
        AuthService::new(&pool).ensure_admin(admin).await.context("creating bootstrap admin")?;
    }

    let events = EventPublisher::connect(config.nats_url.as_deref()).await;
    let addr = config.socket_addr();
    let app = routes::router(AppState::new(config, pool, events));

    tracing::info!(%addr, "Ayurvedic store listening");
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
    Ok(())
}
