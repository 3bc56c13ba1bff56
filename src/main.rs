use std::sync::Arc;

use anyhow::Context;
use tokio::{net::TcpListener, signal};
use tracing_subscriber::EnvFilter;

use telephony::{
    auth::jwt::JwtService, config::AppConfig, db, routes, state::AppState, store::PgCallStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "server",
        database_url = %config.redacted_database_url(),
        pool_size = config.database_max_pool_size,
        public_base_url = %config.public_base_url,
        signature_validation = config.twilio.auth_token.is_some(),
        "loaded telephony configuration"
    );
    if config.twilio.auth_token.is_none() {
        tracing::warn!("TWILIO_AUTH_TOKEN not set, webhook signatures are not validated");
    }

    let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
    let applied = db::run_migrations(&pool)?;
    if applied > 0 {
        tracing::info!(applied, "database migrations applied");
    }
    let store = Arc::new(PgCallStore::new(pool));
    let jwt = JwtService::from_config(&config)?;
    if !jwt.voice_enabled() {
        tracing::warn!("voice token credentials not set, /api/phone/token is disabled");
    }

    let addr = format!("{}:{}", config.server_host, config.server_port);
    let state = AppState::new(store, config, jwt)?;
    let app = routes::create_router(state);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "telephony server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        return;
    }
    tracing::info!("server received shutdown signal");
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
