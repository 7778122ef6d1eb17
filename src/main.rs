use std::sync::Arc;

use dotenvy::dotenv;
use tracing_subscriber::EnvFilter;

use bookserver::api_router::configure_api_routes;
use bookserver::billing::stripe_integration::StripeClient;
use bookserver::config::AppConfig;
use bookserver::shared::state::AppState;
use bookserver::shared::utils::create_conn;
use bookserver::store::PgStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env();
    let pool = create_conn(&config.database_url())?;
    let store = Arc::new(PgStore::new(pool.clone()));
    let stripe = StripeClient::new(
        config.stripe.secret_key.clone(),
        config.stripe.webhook_secret.clone(),
    );

    if !stripe.is_configured() {
        tracing::warn!("STRIPE_SECRET_KEY is not set; checkout endpoints will fail");
    }
    if config.admin_token.is_empty() {
        tracing::warn!("ADMIN_API_TOKEN is not set; admin endpoints will reject all requests");
    }

    let state = Arc::new(AppState {
        conn: pool,
        store,
        stripe,
        config: config.clone(),
    });

    let app = configure_api_routes(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("listening on {addr}");
    axum::serve(listener, app).await?;

    Ok(())
}
