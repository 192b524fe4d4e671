use sea_orm::{ConnectOptions, Database};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use jewelry_store::{
    build_app,
    config::Config,
    entities::{bootstrap_admin, setup_schema},
    services::{email::EmailService, paypal::PayPalClient},
    state::AppState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    let mut options = ConnectOptions::new(config.database_url.clone());
    options.sqlx_logging(false);
    let db = Database::connect(options).await?;
    setup_schema(&db).await?;

    if let Some(admin) = &config.bootstrap_admin {
        bootstrap_admin(&db, admin).await?;
    }

    let mut state = AppState::new(db, config.clone());
    match &config.smtp {
        Some(smtp) => state = state.with_mailer(EmailService::new(smtp)?),
        None => warn!("SMTP is not configured, emails will only be logged"),
    }
    match &config.paypal {
        Some(paypal) => state = state.with_paypal(PayPalClient::new(paypal.clone())),
        None => warn!("PayPal is not configured, payment endpoints will answer 503"),
    }

    tokio::fs::create_dir_all(&config.upload_dir).await?;

    let app = build_app(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "Listening");
    axum::serve(listener, app).await?;

    Ok(())
}
