//! Sentiment Pricing Auth Service
//! Mission: Register users, issue bearer tokens, gate endpoints by role

use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use sentiment_auth::{
    auth::{open_user_store, AuthState, JwtHandler, PasswordHasher, UserStore},
    build_router, AppConfig,
};
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize environment and logging
    load_env();
    init_tracing();

    let config = AppConfig::parse();
    config.validate()?;

    info!("🚀 Sentiment Pricing Auth Service starting ({:?})", config.environment);

    let jwt_secret = config.signing_secret()?;
    let jwt_handler = Arc::new(JwtHandler::with_ttl(
        jwt_secret.as_bytes(),
        config.token_ttl()?,
    ));
    info!(
        "🔑 Tokens: HS256, lifetime {} minutes",
        config.token_ttl_minutes
    );

    let user_store: Arc<dyn UserStore> = Arc::from(
        open_user_store(&config.database_url)
            .with_context(|| format!("Failed to open user store '{}'", config.database_url))?,
    );
    let password_hasher = Arc::new(PasswordHasher::new(config.bcrypt_cost));
    info!("🔐 bcrypt cost {}", password_hasher.cost());

    let auth_state = AuthState::new(user_store, jwt_handler, password_hasher)
        .context("Failed to initialize auth state")?;

    let app = build_router(auth_state);

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("🎯 API server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("👋 Server stopped");
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sentiment_auth=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_env() {
    // 1) Standard dotenv search (cwd + parents)
    let _ = dotenv();

    // 2) Also try the crate directory (common when running with --manifest-path from elsewhere)
    let env_file = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    if env_file.exists() {
        let _ = dotenv::from_path(&env_file);
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("🛑 Shutdown signal received");
}
