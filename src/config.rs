//! Service configuration
//!
//! Every setting can come from a flag or from the environment (after `.env` is
//! loaded). The signing secret has no shippable default: outside production a
//! development secret is substituted with a warning, in production startup fails.

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use tracing::warn;

/// Substituted when no secret is configured outside production.
pub const DEV_JWT_SECRET: &str = "dev-secret-change-in-production-minimum-32-characters";

/// HS256 keys shorter than the hash output are weak.
pub const MIN_SECRET_BYTES: usize = 32;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

/// Sentiment pricing authentication service
#[derive(Parser, Debug, Clone)]
#[command(name = "sentiment-auth")]
#[command(about = "Registers users, issues JWTs and gates endpoints by role")]
pub struct AppConfig {
    /// Address the HTTP server listens on
    #[arg(long, env = "AUTH_BIND_ADDR", default_value = "0.0.0.0:8000")]
    pub bind_addr: SocketAddr,

    /// HMAC-SHA256 signing secret for access tokens
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    /// Access token lifetime in minutes
    #[arg(long, env = "ACCESS_TOKEN_EXPIRE_MINUTES", default_value = "60")]
    pub token_ttl_minutes: i64,

    /// User storage: `sqlite://path`, `json://path`, or a plain path (.db/.sqlite selects SQLite)
    #[arg(long, env = "DATABASE_URL", default_value = "users.json")]
    pub database_url: String,

    /// bcrypt work factor (4-31)
    #[arg(long, env = "BCRYPT_COST", default_value_t = bcrypt::DEFAULT_COST)]
    pub bcrypt_cost: u32,

    /// Deployment profile; production refuses to start without a real secret
    #[arg(long, env = "APP_ENV", value_enum, default_value = "development")]
    pub environment: Environment,
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        if self.token_ttl_minutes <= 0 {
            bail!(
                "ACCESS_TOKEN_EXPIRE_MINUTES must be positive (got {})",
                self.token_ttl_minutes
            );
        }
        if chrono::Duration::try_minutes(self.token_ttl_minutes).is_none() {
            bail!(
                "ACCESS_TOKEN_EXPIRE_MINUTES is too large (got {})",
                self.token_ttl_minutes
            );
        }
        if !(4..=31).contains(&self.bcrypt_cost) {
            bail!("BCRYPT_COST must be between 4 and 31 (got {})", self.bcrypt_cost);
        }
        if self.database_url.trim().is_empty() {
            bail!("DATABASE_URL must not be empty");
        }
        Ok(())
    }

    pub fn token_ttl(&self) -> Result<chrono::Duration> {
        chrono::Duration::try_minutes(self.token_ttl_minutes).with_context(|| {
            format!(
                "ACCESS_TOKEN_EXPIRE_MINUTES out of range (got {})",
                self.token_ttl_minutes
            )
        })
    }

    /// Resolve the signing secret, refusing the development default in production.
    pub fn signing_secret(&self) -> Result<String> {
        let configured = self
            .jwt_secret
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty() && *s != DEV_JWT_SECRET);

        let Some(secret) = configured else {
            if self.environment == Environment::Production {
                bail!("JWT_SECRET must be set to a non-default value when APP_ENV=production");
            }
            warn!("⚠️  JWT_SECRET not set - using the built-in development secret");
            warn!("⚠️  Anyone with this source can forge tokens. SET JWT_SECRET IN PRODUCTION!");
            return Ok(DEV_JWT_SECRET.to_string());
        };

        if secret.len() < MIN_SECRET_BYTES {
            warn!(
                "⚠️  JWT_SECRET is only {} bytes; use at least {}",
                secret.len(),
                MIN_SECRET_BYTES
            );
        }

        Ok(secret.to_string())
    }
}
