//! JWT Token Handler
//! Mission: Issue and validate HS256-signed, time-bounded bearer tokens

use crate::auth::models::{Claims, TokenSubject};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use tracing::debug;

/// Default token lifetime
pub const DEFAULT_TOKEN_TTL_MINUTES: i64 = 60;

/// The only accepted signature algorithm.
const TOKEN_ALGORITHM: Algorithm = Algorithm::HS256;

/// Token issuance / validation failures
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token lifetime must be positive")]
    NonPositiveTtl,
    #[error("failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
    #[error("invalid or expired token: {0}")]
    Invalid(#[source] jsonwebtoken::errors::Error),
}

/// JWT Handler for token operations
pub struct JwtHandler {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl JwtHandler {
    /// Create a handler with the default 60 minute lifetime
    pub fn new(secret: &[u8]) -> Self {
        Self::with_ttl(secret, Duration::minutes(DEFAULT_TOKEN_TTL_MINUTES))
    }

    pub fn with_ttl(secret: &[u8], ttl: Duration) -> Self {
        let mut validation = Validation::new(TOKEN_ALGORITHM);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token with the configured lifetime
    pub fn issue(&self, subject: &TokenSubject) -> Result<String, TokenError> {
        self.issue_with_ttl(subject, self.ttl)
    }

    /// Issue a token expiring `ttl` from now
    pub fn issue_with_ttl(
        &self,
        subject: &TokenSubject,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        if ttl <= Duration::zero() {
            return Err(TokenError::NonPositiveTtl);
        }

        let now = Utc::now().timestamp();
        let claims = Claims {
            email: subject.email.clone(),
            role: subject.role,
            iat: now,
            exp: now + ttl.num_seconds().max(1),
        };

        debug!(
            "Issuing JWT for {} ({}), expires in {}s",
            claims.email,
            claims.role,
            claims.exp - now
        );

        encode(&Header::new(TOKEN_ALGORITHM), &claims, &self.encoding_key)
            .map_err(TokenError::Signing)
    }

    /// Validate signature, algorithm and expiry; return the claims only if all pass
    pub fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        let decoded = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(TokenError::Invalid)?;

        debug!("Validated JWT for {}", decoded.claims.email);

        Ok(decoded.claims)
    }
}
