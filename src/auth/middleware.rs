//! Authentication Middleware
//! Mission: Protect API endpoints with JWT validation and exact-match role checks

use crate::auth::{
    api::AuthApiError,
    jwt::JwtHandler,
    models::{Claims, UserRole},
};
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::debug;

/// Terminal outcome of the per-request access check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Allowed(Claims),
    Unauthorized,
    Forbidden,
}

impl AccessDecision {
    pub fn into_result(self) -> Result<Claims, AuthApiError> {
        match self {
            AccessDecision::Allowed(claims) => Ok(claims),
            AccessDecision::Unauthorized => Err(AuthApiError::Unauthorized),
            AccessDecision::Forbidden => Err(AuthApiError::Forbidden),
        }
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Missing or invalid token is an authentication failure
pub fn authenticate(jwt_handler: &JwtHandler, token: Option<&str>) -> Option<Claims> {
    let token = token?;
    match jwt_handler.validate(token) {
        Ok(claims) => Some(claims),
        Err(e) => {
            debug!("Rejected bearer token: {}", e);
            None
        }
    }
}

/// Exact role match; ADMIN does not satisfy a USER requirement or vice versa
pub fn authorize(claims: &Claims, required: UserRole) -> bool {
    claims.role == required
}

/// Run the whole gate for one request
pub fn check_access(
    jwt_handler: &JwtHandler,
    headers: &HeaderMap,
    required: UserRole,
) -> AccessDecision {
    match authenticate(jwt_handler, bearer_token(headers)) {
        None => AccessDecision::Unauthorized,
        Some(claims) if authorize(&claims, required) => AccessDecision::Allowed(claims),
        Some(_) => AccessDecision::Forbidden,
    }
}

/// Endpoint guard state: who validates tokens and which role is required
#[derive(Clone)]
pub struct RoleGate {
    pub jwt_handler: Arc<JwtHandler>,
    pub required: UserRole,
}

impl RoleGate {
    pub fn new(jwt_handler: Arc<JwtHandler>, required: UserRole) -> Self {
        Self {
            jwt_handler,
            required,
        }
    }
}

/// Middleware that authenticates the bearer token, enforces the role and
/// stores the claims on the request for the handler
pub async fn role_gate(
    State(gate): State<RoleGate>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthApiError> {
    let claims = check_access(&gate.jwt_handler, req.headers(), gate.required).into_result()?;

    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}
