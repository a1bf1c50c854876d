//! Authentication API Endpoints
//! Mission: Register, log in, and serve the role-gated data endpoints

use crate::auth::{
    jwt::JwtHandler,
    models::{
        Claims, LoginRequest, LoginResponse, MessageResponse, RegisterRequest,
        TokenSubject, User, UserRole,
    },
    password::PasswordHasher,
    user_store::{StoreError, UserStore},
};
use anyhow::Result;
use axum::{
    extract::{rejection::JsonRejection, FromRequest, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

/// Shared auth state
#[derive(Clone)]
pub struct AuthState {
    pub user_store: Arc<dyn UserStore>,
    pub jwt_handler: Arc<JwtHandler>,
    pub password_hasher: Arc<PasswordHasher>,

    // Verified against when the email is unknown so both login failures cost the same
    dummy_hash: Arc<str>,
}

impl AuthState {
    pub fn new(
        user_store: Arc<dyn UserStore>,
        jwt_handler: Arc<JwtHandler>,
        password_hasher: Arc<PasswordHasher>,
    ) -> Result<Self> {
        let dummy_hash = password_hasher.hash(&Uuid::new_v4().to_string())?;

        Ok(Self {
            user_store,
            jwt_handler,
            password_hasher,
            dummy_hash: dummy_hash.into(),
        })
    }
}

/// JSON body extractor whose rejection is reported as a validation error
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AuthApiError))]
pub struct ApiJson<T>(pub T);

/// Run store I/O or bcrypt work on the blocking pool
async fn blocking<T, F>(f: F) -> Result<T, AuthApiError>
where
    F: FnOnce() -> Result<T, AuthApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AuthApiError::Internal(format!("blocking task failed: {e}")))?
}

fn validate_registration(
    mut payload: RegisterRequest,
) -> Result<(RegisterRequest, UserRole), AuthApiError> {
    payload.username = payload.username.trim().to_string();
    payload.email = payload.email.trim().to_string();
    payload.validate()?;

    let role = match payload.role.as_deref() {
        None => UserRole::default(),
        Some(raw) => raw
            .parse::<UserRole>()
            .map_err(|e| AuthApiError::Validation(format!("role: {e}")))?,
    };

    Ok((payload, role))
}

/// Register endpoint - POST /api/auth/register
pub async fn register(
    State(state): State<AuthState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> Result<Json<MessageResponse>, AuthApiError> {
    let (payload, role) = validate_registration(payload)?;
    let RegisterRequest {
        username,
        email,
        password,
        ..
    } = payload;
    info!("📝 Registration attempt: {} ({})", email, role);

    // Cheap early exit before paying for a hash; append re-checks under its lock.
    let store = state.user_store.clone();
    let lookup = email.clone();
    if blocking(move || Ok(store.find_by_email(&lookup)?)).await?.is_some() {
        warn!("❌ Registration rejected, email taken: {}", email);
        return Err(AuthApiError::UserAlreadyExists);
    }

    let hasher = state.password_hasher.clone();
    let password_hash =
        blocking(move || hasher.hash(&password).map_err(|e| AuthApiError::Internal(e.to_string())))
            .await?;

    let user = User {
        id: Uuid::new_v4(),
        username,
        email: email.clone(),
        password_hash,
        role,
        created_at: Utc::now().to_rfc3339(),
    };

    let store = state.user_store.clone();
    blocking(move || Ok(store.append(user)?)).await?;

    info!("✅ User registered: {} ({})", email, role);

    Ok(Json(MessageResponse::new("User created successfully")))
}

/// Login endpoint - POST /api/auth/login
pub async fn login(
    State(state): State<AuthState>,
    ApiJson(mut payload): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>, AuthApiError> {
    payload.email = payload.email.trim().to_string();
    payload.validate()?;
    let email = payload.email;
    info!("🔐 Login attempt: {}", email);

    let store = state.user_store.clone();
    let lookup = email.clone();
    let user = blocking(move || Ok(store.find_by_email(&lookup)?)).await?;

    let hasher = state.password_hasher.clone();
    let stored_hash = user
        .as_ref()
        .map(|u| u.password_hash.clone())
        .unwrap_or_else(|| state.dummy_hash.to_string());
    let password = payload.password;
    let password_ok = blocking(move || Ok(hasher.verify(&password, &stored_hash))).await?;

    let user = match user {
        Some(user) if password_ok => user,
        _ => {
            warn!("❌ Failed login attempt: {}", email);
            return Err(AuthApiError::InvalidCredentials);
        }
    };

    let token = state
        .jwt_handler
        .issue(&TokenSubject::from_user(&user))
        .map_err(|e| AuthApiError::Internal(e.to_string()))?;

    info!("✅ Login successful: {} ({})", user.email, user.role);

    Ok(Json(LoginResponse { token }))
}

/// USER-only data - GET /api/user/data
pub async fn get_user_data(Extension(claims): Extension<Claims>) -> Json<MessageResponse> {
    Json(MessageResponse::new(format!(
        "Hello {}! You have USER access.",
        claims.email
    )))
}

/// ADMIN-only data - GET /api/admin/data
pub async fn get_admin_data(Extension(claims): Extension<Claims>) -> Json<MessageResponse> {
    Json(MessageResponse::new(format!(
        "Hello {}! You have ADMIN access.",
        claims.email
    )))
}

/// Auth API errors
#[derive(Debug)]
pub enum AuthApiError {
    Validation(String),
    UserAlreadyExists,
    InvalidCredentials,
    Unauthorized,
    Forbidden,
    Storage(StoreError),
    Internal(String),
}

impl From<StoreError> for AuthApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail(_) => AuthApiError::UserAlreadyExists,
            other => AuthApiError::Storage(other),
        }
    }
}

impl From<JsonRejection> for AuthApiError {
    fn from(rejection: JsonRejection) -> Self {
        AuthApiError::Validation(rejection.body_text())
    }
}

/// Field-level detail such as `email: value is not a valid email address`.
/// Only field names and messages are reported; the rejected values are not echoed.
impl From<ValidationErrors> for AuthApiError {
    fn from(errors: ValidationErrors) -> Self {
        let mut details: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| {
                    let reason = e
                        .message
                        .as_deref()
                        .map(str::to_string)
                        .unwrap_or_else(|| e.code.to_string());
                    format!("{field}: {reason}")
                })
            })
            .collect();
        details.sort();
        AuthApiError::Validation(details.join("; "))
    }
}

impl AuthApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AuthApiError::UserAlreadyExists => StatusCode::BAD_REQUEST,
            AuthApiError::InvalidCredentials | AuthApiError::Unauthorized => {
                StatusCode::UNAUTHORIZED
            }
            AuthApiError::Forbidden => StatusCode::FORBIDDEN,
            AuthApiError::Storage(_) | AuthApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AuthApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = match self {
            AuthApiError::Validation(detail) => detail,
            AuthApiError::UserAlreadyExists => "User already exists".to_string(),
            AuthApiError::InvalidCredentials => "Invalid credentials".to_string(),
            AuthApiError::Unauthorized => "Invalid token".to_string(),
            AuthApiError::Forbidden => "Forbidden: insufficient permissions".to_string(),
            AuthApiError::Storage(e) => {
                error!("🛑 Storage failure: {}", e);
                "Internal Server Error".to_string()
            }
            AuthApiError::Internal(e) => {
                error!("🛑 Internal error: {}", e);
                "Internal Server Error".to_string()
            }
        };

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}
