//! Authentication Models
//! Mission: Define user identities, token claims and the HTTP payloads around them

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

/// Registered identity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String, // bcrypt hash - never returned over HTTP
    pub role: UserRole,
    pub created_at: String,
}

/// Unicode-lowercased form of an email; the uniqueness and lookup key in every backend.
pub fn email_key(email: &str) -> String {
    email.to_lowercase()
}

impl User {
    /// Case-insensitive email comparison used for uniqueness and lookup.
    pub fn has_email(&self, email: &str) -> bool {
        email_key(&self.email) == email_key(email)
    }
}

/// User roles for RBAC. Matching is exact: there is no hierarchy between roles.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum UserRole {
    #[default]
    #[serde(rename = "USER")]
    User,
    #[serde(rename = "ADMIN")]
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "USER",
            UserRole::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for role names outside the closed set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role '{0}' (expected USER or ADMIN)")]
pub struct UnknownRole(pub String);

impl FromStr for UserRole {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "USER" => Ok(UserRole::User),
            "ADMIN" => Ok(UserRole::Admin),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

/// Identity half of the claims, supplied by the caller of `JwtHandler::issue`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSubject {
    pub email: String,
    pub role: UserRole,
}

impl TokenSubject {
    pub fn from_user(user: &User) -> Self {
        Self {
            email: user.email.clone(),
            role: user.role,
        }
    }
}

/// JWT Claims payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub email: String,
    pub role: UserRole,
    pub iat: i64, // issued-at, unix seconds
    pub exp: i64, // expiration, unix seconds
}

impl Claims {
    pub fn subject(&self) -> TokenSubject {
        TokenSubject {
            email: self.email.clone(),
            role: self.role,
        }
    }
}

/// Register request body
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, message = "must not be empty"))]
    pub username: String,
    #[validate(email(message = "value is not a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub password: String,
    pub role: Option<String>,
}

/// Login request body
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "value is not a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub password: String,
}

/// Login response
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}

/// Plain message response used by register and the protected endpoints
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
