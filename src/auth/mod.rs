//! Authentication Module
//! Mission: Password hashing, JWT issuance, user storage and role-gated access

pub mod api;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod password;
pub mod user_store;

pub use api::{AuthApiError, AuthState};
pub use jwt::JwtHandler;
pub use middleware::{role_gate, RoleGate};
pub use models::{Claims, User, UserRole};
pub use password::PasswordHasher;
pub use user_store::{open_user_store, UserStore};
