//! HTTP application assembly
//!
//! Public routes: health, register, login. Role-gated routes run behind
//! `role_gate`, which answers 401 before the handler for a missing or bad
//! token and 403 for a role mismatch.

use crate::auth::{api as auth_api, role_gate, AuthState, RoleGate, UserRole};
use crate::middleware::request_logging;
use axum::{
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Build the full router with all layers installed
pub fn build_router(auth_state: AuthState) -> Router {
    let auth_router = Router::new()
        .route("/api/auth/register", post(auth_api::register))
        .route("/api/auth/login", post(auth_api::login))
        .with_state(auth_state.clone());

    let user_routes = Router::new()
        .route("/api/user/data", get(auth_api::get_user_data))
        .route_layer(middleware::from_fn_with_state(
            RoleGate::new(auth_state.jwt_handler.clone(), UserRole::User),
            role_gate,
        ));

    let admin_routes = Router::new()
        .route("/api/admin/data", get(auth_api::get_admin_data))
        .route_layer(middleware::from_fn_with_state(
            RoleGate::new(auth_state.jwt_handler.clone(), UserRole::Admin),
            role_gate,
        ));

    let public_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .merge(public_routes)
        .merge(auth_router)
        .merge(user_routes)
        .merge(admin_routes)
        .layer(middleware::from_fn(request_logging))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
