//! Sentiment Pricing Auth Service Library
//!
//! Exposes the auth core and router assembly for the server binary and tests.

pub mod app;
pub mod auth;
pub mod config;
pub mod middleware;

pub use app::build_router;
pub use config::AppConfig;
