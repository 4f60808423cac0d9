//! # API Gateway
//!
//! HTTP edge service for the douyin API. Every `/douyin` route passes
//! through the JWT middleware; login, refresh and logout are served by the
//! middleware's own handlers.

pub mod config;
pub mod logging;
pub mod routes;
pub mod users;

use anyhow::{Context, Result};
use jwt_middleware::JwtAuth;
use std::sync::Arc;

/// Build the shared authentication state; any error is fatal at startup
pub fn build_auth(config: &config::Config) -> Result<Arc<JwtAuth>> {
    let store = users::UserStore::parse(&config.users).context("Invalid GATEWAY_USERS")?;
    if store.is_empty() {
        tracing::warn!("GATEWAY_USERS is empty, every login will fail");
    }

    let auth = JwtAuth::builder(config.jwt.to_jwt_config())
        .authenticator(users::PasswordAuthenticator::new(
            store,
            config.jwt.identity_key.clone(),
        ))
        .build()
        .context("Failed to initialize JWT middleware")?;

    Ok(Arc::new(auth))
}
