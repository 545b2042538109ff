//! Multi-tenant JWT authentication and topic ACL gateway for publish/subscribe brokers.
//!
//! The broker forwards every connect and every publish/subscribe to the gateway's HTTP hooks.
//! Each request carries a `vendor:token` credential; the vendor's [`Authenticator`] verifies
//! the token and, for ACL hooks, resolves the topic against the vendor's topic rules.
//!
//! [`Authenticator`]: authenticator::Authenticator

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

pub mod acl;
pub mod authenticator;
pub mod config;
pub mod observability;
pub mod routes;
pub mod topics;
pub mod validator;

#[cfg(test)]
mod test_utils;
#[cfg(test)]
mod tests;

use authenticator::Authenticators;
use config::GatewayConfig;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub authenticators: Arc<Authenticators>,
}

impl AppState {
    pub fn new(config: GatewayConfig, authenticators: Authenticators) -> Self {
        Self {
            config: Arc::new(config),
            authenticators: Arc::new(authenticators),
        }
    }
}

/// Build the HTTP router serving the broker hooks, health probes and metrics.
pub fn build_app(state: AppState) -> Router {
    let config = state.config.clone();
    let mut app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/health/live", get(routes::health::liveness))
        .route("/health/ready", get(routes::health::readiness))
        .route("/v1/auth", post(routes::auth_v1))
        .route("/v1/acl", post(routes::acl_v1))
        .route("/v2/auth", post(routes::auth_v2))
        .route("/v2/acl", post(routes::acl_v2));

    if config.observability.metrics.enabled {
        app = app.route(
            &config.observability.metrics.path,
            get(routes::health::metrics),
        );
    }

    app.layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(config.server.body_limit_bytes))
        .with_state(state)
}
