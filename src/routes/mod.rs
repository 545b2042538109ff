//! HTTP surface: the broker's authentication and ACL hooks, plus health and metrics.

pub mod acl;
pub mod auth;
pub mod health;

pub use acl::{acl_v1, acl_v2};
pub use auth::{auth_v1, auth_v2};
use http::StatusCode;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::authenticator::AuthenticatorError;

/// Metrics label for requests whose vendor is unknown to us.
const UNKNOWN_COMPANY: &str = "unknown";

/// Split a broker credential into `(vendor, token)`.
///
/// The credential is the first non-empty of `token`, `username` and `password`. A `vendor:` prefix
/// is split off at the first colon; without one the vendor is empty.
pub fn extract_vendor_token<'a>(
    token: &'a str,
    username: &'a str,
    password: &'a str,
) -> (&'a str, &'a str) {
    let credential = [token, username, password]
        .into_iter()
        .find(|field| !field.is_empty())
        .unwrap_or_default();

    credential.split_once(':').unwrap_or(("", credential))
}

/// Result of a v2 hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Allow,
    Deny,
}

impl From<bool> for Decision {
    fn from(allowed: bool) -> Self {
        if allowed {
            Decision::Allow
        } else {
            Decision::Deny
        }
    }
}

/// Plain-text response of a v1 hook.
fn v1_response(allowed: bool) -> (StatusCode, &'static str) {
    if allowed {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::UNAUTHORIZED, "request is not authorized")
    }
}

const BAD_REQUEST: (StatusCode, &str) = (StatusCode::BAD_REQUEST, "bad request");

/// Log a rejected request at the level its cause deserves. Tokens are never logged.
fn log_rejection(company: &str, error: &AuthenticatorError) {
    let status = error.status_label();
    if error.is_denial() {
        warn!(company, status, error = %error, "Request is not authorized");
    } else if error.is_expired() {
        info!(company, status, "Token has expired");
    } else {
        error!(company, status, error = %error, "Request is not authorized");
    }
}
