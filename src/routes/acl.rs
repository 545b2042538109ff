//! Broker ACL hooks.

use std::time::Instant;

use axum::{
    Form, Json,
    extract::{
        State,
        rejection::{FormRejection, JsonRejection},
    },
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::{
    BAD_REQUEST, Decision, UNKNOWN_COMPANY, extract_vendor_token, log_rejection, v1_response,
};
use crate::{
    AppState,
    acl::AccessType,
    authenticator::AuthenticatorError,
    observability::metrics,
};

#[derive(Debug, Deserialize)]
pub struct AclRequest {
    pub access: AccessType,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub topic: String,
}

#[derive(Debug, Serialize)]
pub struct AclResponse {
    pub result: Decision,
}

/// Check the request against its vendor's topic rules. `true` when access is granted.
async fn authorize(state: &AppState, request: &AclRequest) -> bool {
    let (vendor, token) = extract_vendor_token(&request.token, &request.username, &request.password);
    let access = request.access;
    let topic = request.topic.as_str();

    let Some(authenticator) = state.authenticators.get(vendor) else {
        error!(vendor, "No authenticator for vendor");
        metrics::record_acl(UNKNOWN_COMPANY, access.as_str(), "err_no_authenticator", "");
        return false;
    };

    let company = authenticator.company();
    match authenticator.acl(access, token, topic).await {
        Ok(()) => {
            info!(company, access = %access, topic, "ACL ok");
            metrics::record_acl(company, access.as_str(), "ok", "");
            true
        }
        Err(e) => {
            log_rejection(company, &e);
            let topic_type = match &e {
                AuthenticatorError::TopicNotAllowed { topic_type, .. } => topic_type.as_str(),
                _ => "",
            };
            metrics::record_acl(company, access.as_str(), e.status_label(), topic_type);
            false
        }
    }
}

fn log_bad_request(reason: &dyn std::fmt::Display) {
    warn!(reason = %reason, "ACL bad request");
    metrics::record_acl(UNKNOWN_COMPANY, "unknown", "bad_request", "");
}

/// `POST /v2/acl`: JSON in, always 200 with an allow/deny verdict.
#[tracing::instrument(name = "api.v2.acl", skip_all)]
pub async fn acl_v2(
    State(state): State<AppState>,
    request: Result<Json<AclRequest>, JsonRejection>,
) -> Json<AclResponse> {
    let start = Instant::now();

    let allowed = match request {
        Ok(Json(request)) => authorize(&state, &request).await,
        Err(rejection) => {
            log_bad_request(&rejection);
            false
        }
    };

    metrics::record_request_duration("acl_v2", start.elapsed().as_secs_f64());

    Json(AclResponse {
        result: Decision::from(allowed),
    })
}

/// `POST /v1/acl`: form in, plain-text status out. An empty topic is a bad request.
#[tracing::instrument(name = "api.v1.acl", skip_all)]
pub async fn acl_v1(
    State(state): State<AppState>,
    request: Result<Form<AclRequest>, FormRejection>,
) -> impl IntoResponse {
    let start = Instant::now();

    let response = match request {
        Ok(Form(request)) if request.topic.is_empty() => {
            log_bad_request(&"empty topic");
            BAD_REQUEST
        }
        Ok(Form(request)) => v1_response(authorize(&state, &request).await),
        Err(rejection) => {
            log_bad_request(&rejection);
            BAD_REQUEST
        }
    };

    metrics::record_request_duration("acl_v1", start.elapsed().as_secs_f64());
    response
}
