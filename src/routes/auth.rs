//! Broker authentication hooks.

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
use crate::{AppState, observability::metrics};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AuthRequest {
    pub token: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub result: Decision,
    pub is_superuser: bool,
}

/// Authenticate the request's credential. `Some(is_superuser)` when it is accepted.
async fn authenticate(state: &AppState, request: &AuthRequest) -> Option<bool> {
    let (vendor, token) = extract_vendor_token(&request.token, &request.username, &request.password);

    let Some(authenticator) = state.authenticators.get(vendor) else {
        error!(vendor, "No authenticator for vendor");
        metrics::record_auth(UNKNOWN_COMPANY, "err_no_authenticator");
        return None;
    };

    let company = authenticator.company();
    match authenticator.auth(token).await {
        Ok(()) => {
            info!(company, "Auth ok");
            metrics::record_auth(company, "ok");
            Some(authenticator.is_superuser())
        }
        Err(e) => {
            log_rejection(company, &e);
            metrics::record_auth(company, e.status_label());
            None
        }
    }
}

/// `POST /v2/auth`: JSON in, always 200 with an allow/deny verdict.
#[tracing::instrument(name = "api.v2.auth", skip_all)]
pub async fn auth_v2(
    State(state): State<AppState>,
    request: Result<Json<AuthRequest>, JsonRejection>,
) -> Json<AuthResponse> {
    let start = Instant::now();

    let verdict = match request {
        Ok(Json(request)) => authenticate(&state, &request).await,
        Err(rejection) => {
            warn!(error = %rejection, "Auth bad request");
            metrics::record_auth(UNKNOWN_COMPANY, "bad_request");
            None
        }
    };

    metrics::record_request_duration("auth_v2", start.elapsed().as_secs_f64());

    Json(AuthResponse {
        result: Decision::from(verdict.is_some()),
        is_superuser: verdict.unwrap_or(false),
    })
}

/// `POST /v1/auth`: form in, plain-text status out.
#[tracing::instrument(name = "api.v1.auth", skip_all)]
pub async fn auth_v1(
    State(state): State<AppState>,
    request: Result<Form<AuthRequest>, FormRejection>,
) -> impl IntoResponse {
    let start = Instant::now();

    let response = match request {
        Ok(Form(request)) => v1_response(authenticate(&state, &request).await.is_some()),
        Err(rejection) => {
            warn!(error = %rejection, "Auth bad request");
            metrics::record_auth(UNKNOWN_COMPANY, "bad_request");
            BAD_REQUEST
        }
    };

    metrics::record_request_duration("auth_v1", start.elapsed().as_secs_f64());
    response
}

#[cfg(test)]
mod tests {
    use axum::{Router, body::Body};
    use http::{Request, StatusCode, header};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::test_utils::{ADMIN_SECRET, hmac_token, now, rsa_token, test_app};

    async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
    }

    async fn post_form(app: Router, uri: &str, body: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8_lossy(&body).to_string())
    }

    fn driver_token() -> String {
        rsa_token(&json!({ "iss": 0, "sub": "DXKgaNQa7N5Y7bo", "exp": now() + 3600 }))
    }

    #[tokio::test]
    async fn test_v2_allow() {
        let (status, body) =
            post_json(test_app(), "/v2/auth", json!({ "token": driver_token() })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"], "allow");
        assert_eq!(body["is_superuser"], false);
    }

    #[tokio::test]
    async fn test_v2_vendor_prefix_in_username() {
        let (_, body) = post_json(
            test_app(),
            "/v2/auth",
            json!({ "username": format!("snapp:{}", driver_token()) }),
        )
        .await;

        assert_eq!(body["result"], "allow");
    }

    #[tokio::test]
    async fn test_v2_admin_is_superuser() {
        let token = hmac_token(ADMIN_SECRET, &json!({ "iss": "system", "sub": "ops" }));
        let (_, body) = post_json(
            test_app(),
            "/v2/auth",
            json!({ "password": format!("admin:{token}") }),
        )
        .await;

        assert_eq!(body["result"], "allow");
        assert_eq!(body["is_superuser"], true);
    }

    #[tokio::test]
    async fn test_v2_deny() {
        let (status, body) =
            post_json(test_app(), "/v2/auth", json!({ "token": "not-a-jwt" })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"], "deny");
        assert_eq!(body["is_superuser"], false);
    }

    #[tokio::test]
    async fn test_v2_expired_token() {
        let token = rsa_token(&json!({ "iss": 0, "sub": "DXKgaNQa7N5Y7bo", "exp": now() - 3600 }));
        let (_, body) = post_json(test_app(), "/v2/auth", json!({ "token": token })).await;

        assert_eq!(body["result"], "deny");
    }

    #[tokio::test]
    async fn test_v2_malformed_body_denies() {
        let request = Request::builder()
            .method("POST")
            .uri("/v2/auth")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();

        let response = test_app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["result"], "deny");
    }

    #[tokio::test]
    async fn test_v1_ok() {
        let (status, body) =
            post_form(test_app(), "/v1/auth", &format!("token={}", driver_token())).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn test_v1_unauthorized() {
        let (status, body) = post_form(test_app(), "/v1/auth", "username=garbage").await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, "request is not authorized");
    }

    #[tokio::test]
    async fn test_v1_wrong_content_type_is_bad_request() {
        let (status, body) =
            post_json(test_app(), "/v1/auth", json!({ "token": driver_token() })).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, Value::Null);
    }
}
