//! Client for the external token validator used by `auto` vendors.
//!
//! The validator verifies a bearer token and answers with the decoded payload in the
//! `X-User-Data` response header. Any failure, including timeouts and non-200 answers, is an
//! authentication failure for the caller.

use std::time::Duration;

use reqwest::{StatusCode, header::HeaderMap};
use serde_json::{Map, Value};

use crate::{config::ValidatorConfig, observability::metrics};

const VALIDATE_PATH: &str = "/api/v3/internal/validate";
const SERVICE_NAME_HEADER: &str = "X-Service-Name";
const USER_DATA_HEADER: &str = "X-User-Data";

#[derive(Debug, thiserror::Error)]
pub enum ValidatorError {
    #[error("x-service-name can not be empty")]
    EmptyServiceName,

    #[error("invalid jwt")]
    InvalidJwt,

    #[error("validator request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("validator request failed with status {0}")]
    RequestFailed(StatusCode),

    #[error("validator response has no X-User-Data header")]
    MissingUserData,

    #[error("invalid X-User-Data header: {0}")]
    InvalidUserData(String),
}

impl ValidatorError {
    pub fn status_label(&self) -> &'static str {
        match self {
            ValidatorError::EmptyServiceName => "empty_service_name",
            ValidatorError::InvalidJwt => "invalid_jwt",
            ValidatorError::Request(e) if e.is_timeout() => "timeout",
            ValidatorError::Request(_) => "request_error",
            ValidatorError::RequestFailed(_) => "request_failed",
            ValidatorError::MissingUserData => "missing_user_data",
            ValidatorError::InvalidUserData(_) => "invalid_user_data",
        }
    }
}

/// Decoded token payload reported by the validator.
///
/// Fields with an unexpected JSON type are left at their defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Payload {
    pub iat: i64,
    pub aud: String,
    pub iss: i64,
    pub sub: String,
    pub user_id: i64,
    pub email: String,
    pub exp: i64,
    pub locale: String,
    pub sid: String,
}

impl Payload {
    fn from_user_data(raw: &str) -> Result<Self, ValidatorError> {
        let data: Map<String, Value> = serde_json::from_str(raw)
            .map_err(|e| ValidatorError::InvalidUserData(e.to_string()))?;

        let int = |name: &str| data.get(name).and_then(Value::as_f64).map_or(0, |n| n as i64);
        let string = |name: &str| {
            data.get(name)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        Ok(Self {
            iat: int("iat"),
            aud: string("aud"),
            iss: int("iss"),
            sub: string("sub"),
            user_id: int("user_id"),
            email: string("email"),
            exp: int("exp"),
            locale: string("locale"),
            sid: string("sid"),
        })
    }
}

/// Shared, pooled validator client.
#[derive(Debug, Clone)]
pub struct ValidatorClient {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
    service_name: String,
    optional: bool,
}

impl ValidatorClient {
    pub fn new(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            timeout: Duration::from_secs(5),
            service_name: "tollgate".to_string(),
            optional: false,
        }
    }

    /// Build a client from configuration, or `None` when no URL is configured.
    pub fn from_config(config: &ValidatorConfig) -> Result<Option<Self>, ValidatorError> {
        let Some(url) = &config.url else {
            return Ok(None);
        };

        let client = config.build_client()?;
        Ok(Some(
            Self::new(url.as_str(), client)
                .with_timeout(config.timeout())
                .with_service_name(&config.service_name)
                .with_optional(config.optional),
        ))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    /// Ask the validator to decode the payload without requiring a valid signature.
    pub fn with_optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    /// Validate `token` and return the payload the validator decoded from it.
    pub async fn validate(&self, token: &str) -> Result<Payload, ValidatorError> {
        let result = self.send(token).await;
        metrics::record_validator(match &result {
            Ok(_) => "ok",
            Err(e) => e.status_label(),
        });
        result
    }

    async fn send(&self, token: &str) -> Result<Payload, ValidatorError> {
        if self.service_name.is_empty() {
            return Err(ValidatorError::EmptyServiceName);
        }
        if token.trim().is_empty() {
            return Err(ValidatorError::InvalidJwt);
        }

        let mut request = self
            .client
            .get(format!("{}{}", self.base_url, VALIDATE_PATH))
            .timeout(self.timeout)
            .header(SERVICE_NAME_HEADER, &self.service_name)
            .header("X-APP-Name", &self.service_name)
            .header("locale", "en-US")
            .header(reqwest::header::AUTHORIZATION, format!("bearer {token}"));

        if self.optional {
            request = request.query(&[("mode", "optional")]);
        }

        let response = request.send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(ValidatorError::RequestFailed(status));
        }

        user_data(response.headers()).and_then(Payload::from_user_data)
    }
}

fn user_data(headers: &HeaderMap) -> Result<&str, ValidatorError> {
    headers
        .get(USER_DATA_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .ok_or(ValidatorError::MissingUserData)
}
