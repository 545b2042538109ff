use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// External token validator used by `auto` vendors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValidatorConfig {
    /// Base URL of the validator service. Required when any vendor has `type = "auto"`.
    #[serde(default)]
    pub url: Option<String>,

    /// Per-request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Value sent in the `X-Service-Name` header.
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Ask the validator to only decode the payload (`mode=optional`).
    #[serde(default)]
    pub optional: bool,

    /// Connection pool shared by every `auto` vendor.
    #[serde(default)]
    pub http_client: ValidatorPoolConfig,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_ms: default_timeout_ms(),
            service_name: default_service_name(),
            optional: false,
            http_client: ValidatorPoolConfig::default(),
        }
    }
}

impl ValidatorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "validator.timeout_ms must be greater than zero".into(),
            ));
        }
        if self.http_client.connect_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "validator.http_client.connect_timeout_ms must be greater than zero".into(),
            ));
        }
        if let Some(url) = &self.url
            && !(url.starts_with("http://") || url.starts_with("https://"))
        {
            return Err(ConfigError::Validation(format!(
                "validator.url must be an http(s) URL, got {url:?}"
            )));
        }
        Ok(())
    }

    /// Build the pooled client used for validator calls.
    ///
    /// The per-request timeout is applied by the caller, not here.
    pub fn build_client(&self) -> Result<reqwest::Client, reqwest::Error> {
        let pool = &self.http_client;
        reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(pool.connect_timeout_ms))
            .pool_max_idle_per_host(pool.max_idle_connections)
            .pool_idle_timeout(Duration::from_secs(pool.idle_timeout_secs))
            .tcp_nodelay(true)
            .user_agent(&pool.user_agent)
            .build()
    }
}

/// Connection settings for validator calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValidatorPoolConfig {
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Idle connections kept open to the validator.
    #[serde(default = "default_max_idle_connections")]
    pub max_idle_connections: usize,

    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ValidatorPoolConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            max_idle_connections: default_max_idle_connections(),
            idle_timeout_secs: default_idle_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_service_name() -> String {
    "tollgate".to_string()
}

fn default_connect_timeout_ms() -> u64 {
    1000
}

// Every ACL check of an auto vendor calls the validator, so keep plenty of warm connections.
fn default_max_idle_connections() -> usize {
    128
}

fn default_idle_timeout_secs() -> u64 {
    90
}

fn default_user_agent() -> String {
    format!("tollgate/{}", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ValidatorConfig::default();
        assert!(config.url.is_none());
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.service_name, "tollgate");
        assert!(!config.optional);
        assert_eq!(config.http_client.max_idle_connections, 128);
        assert!(config.http_client.user_agent.starts_with("tollgate/"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let config = ValidatorConfig {
            timeout_ms: 0,
            ..ValidatorConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));

        let mut config = ValidatorConfig::default();
        config.http_client.connect_timeout_ms = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_rejects_non_http_url() {
        let config: ValidatorConfig = toml::from_str(r#"url = "validator.local:8080""#).unwrap();
        assert!(config.validate().is_err());

        let config: ValidatorConfig =
            toml::from_str(r#"url = "http://validator.local:8080""#).unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_pool_parse() {
        let config: ValidatorConfig = toml::from_str(
            r#"
            url = "http://validator.local"

            [http_client]
            max_idle_connections = 8
        "#,
        )
        .unwrap();
        assert_eq!(config.http_client.max_idle_connections, 8);
        assert_eq!(config.http_client.idle_timeout_secs, 90);
        assert!(config.build_client().is_ok());
    }
}
