//! Configuration module for the gateway.
//!
//! The gateway is configured via a TOML file, with support for environment
//! variable interpolation using `${VAR_NAME}` syntax.
//!
//! # Example
//!
//! ```toml
//! default_vendor = "snapp"
//!
//! [server]
//! port = 9999
//!
//! [validator]
//! url = "http://validator.local"
//!
//! [[vendors]]
//! company = "snapp"
//! type = "manual"
//! keys = { "0" = "${DRIVER_PUBLIC_KEY}" }
//! ```

mod observability;
mod server;
mod validator;
mod vendor;

use std::{collections::HashSet, path::Path};

pub use observability::*;
use serde::{Deserialize, Serialize};
pub use server::*;
pub use validator::*;
pub use vendor::*;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Vendor used when a credential carries no vendor prefix, or an unknown one.
    pub default_vendor: String,

    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Observability configuration (logging, metrics).
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// External token validator used by `auto` vendors.
    #[serde(default)]
    pub validator: ValidatorConfig,

    /// Tenant configurations.
    #[serde(default)]
    pub vendors: Vec<VendorConfig>,
}

impl GatewayConfig {
    /// Load configuration from a TOML file.
    ///
    /// Environment variables in the format `${VAR_NAME}` are expanded.
    /// Missing required variables will cause an error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e, path.as_ref().to_path_buf()))?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(contents)?;

        let config: GatewayConfig = toml::from_str(&expanded).map_err(ConfigError::Parse)?;

        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration for consistency and completeness.
    ///
    /// Vendor internals (keys, templates, entity maps) are checked when the
    /// authenticators are built.
    fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for vendor in &self.vendors {
            vendor.validate()?;
            if !seen.insert(vendor.company.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "vendor {} is configured more than once",
                    vendor.company
                )));
            }
        }

        if !self.vendors.is_empty() && !seen.contains(self.default_vendor.as_str()) {
            return Err(ConfigError::Validation(format!(
                "default_vendor {} does not name a configured vendor",
                self.default_vendor
            )));
        }

        self.validator.validate()?;

        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {1}: {0}")]
    Io(std::io::Error, std::path::PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

/// Expand environment variables in the format `${VAR_NAME}`.
///
/// Variables that appear after a `#` on the same line are left untouched.
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let re = env_var_pattern();
    let mut result = String::with_capacity(input.len());

    for line in input.lines() {
        let comment_pos = line.find('#');

        let mut line_result = String::with_capacity(line.len());
        let mut last_end = 0;

        for cap in re.captures_iter(line) {
            let Some(whole) = cap.get(0) else {
                continue;
            };

            if let Some(pos) = comment_pos
                && whole.start() >= pos
            {
                continue;
            }

            line_result.push_str(&line[last_end..whole.start()]);

            let var_name = &cap[1];
            let value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;
            line_result.push_str(&value);

            last_end = whole.end();
        }

        line_result.push_str(&line[last_end..]);
        result.push_str(&line_result);
        result.push('\n');
    }

    // Remove trailing newline if input didn't have one
    if !input.ends_with('\n') && result.ends_with('\n') {
        result.pop();
    }

    Ok(result)
}

fn env_var_pattern() -> &'static regex::Regex {
    static PATTERN: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
    PATTERN.get_or_init(|| regex::Regex::new(r"\$\{([^}]+)\}").unwrap())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const MINIMAL: &str = r#"
        default_vendor = "snapp"

        [[vendors]]
        company = "snapp"
        keys = { "0" = "c2VjcmV0" }
    "#;

    #[test]
    fn test_minimal_config() {
        let config = GatewayConfig::from_str(MINIMAL).unwrap();

        assert_eq!(config.default_vendor, "snapp");
        assert_eq!(config.vendors.len(), 1);
        assert_eq!(config.vendors[0].kind, VendorType::Manual);
        assert_eq!(config.server.port, 9999);
        assert!(config.observability.metrics.enabled);
    }

    #[test]
    fn test_default_vendor_must_exist() {
        let err = GatewayConfig::from_str(
            r#"
            default_vendor = "missing"

            [[vendors]]
            company = "snapp"
        "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(msg) if msg.contains("missing")));
    }

    #[test]
    fn test_duplicate_vendor_rejected() {
        let err = GatewayConfig::from_str(
            r#"
            default_vendor = "snapp"

            [[vendors]]
            company = "snapp"

            [[vendors]]
            company = "snapp"
        "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(msg) if msg.contains("more than once")));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = GatewayConfig::from_str(
            r#"
            default_vendor = "snapp"
            tracing = true
        "#,
        );
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_env_var_expansion() {
        temp_env::with_var("TEST_DRIVER_KEY", Some("c2VjcmV0"), || {
            let result = expand_env_vars("key = \"${TEST_DRIVER_KEY}\"").unwrap();
            assert_eq!(result, "key = \"c2VjcmV0\"");
        });
    }

    #[test]
    fn test_env_var_in_comment_ignored() {
        let result = expand_env_vars("# key = \"${NONEXISTENT_VAR}\"").unwrap();
        assert_eq!(result, "# key = \"${NONEXISTENT_VAR}\"");
    }

    #[test]
    fn test_env_var_after_comment_ignored() {
        temp_env::with_var("TEST_SALT", Some("pepper"), || {
            let result =
                expand_env_vars("salt = \"${TEST_SALT}\" # was ${NONEXISTENT_VAR}").unwrap();
            assert_eq!(result, "salt = \"pepper\" # was ${NONEXISTENT_VAR}");
        });
    }

    #[test]
    fn test_missing_env_var() {
        temp_env::with_var_unset("TOLLGATE_TEST_UNSET", || {
            let result = expand_env_vars("key = \"${TOLLGATE_TEST_UNSET}\"");
            assert!(
                matches!(result, Err(ConfigError::EnvVarNotFound(name)) if name == "TOLLGATE_TEST_UNSET")
            );
        });
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();

        let config = GatewayConfig::from_file(file.path()).unwrap();
        assert_eq!(config.vendors[0].company, "snapp");
    }

    #[test]
    fn test_from_file_missing() {
        let err = GatewayConfig::from_file("/nonexistent/tollgate.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_, path) if path.ends_with("tollgate.toml")));
    }
}
