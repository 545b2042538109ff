//! Per-vendor (tenant) configuration.
//!
//! Each `[[vendors]]` entry describes one tenant: how its tokens are verified, which topics its
//! clients may use, and how subjects embedded in topic names are encoded.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::acl::AccessType;

/// Which authenticator variant serves a vendor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VendorType {
    /// Tokens verified locally against configured keys.
    #[default]
    Manual,
    /// Tokens verified by the external validator service.
    Auto,
    /// Trusted internal callers sharing the `system` key. ACL checks always pass.
    #[serde(alias = "admin")]
    Internal,
}

impl VendorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VendorType::Manual => "manual",
            VendorType::Auto => "auto",
            VendorType::Internal => "internal",
        }
    }
}

/// One tenant's configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VendorConfig {
    /// Unique vendor name. Clients select it with a `vendor:` credential prefix.
    pub company: String,

    /// Authenticator variant.
    #[serde(rename = "type", default)]
    pub kind: VendorType,

    /// Access types clients may request. `pubsub` must be listed explicitly.
    #[serde(default)]
    pub allowed_access_types: Vec<AccessType>,

    /// Ordered topic catalog. The first matching rule governs a topic.
    #[serde(default)]
    pub topics: Vec<TopicConfig>,

    /// Issuer to raw key material (PEM public key, or base64 secret for HMAC methods).
    #[serde(default)]
    pub keys: HashMap<String, String>,

    /// Issuer to topic entity segment. Must contain `default`.
    #[serde(default)]
    pub iss_entity_map: HashMap<String, String>,

    /// Issuer to counterpart entity segment. Must contain `default`.
    #[serde(default)]
    pub iss_peer_map: HashMap<String, String>,

    /// Issuer to identifier codec parameters.
    #[serde(default)]
    pub hash_id_map: HashMap<String, HashIdConfig>,

    /// Claim names and the expected signing method.
    #[serde(default)]
    pub jwt: JwtConfig,

    /// Hash used by the `Digest` template function.
    #[serde(default)]
    pub digest: DigestAlgorithm,

    /// Prefix hashed together with the value by `Digest`.
    #[serde(default = "default_digest_prefix")]
    pub digest_prefix: String,

    /// Maximum number of compiled topic patterns cached for this vendor (0 disables caching).
    #[serde(default = "default_pattern_cache_size")]
    pub pattern_cache_size: usize,

    /// Users whose requests are logged with a warning (`auto` vendors only).
    #[serde(default)]
    pub blacklist: Option<BlacklistConfig>,
}

impl VendorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.company.trim().is_empty() {
            return Err(ConfigError::Validation(
                "vendor company name cannot be empty".into(),
            ));
        }
        if self.jwt.iss_name.is_empty() || self.jwt.sub_name.is_empty() {
            return Err(ConfigError::Validation(format!(
                "vendor {}: jwt.iss_name and jwt.sub_name cannot be empty",
                self.company
            )));
        }
        Ok(())
    }
}

fn default_digest_prefix() -> String {
    "emqch".to_string()
}

fn default_pattern_cache_size() -> usize {
    10_000
}

/// A topic rule as written in configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TopicConfig {
    /// Type tag reported when the rule matches (e.g. "cab_event").
    #[serde(rename = "type")]
    pub kind: String,

    /// Pattern template rendered into a regular expression.
    pub template: String,

    /// Issuer to granted access.
    #[serde(default)]
    pub accesses: HashMap<String, AccessType>,
}

/// Identifier codec parameters for one issuer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HashIdConfig {
    pub salt: String,

    /// Minimum encoded length.
    #[serde(default)]
    pub length: usize,

    /// Custom alphabet. The codec's default alphabet is used when omitted or empty.
    #[serde(default)]
    pub alphabet: Option<String>,
}

/// Claim names and signing method.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JwtConfig {
    /// Claim holding the issuer.
    #[serde(default = "default_iss_name")]
    pub iss_name: String,

    /// Claim holding the subject.
    #[serde(default = "default_sub_name")]
    pub sub_name: String,

    /// Expected signing method. Required for `manual` and `internal` vendors.
    #[serde(default)]
    pub signing_method: Option<JwtAlgorithm>,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            iss_name: default_iss_name(),
            sub_name: default_sub_name(),
            signing_method: None,
        }
    }
}

fn default_iss_name() -> String {
    "iss".to_string()
}

fn default_sub_name() -> String {
    "sub".to_string()
}

/// JWT signing algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JwtAlgorithm {
    HS256,
    HS384,
    HS512,
    RS256,
    RS384,
    RS512,
    ES256,
    ES384,
    PS256,
    PS384,
    PS512,
    EdDSA,
}

impl JwtAlgorithm {
    /// Convert to jsonwebtoken Algorithm.
    pub fn to_jwt_algorithm(self) -> jsonwebtoken::Algorithm {
        match self {
            JwtAlgorithm::HS256 => jsonwebtoken::Algorithm::HS256,
            JwtAlgorithm::HS384 => jsonwebtoken::Algorithm::HS384,
            JwtAlgorithm::HS512 => jsonwebtoken::Algorithm::HS512,
            JwtAlgorithm::RS256 => jsonwebtoken::Algorithm::RS256,
            JwtAlgorithm::RS384 => jsonwebtoken::Algorithm::RS384,
            JwtAlgorithm::RS512 => jsonwebtoken::Algorithm::RS512,
            JwtAlgorithm::ES256 => jsonwebtoken::Algorithm::ES256,
            JwtAlgorithm::ES384 => jsonwebtoken::Algorithm::ES384,
            JwtAlgorithm::PS256 => jsonwebtoken::Algorithm::PS256,
            JwtAlgorithm::PS384 => jsonwebtoken::Algorithm::PS384,
            JwtAlgorithm::PS512 => jsonwebtoken::Algorithm::PS512,
            JwtAlgorithm::EdDSA => jsonwebtoken::Algorithm::EdDSA,
        }
    }

    /// Check if this algorithm matches a jsonwebtoken Algorithm.
    pub fn matches(self, alg: jsonwebtoken::Algorithm) -> bool {
        self.to_jwt_algorithm() == alg
    }
}

/// Hash used by the `Digest` template function.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DigestAlgorithm {
    #[default]
    Md5,
    Sha256,
}

/// Users to flag in logs when they connect through an `auto` vendor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BlacklistConfig {
    /// Issuer the lists apply to.
    pub issuer: String,

    /// Numeric user ids as reported by the validator.
    #[serde(default)]
    pub user_ids: Vec<u64>,

    /// Encoded subjects as they appear in tokens.
    #[serde(default)]
    pub hashed_ids: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vendor() {
        let vendor: VendorConfig = toml::from_str(
            r#"
            company = "snapp"
            type = "manual"
            allowed_access_types = ["sub", "pub"]
            iss_entity_map = { default = "", "0" = "driver", "1" = "passenger" }
            iss_peer_map = { default = "", "0" = "passenger", "1" = "driver" }
            keys = { "0" = "c2VjcmV0" }

            [jwt]
            signing_method = "HS512"

            [hash_id_map.0]
            salt = "secret"
            length = 15

            [[topics]]
            type = "driver_location"
            template = "^{{company}}/driver/{{sub}}/location$"
            accesses = { "0" = "pub", "1" = "none" }
        "#,
        )
        .unwrap();

        assert_eq!(vendor.kind, VendorType::Manual);
        assert_eq!(
            vendor.allowed_access_types,
            vec![AccessType::Subscribe, AccessType::Publish]
        );
        assert_eq!(vendor.jwt.iss_name, "iss");
        assert_eq!(vendor.jwt.signing_method, Some(JwtAlgorithm::HS512));
        assert_eq!(vendor.hash_id_map["0"].length, 15);
        assert_eq!(vendor.topics[0].accesses["0"], AccessType::Publish);
        assert_eq!(vendor.topics[0].accesses["1"], AccessType::None);
        assert_eq!(vendor.digest, DigestAlgorithm::Md5);
        assert_eq!(vendor.digest_prefix, "emqch");
        assert!(vendor.validate().is_ok());
    }

    #[test]
    fn test_admin_alias_for_internal() {
        let vendor: VendorConfig = toml::from_str(
            r#"
            company = "ops"
            type = "admin"
        "#,
        )
        .unwrap();
        assert_eq!(vendor.kind, VendorType::Internal);
    }

    #[test]
    fn test_unknown_vendor_type_rejected() {
        let result: Result<VendorConfig, _> = toml::from_str(
            r#"
            company = "snapp"
            type = "magic"
        "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_company_rejected() {
        let vendor: VendorConfig = toml::from_str(r#"company = " ""#).unwrap();
        assert!(matches!(vendor.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_algorithm_matches() {
        assert!(JwtAlgorithm::RS512.matches(jsonwebtoken::Algorithm::RS512));
        assert!(!JwtAlgorithm::RS512.matches(jsonwebtoken::Algorithm::RS256));
    }
}
