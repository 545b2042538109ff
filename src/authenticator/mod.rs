//! Token authentication and topic authorization per vendor.
//!
//! Each configured vendor gets one [`Authenticator`], chosen by its `type`:
//!
//! - `manual`: tokens are verified locally against per-issuer keys.
//! - `auto`: tokens are verified by the external validator service.
//! - `internal`: trusted callers share the `system` key and bypass ACL checks.
//!
//! The set is built once at startup by [`build_authenticators`] and never mutated.

mod admin;
mod auto;
mod builder;
mod error;
mod keys;
mod manual;
mod token;

use std::collections::HashMap;

pub use admin::{AdminAuthenticator, SYSTEM_ISSUER};
pub use auto::AutoAuthenticator;
pub use builder::{BuilderError, build_authenticators};
pub use error::AuthenticatorError;
pub use keys::KeySet;
pub use manual::ManualAuthenticator;
use tracing::debug;

use crate::{
    acl::AccessType,
    config::{JwtConfig, VendorType},
    topics::TopicManager,
};

/// Access and topic rules shared by the `manual` and `auto` variants.
#[derive(Debug)]
pub struct TenantPolicy {
    allowed_access_types: Vec<AccessType>,
    topics: TopicManager,
    iss_name: String,
    sub_name: String,
}

impl TenantPolicy {
    pub fn new(allowed_access_types: Vec<AccessType>, topics: TopicManager, jwt: &JwtConfig) -> Self {
        Self {
            allowed_access_types,
            topics,
            iss_name: jwt.iss_name.clone(),
            sub_name: jwt.sub_name.clone(),
        }
    }

    pub fn company(&self) -> &str {
        self.topics.company()
    }

    pub fn topics(&self) -> &TopicManager {
        &self.topics
    }

    pub fn allowed_access_types(&self) -> &[AccessType] {
        &self.allowed_access_types
    }

    pub fn check_access_type(&self, access: AccessType) -> Result<(), AuthenticatorError> {
        if access.validate(&self.allowed_access_types) {
            Ok(())
        } else {
            Err(AuthenticatorError::InvalidAccessType)
        }
    }

    pub fn issuer_and_subject(
        &self,
        claims: &token::Claims,
    ) -> Result<(String, String), AuthenticatorError> {
        token::issuer_and_subject(claims, &self.iss_name, &self.sub_name)
    }

    /// Resolve `topic` and check the matched rule grants `access` to `issuer`.
    pub fn authorize(
        &self,
        access: AccessType,
        issuer: &str,
        subject: &str,
        topic: &str,
    ) -> Result<(), AuthenticatorError> {
        let rule = self.topics.resolve(topic, issuer, subject).ok_or_else(|| {
            AuthenticatorError::InvalidTopic {
                topic: topic.to_string(),
            }
        })?;

        debug!(company = %self.company(), topic, topic_type = %rule.kind(), "Topic resolved");

        if !rule.has_access(issuer, access) {
            return Err(AuthenticatorError::TopicNotAllowed {
                issuer: issuer.to_string(),
                sub: subject.to_string(),
                access_type: access,
                topic: topic.to_string(),
                topic_type: rule.kind().to_string(),
            });
        }

        Ok(())
    }
}

/// One vendor's authenticator.
#[derive(Debug)]
pub enum Authenticator {
    Manual(ManualAuthenticator),
    Auto(AutoAuthenticator),
    Admin(AdminAuthenticator),
}

impl Authenticator {
    /// Check that `token` is valid for this vendor.
    pub async fn auth(&self, token: &str) -> Result<(), AuthenticatorError> {
        match self {
            Authenticator::Manual(a) => a.auth(token),
            Authenticator::Auto(a) => a.auth(token).await,
            Authenticator::Admin(a) => a.auth(token),
        }
    }

    /// Check that the bearer of `token` may perform `access` on `topic`. `Ok` means granted.
    pub async fn acl(
        &self,
        access: AccessType,
        token: &str,
        topic: &str,
    ) -> Result<(), AuthenticatorError> {
        match self {
            Authenticator::Manual(a) => a.acl(access, token, topic),
            Authenticator::Auto(a) => a.acl(access, token, topic).await,
            Authenticator::Admin(a) => a.acl(access, token, topic),
        }
    }

    pub fn company(&self) -> &str {
        match self {
            Authenticator::Manual(a) => a.policy().company(),
            Authenticator::Auto(a) => a.policy().company(),
            Authenticator::Admin(a) => a.company(),
        }
    }

    pub fn is_superuser(&self) -> bool {
        matches!(self, Authenticator::Admin(_))
    }

    pub fn kind(&self) -> VendorType {
        match self {
            Authenticator::Manual(_) => VendorType::Manual,
            Authenticator::Auto(_) => VendorType::Auto,
            Authenticator::Admin(_) => VendorType::Internal,
        }
    }

    /// Topic rules, for variants that resolve topics.
    pub fn policy(&self) -> Option<&TenantPolicy> {
        match self {
            Authenticator::Manual(a) => Some(a.policy()),
            Authenticator::Auto(a) => Some(a.policy()),
            Authenticator::Admin(_) => None,
        }
    }
}

/// All vendors' authenticators, keyed by company.
#[derive(Debug)]
pub struct Authenticators {
    by_company: HashMap<String, Authenticator>,
    default_vendor: String,
}

impl Authenticators {
    pub fn new(by_company: HashMap<String, Authenticator>, default_vendor: impl Into<String>) -> Self {
        Self {
            by_company,
            default_vendor: default_vendor.into(),
        }
    }

    /// Authenticator for `vendor`, falling back to the default vendor when it is empty or unknown.
    pub fn get(&self, vendor: &str) -> Option<&Authenticator> {
        self.by_company
            .get(vendor)
            .or_else(|| self.by_company.get(&self.default_vendor))
    }

    pub fn default_vendor(&self) -> &str {
        &self.default_vendor
    }

    /// Company names in sorted order.
    pub fn companies(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.by_company.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.by_company.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_company.is_empty()
    }
}
