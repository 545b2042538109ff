use jsonwebtoken::errors::ErrorKind;

use crate::{acl::AccessType, validator::ValidatorError};

/// Why a token or an ACL request was rejected.
///
/// Every variant maps to a stable [`status_label`](Self::status_label) used as a metrics label.
#[derive(Debug, thiserror::Error)]
pub enum AuthenticatorError {
    #[error("token signing method does not match the configured method")]
    InvalidSigningMethod,

    #[error("could not find iss in token claims")]
    IssNotFound,

    #[error("could not find sub in token claims")]
    SubNotFound,

    #[error("invalid token claims")]
    InvalidClaims,

    #[error("requested access type is not allowed")]
    InvalidAccessType,

    #[error("cannot find issuer {issuer} key")]
    KeyNotFound { issuer: String },

    #[error("token is invalid: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    #[error("token is invalid: {0}")]
    Validator(#[from] ValidatorError),

    #[error("provided topic {topic} is not valid")]
    InvalidTopic { topic: String },

    #[error("issuer {issuer} with sub {sub} is not allowed to {access_type} on topic {topic} ({topic_type})")]
    TopicNotAllowed {
        issuer: String,
        sub: String,
        access_type: AccessType,
        topic: String,
        topic_type: String,
    },
}

impl AuthenticatorError {
    pub fn status_label(&self) -> &'static str {
        match self {
            AuthenticatorError::InvalidSigningMethod => "err_invalid_signing_method",
            AuthenticatorError::IssNotFound => "err_iss_not_found",
            AuthenticatorError::SubNotFound => "err_sub_not_found",
            AuthenticatorError::InvalidClaims => "err_invalid_claims",
            AuthenticatorError::InvalidAccessType => "err_invalid_access_type",
            AuthenticatorError::KeyNotFound { .. } => "key_not_found_error",
            AuthenticatorError::InvalidToken(e) => match e.kind() {
                ErrorKind::InvalidSignature => "err_invalid_signature",
                ErrorKind::ExpiredSignature => "err_token_expired",
                _ => "err_invalid_token",
            },
            AuthenticatorError::Validator(_) => "err_validator",
            AuthenticatorError::InvalidTopic { .. } => "invalid_topic_error",
            AuthenticatorError::TopicNotAllowed { .. } => "topic_not_allowed_error",
        }
    }

    /// Expired tokens are routine and logged quieter than other failures.
    pub fn is_expired(&self) -> bool {
        matches!(self, AuthenticatorError::InvalidToken(e) if matches!(e.kind(), ErrorKind::ExpiredSignature))
    }

    /// Authorization denials, as opposed to authentication failures.
    pub fn is_denial(&self) -> bool {
        matches!(
            self,
            AuthenticatorError::InvalidTopic { .. } | AuthenticatorError::TopicNotAllowed { .. }
        )
    }
}
