use jsonwebtoken::DecodingKey;

use super::{AuthenticatorError, token};
use crate::{acl::AccessType, config::JwtAlgorithm};

/// Issuer whose key internal callers share.
pub const SYSTEM_ISSUER: &str = "system";

/// Trusted internal callers holding the shared `system` key.
///
/// Authenticated callers are superusers: every ACL check passes.
pub struct AdminAuthenticator {
    company: String,
    key: DecodingKey,
    algorithm: JwtAlgorithm,
    iss_name: String,
}

impl std::fmt::Debug for AdminAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminAuthenticator")
            .field("company", &self.company)
            .field("algorithm", &self.algorithm)
            .field("iss_name", &self.iss_name)
            .finish_non_exhaustive()
    }
}

impl AdminAuthenticator {
    pub fn new(
        company: impl Into<String>,
        key: DecodingKey,
        algorithm: JwtAlgorithm,
        iss_name: impl Into<String>,
    ) -> Self {
        Self {
            company: company.into(),
            key,
            algorithm,
            iss_name: iss_name.into(),
        }
    }

    pub fn company(&self) -> &str {
        &self.company
    }

    pub fn auth(&self, token: &str) -> Result<(), AuthenticatorError> {
        token::check_signing_method(token, self.algorithm)?;

        let claims = token::unverified_claims(token)?;
        if token::claim_string(&claims, &self.iss_name).is_none() {
            return Err(AuthenticatorError::IssNotFound);
        }

        token::verify(token, &self.key, self.algorithm.to_jwt_algorithm())?;
        Ok(())
    }

    pub fn acl(
        &self,
        _access: AccessType,
        _token: &str,
        _topic: &str,
    ) -> Result<(), AuthenticatorError> {
        Ok(())
    }
}
