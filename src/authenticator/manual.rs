use super::{
    AuthenticatorError, TenantPolicy,
    keys::KeySet,
    token::{self, Claims},
};
use crate::acl::AccessType;

/// Verifies tokens locally against per-issuer keys.
#[derive(Debug)]
pub struct ManualAuthenticator {
    policy: TenantPolicy,
    keys: KeySet,
}

impl ManualAuthenticator {
    pub fn new(policy: TenantPolicy, keys: KeySet) -> Self {
        Self { policy, keys }
    }

    pub fn policy(&self) -> &TenantPolicy {
        &self.policy
    }

    pub fn keys(&self) -> &KeySet {
        &self.keys
    }

    pub fn auth(&self, token: &str) -> Result<(), AuthenticatorError> {
        self.verify(token).map(|_| ())
    }

    pub fn acl(
        &self,
        access: AccessType,
        token: &str,
        topic: &str,
    ) -> Result<(), AuthenticatorError> {
        self.policy.check_access_type(access)?;

        let claims = self.verify(token)?;
        let (issuer, subject) = self.policy.issuer_and_subject(&claims)?;

        self.policy.authorize(access, &issuer, &subject, topic)
    }

    /// Pick the issuer's key from the unverified claims, then verify with it.
    fn verify(&self, token: &str) -> Result<Claims, AuthenticatorError> {
        token::check_signing_method(token, self.keys.algorithm())?;

        let claims = token::unverified_claims(token)?;
        let (issuer, _) = self.policy.issuer_and_subject(&claims)?;

        let key = self
            .keys
            .get(&issuer)
            .ok_or(AuthenticatorError::KeyNotFound { issuer })?;

        token::verify(token, key, self.keys.algorithm().to_jwt_algorithm())
    }
}
