use std::collections::HashSet;

use tracing::warn;

use super::{AuthenticatorError, TenantPolicy, token};
use crate::{
    acl::AccessType,
    config::{BlacklistConfig, JwtAlgorithm},
    validator::{Payload, ValidatorClient},
};

/// Delegates token verification to the external validator.
///
/// Issuer and subject are still read from the token locally to resolve topics.
#[derive(Debug)]
pub struct AutoAuthenticator {
    policy: TenantPolicy,
    validator: ValidatorClient,
    signing_method: Option<JwtAlgorithm>,
    blacklist: Blacklist,
}

impl AutoAuthenticator {
    pub fn new(
        policy: TenantPolicy,
        validator: ValidatorClient,
        signing_method: Option<JwtAlgorithm>,
        blacklist: Option<&BlacklistConfig>,
    ) -> Self {
        Self {
            policy,
            validator,
            signing_method,
            blacklist: blacklist.map(Blacklist::from).unwrap_or_default(),
        }
    }

    pub fn policy(&self) -> &TenantPolicy {
        &self.policy
    }

    pub async fn auth(&self, token: &str) -> Result<(), AuthenticatorError> {
        let payload = self.validate(token).await?;

        if self.blacklist.has_user_id(&payload) {
            warn!(
                company = %self.policy.company(),
                issuer = payload.iss,
                user_id = payload.user_id,
                sub = %payload.sub,
                sid = %payload.sid,
                "Blacklisted user is requesting"
            );
        }

        Ok(())
    }

    pub async fn acl(
        &self,
        access: AccessType,
        token: &str,
        topic: &str,
    ) -> Result<(), AuthenticatorError> {
        self.policy.check_access_type(access)?;

        self.validate(token).await?;

        let claims = token::unverified_claims(token)?;
        let (issuer, subject) = self.policy.issuer_and_subject(&claims)?;

        if self.blacklist.has_hashed_id(&issuer, &subject) {
            warn!(
                company = %self.policy.company(),
                issuer = %issuer,
                sub = %subject,
                topic,
                "Blacklisted user is requesting"
            );
        }

        self.policy.authorize(access, &issuer, &subject, topic)
    }

    async fn validate(&self, token: &str) -> Result<Payload, AuthenticatorError> {
        if let Some(method) = self.signing_method {
            token::check_signing_method(token, method)?;
        }
        Ok(self.validator.validate(token).await?)
    }
}

#[derive(Debug, Default)]
struct Blacklist {
    issuer: String,
    user_ids: HashSet<u64>,
    hashed_ids: HashSet<String>,
}

impl From<&BlacklistConfig> for Blacklist {
    fn from(config: &BlacklistConfig) -> Self {
        Self {
            issuer: config.issuer.clone(),
            user_ids: config.user_ids.iter().copied().collect(),
            hashed_ids: config.hashed_ids.iter().cloned().collect(),
        }
    }
}

impl Blacklist {
    fn has_user_id(&self, payload: &Payload) -> bool {
        payload.iss.to_string() == self.issuer
            && u64::try_from(payload.user_id).is_ok_and(|id| self.user_ids.contains(&id))
    }

    fn has_hashed_id(&self, issuer: &str, subject: &str) -> bool {
        issuer == self.issuer && self.hashed_ids.contains(subject)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blacklist() -> Blacklist {
        Blacklist::from(&BlacklistConfig {
            issuer: "1".to_string(),
            user_ids: vec![42],
            hashed_ids: vec!["DXKgaNQa7N5Y7bo".to_string()],
        })
    }

    #[test]
    fn test_blacklist_by_user_id() {
        let list = blacklist();
        let mut payload = Payload {
            iss: 1,
            user_id: 42,
            ..Payload::default()
        };
        assert!(list.has_user_id(&payload));

        payload.iss = 0;
        assert!(!list.has_user_id(&payload));

        payload.iss = 1;
        payload.user_id = -42;
        assert!(!list.has_user_id(&payload));
    }

    #[test]
    fn test_blacklist_by_hashed_id() {
        let list = blacklist();
        assert!(list.has_hashed_id("1", "DXKgaNQa7N5Y7bo"));
        assert!(!list.has_hashed_id("0", "DXKgaNQa7N5Y7bo"));
        assert!(!list.has_hashed_id("1", "other"));
    }

    #[test]
    fn test_empty_blacklist_matches_nothing() {
        let list = Blacklist::default();
        assert!(!list.has_hashed_id("", ""));
        assert!(!list.has_user_id(&Payload::default()));
    }
}
