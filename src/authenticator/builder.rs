use std::collections::{HashMap, hash_map::Entry};

use tracing::info;

use super::{
    AdminAuthenticator, Authenticator, Authenticators, AutoAuthenticator, ManualAuthenticator,
    SYSTEM_ISSUER, TenantPolicy, keys::KeySet,
};
use crate::{
    acl::AccessType,
    config::{GatewayConfig, JwtAlgorithm, VendorConfig, VendorType},
    topics::{TopicError, TopicManager},
    validator::{ValidatorClient, ValidatorError},
};

/// Fatal configuration problems found while building authenticators.
#[derive(Debug, thiserror::Error)]
pub enum BuilderError {
    #[error("at least one vendor must be configured")]
    NoAuthenticator,

    #[error("vendor {0} is configured more than once")]
    DuplicateCompany(String),

    #[error("internal vendor {company} requires a \"system\" key")]
    AdminAuthenticatorSystemKey { company: String },

    #[error("manual vendor {company} requires at least one key")]
    NoKeys { company: String },

    #[error("vendor {company}: iss_entity_map must contain a \"default\" entry")]
    MissingDefaultEntity { company: String },

    #[error("vendor {company}: iss_peer_map must contain a \"default\" entry")]
    MissingDefaultPeer { company: String },

    #[error("cannot read key of issuer {issuer}: {reason}")]
    InvalidKey { issuer: String, reason: String },

    #[error("signing method is not supported")]
    InvalidSigningMethod,

    #[error("vendor {company} requires jwt.signing_method")]
    MissingSigningMethod { company: String },

    #[error("vendor {company}: \"none\" cannot be an allowed access type")]
    InvalidAccessType { company: String },

    #[error("auto vendor {company} requires validator.url")]
    ValidatorNotConfigured { company: String },

    #[error("cannot create validator client: {0}")]
    Validator(#[from] ValidatorError),

    #[error("vendor {company}: {source}")]
    Topics {
        company: String,
        #[source]
        source: TopicError,
    },
}

/// Build one authenticator per configured vendor.
pub fn build_authenticators(config: &GatewayConfig) -> Result<Authenticators, BuilderError> {
    if config.vendors.is_empty() {
        return Err(BuilderError::NoAuthenticator);
    }

    let validator = ValidatorClient::from_config(&config.validator)?;

    let mut by_company = HashMap::with_capacity(config.vendors.len());
    for vendor in &config.vendors {
        let authenticator = build_authenticator(vendor, validator.as_ref())?;

        info!(
            company = %vendor.company,
            kind = vendor.kind.as_str(),
            topics = vendor.topics.len(),
            "Authenticator built"
        );

        match by_company.entry(vendor.company.clone()) {
            Entry::Occupied(_) => return Err(BuilderError::DuplicateCompany(vendor.company.clone())),
            Entry::Vacant(slot) => {
                slot.insert(authenticator);
            }
        }
    }

    Ok(Authenticators::new(by_company, config.default_vendor.clone()))
}

fn build_authenticator(
    vendor: &VendorConfig,
    validator: Option<&ValidatorClient>,
) -> Result<Authenticator, BuilderError> {
    match vendor.kind {
        VendorType::Internal => build_admin(vendor).map(Authenticator::Admin),
        VendorType::Manual => {
            let algorithm = signing_method(vendor)?;
            check_mappers(vendor)?;

            let keys = KeySet::from_raw(algorithm, &vendor.keys)?;
            if keys.is_empty() {
                return Err(BuilderError::NoKeys {
                    company: vendor.company.clone(),
                });
            }

            Ok(Authenticator::Manual(ManualAuthenticator::new(
                build_policy(vendor)?,
                keys,
            )))
        }
        VendorType::Auto => {
            let validator = validator.ok_or_else(|| BuilderError::ValidatorNotConfigured {
                company: vendor.company.clone(),
            })?;
            if !vendor.topics.is_empty() {
                check_mappers(vendor)?;
            }

            Ok(Authenticator::Auto(AutoAuthenticator::new(
                build_policy(vendor)?,
                validator.clone(),
                vendor.jwt.signing_method,
                vendor.blacklist.as_ref(),
            )))
        }
    }
}

fn build_admin(vendor: &VendorConfig) -> Result<AdminAuthenticator, BuilderError> {
    let algorithm = signing_method(vendor)?;

    let raw = vendor
        .keys
        .get(SYSTEM_ISSUER)
        .ok_or_else(|| BuilderError::AdminAuthenticatorSystemKey {
            company: vendor.company.clone(),
        })?;
    let system = HashMap::from([(SYSTEM_ISSUER.to_string(), raw.clone())]);
    let keys = KeySet::from_raw(algorithm, &system)?;
    let key = keys
        .get(SYSTEM_ISSUER)
        .cloned()
        .ok_or_else(|| BuilderError::AdminAuthenticatorSystemKey {
            company: vendor.company.clone(),
        })?;

    Ok(AdminAuthenticator::new(
        vendor.company.clone(),
        key,
        algorithm,
        vendor.jwt.iss_name.clone(),
    ))
}

fn build_policy(vendor: &VendorConfig) -> Result<TenantPolicy, BuilderError> {
    if vendor.allowed_access_types.contains(&AccessType::None) {
        return Err(BuilderError::InvalidAccessType {
            company: vendor.company.clone(),
        });
    }

    let topics = TopicManager::new(vendor).map_err(|source| BuilderError::Topics {
        company: vendor.company.clone(),
        source,
    })?;

    Ok(TenantPolicy::new(
        vendor.allowed_access_types.clone(),
        topics,
        &vendor.jwt,
    ))
}

fn signing_method(vendor: &VendorConfig) -> Result<JwtAlgorithm, BuilderError> {
    vendor
        .jwt
        .signing_method
        .ok_or_else(|| BuilderError::MissingSigningMethod {
            company: vendor.company.clone(),
        })
}

fn check_mappers(vendor: &VendorConfig) -> Result<(), BuilderError> {
    if !vendor.iss_entity_map.contains_key("default") {
        return Err(BuilderError::MissingDefaultEntity {
            company: vendor.company.clone(),
        });
    }
    if !vendor.iss_peer_map.contains_key("default") {
        return Err(BuilderError::MissingDefaultPeer {
            company: vendor.company.clone(),
        });
    }
    Ok(())
}
