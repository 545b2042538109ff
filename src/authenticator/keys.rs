//! Verification key material.

use std::collections::HashMap;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use jsonwebtoken::DecodingKey;

use super::BuilderError;
use crate::config::JwtAlgorithm;

/// Issuer to verification key for a single signing method.
#[derive(Clone)]
pub struct KeySet {
    algorithm: JwtAlgorithm,
    keys: HashMap<String, DecodingKey>,
}

impl std::fmt::Debug for KeySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut issuers: Vec<_> = self.keys.keys().collect();
        issuers.sort();
        f.debug_struct("KeySet")
            .field("algorithm", &self.algorithm)
            .field("issuers", &issuers)
            .finish()
    }
}

impl KeySet {
    /// Materialize raw keys: PEM public keys for `RS*`, `PS*` and `ES*`, standard base64 secrets
    /// for `HS*`.
    pub fn from_raw(
        algorithm: JwtAlgorithm,
        raw: &HashMap<String, String>,
    ) -> Result<Self, BuilderError> {
        let keys = raw
            .iter()
            .map(|(issuer, material)| {
                decoding_key(algorithm, material.trim())
                    .map(|key| (issuer.clone(), key))
                    .map_err(|reason| match reason {
                        KeyError::UnsupportedAlgorithm => BuilderError::InvalidSigningMethod,
                        KeyError::Malformed(reason) => BuilderError::InvalidKey {
                            issuer: issuer.clone(),
                            reason,
                        },
                    })
            })
            .collect::<Result<HashMap<_, _>, _>>()?;

        Ok(Self { algorithm, keys })
    }

    pub fn algorithm(&self) -> JwtAlgorithm {
        self.algorithm
    }

    pub fn get(&self, issuer: &str) -> Option<&DecodingKey> {
        self.keys.get(issuer)
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }
}

enum KeyError {
    UnsupportedAlgorithm,
    Malformed(String),
}

fn decoding_key(algorithm: JwtAlgorithm, material: &str) -> Result<DecodingKey, KeyError> {
    use JwtAlgorithm::*;

    let key = match algorithm {
        RS256 | RS384 | RS512 | PS256 | PS384 | PS512 => {
            DecodingKey::from_rsa_pem(material.as_bytes())
        }
        ES256 | ES384 => DecodingKey::from_ec_pem(material.as_bytes()),
        HS256 | HS384 | HS512 => {
            let secret = STANDARD
                .decode(material)
                .map_err(|e| KeyError::Malformed(format!("invalid base64 secret: {e}")))?;
            Ok(DecodingKey::from_secret(&secret))
        }
        EdDSA => return Err(KeyError::UnsupportedAlgorithm),
    };

    key.map_err(|e| KeyError::Malformed(e.to_string()))
}
