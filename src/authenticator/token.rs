//! Token parsing and verification helpers shared by the authenticator variants.

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde_json::{Map, Value};

use super::AuthenticatorError;
use crate::config::JwtAlgorithm;

pub type Claims = Map<String, Value>;

/// Reject tokens whose header names a different algorithm than the vendor's.
pub fn check_signing_method(token: &str, expected: JwtAlgorithm) -> Result<(), AuthenticatorError> {
    let header = decode_header(token)?;
    if !expected.matches(header.alg) {
        return Err(AuthenticatorError::InvalidSigningMethod);
    }
    Ok(())
}

/// Read the claims without checking the signature or expiry.
///
/// Used to find the issuer before its key is known, and by vendors whose tokens are verified
/// remotely.
pub fn unverified_claims(token: &str) -> Result<Claims, AuthenticatorError> {
    let header = decode_header(token).map_err(|_| AuthenticatorError::InvalidClaims)?;

    let mut validation = Validation::new(header.alg);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
        .map_err(|_| AuthenticatorError::InvalidClaims)
}

/// Verify the signature, and `exp`/`nbf` when present, then return the claims.
pub fn verify(
    token: &str,
    key: &DecodingKey,
    algorithm: Algorithm,
) -> Result<Claims, AuthenticatorError> {
    let mut validation = Validation::new(algorithm);
    validation.validate_aud = false;
    validation.validate_nbf = true;
    validation.required_spec_claims.clear();

    Ok(decode::<Claims>(token, key, &validation)?.claims)
}

/// Claim value as a string.
///
/// Numbers and booleans are rendered in decimal/literal form. Absent, null, empty-string and
/// structured values count as missing.
pub fn claim_string(claims: &Claims, name: &str) -> Option<String> {
    match claims.get(name)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Issuer and subject claims, in that order of checking.
pub fn issuer_and_subject(
    claims: &Claims,
    iss_name: &str,
    sub_name: &str,
) -> Result<(String, String), AuthenticatorError> {
    let issuer = claim_string(claims, iss_name).ok_or(AuthenticatorError::IssNotFound)?;
    let subject = claim_string(claims, sub_name).ok_or(AuthenticatorError::SubNotFound)?;
    Ok((issuer, subject))
}
