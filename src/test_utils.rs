//! Shared fixtures for unit and scenario tests.

use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde_json::Value;

use crate::{
    AppState,
    authenticator::build_authenticators,
    build_app,
    config::{
        GatewayConfig, HashIdConfig, ObservabilityConfig, ServerConfig, ValidatorConfig,
        VendorConfig,
    },
    topics::IdentifierCodec,
};

pub const ISSUER_A_PRIVATE: &str = include_str!("../tests/fixtures/keys/issuer_a.pem");
pub const ISSUER_A_PUBLIC: &str = include_str!("../tests/fixtures/keys/issuer_a.pub.pem");
pub const ISSUER_B_PRIVATE: &str = include_str!("../tests/fixtures/keys/issuer_b.pem");
pub const ISSUER_B_PUBLIC: &str = include_str!("../tests/fixtures/keys/issuer_b.pub.pem");
pub const ISSUER_EC_PRIVATE: &str = include_str!("../tests/fixtures/keys/issuer_ec.pem");
pub const ISSUER_EC_PUBLIC: &str = include_str!("../tests/fixtures/keys/issuer_ec.pub.pem");

/// Shared secret of the `admin` fixture vendor (`c2VjcmV0` in base64).
pub const ADMIN_SECRET: &[u8] = b"secret";

pub const DRIVER_SALT: &str = "driver-salt";
pub const PASSENGER_SALT: &str = "passenger-salt";

pub fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

pub fn sign(algorithm: Algorithm, key: &EncodingKey, claims: &Value) -> String {
    encode(&Header::new(algorithm), claims, key).unwrap()
}

/// RS512 token signed with issuer A's key.
pub fn rsa_token(claims: &Value) -> String {
    sign_rsa(ISSUER_A_PRIVATE, claims)
}

pub fn sign_rsa(private_pem: &str, claims: &Value) -> String {
    let key = EncodingKey::from_rsa_pem(private_pem.as_bytes()).unwrap();
    sign(Algorithm::RS512, &key, claims)
}

/// HS512 token signed with `secret`.
pub fn hmac_token(secret: &[u8], claims: &Value) -> String {
    sign(Algorithm::HS512, &EncodingKey::from_secret(secret), claims)
}

pub fn driver_codec() -> IdentifierCodec {
    codec(DRIVER_SALT)
}

pub fn passenger_codec() -> IdentifierCodec {
    codec(PASSENGER_SALT)
}

fn codec(salt: &str) -> IdentifierCodec {
    IdentifierCodec::new(&HashIdConfig {
        salt: salt.to_string(),
        length: 15,
        alphabet: None,
    })
    .unwrap()
}

const SNAPP_VENDOR: &str = r#"
    company = "snapp"
    type = "manual"
    allowed_access_types = ["sub", "pub"]
    iss_entity_map = { default = "", "0" = "driver", "1" = "passenger" }
    iss_peer_map = { default = "", "0" = "passenger", "1" = "driver" }

    [jwt]
    signing_method = "RS512"

    [hash_id_map.0]
    salt = "driver-salt"
    length = 15

    [hash_id_map.1]
    salt = "passenger-salt"
    length = 15

    [[topics]]
    type = "cab_event"
    template = "^{{entity}}-event-{{Digest(DecodeId(sub, iss))}}$"
    accesses = { "0" = "sub", "1" = "sub" }

    [[topics]]
    type = "driver_location"
    template = "^{{company}}/driver/{{sub}}/location$"
    accesses = { "0" = "pub", "1" = "none" }

    [[topics]]
    type = "passenger_location"
    template = "^{{company}}/passenger/{{sub}}/location$"
    accesses = { "0" = "none", "1" = "pub" }

    [[topics]]
    type = "superapp_event"
    template = "^{{company}}/{{entity}}/{{Digest(DecodeId(sub, iss))}}/superapp$"
    accesses = { "0" = "sub", "1" = "sub" }

    [[topics]]
    type = "box_event"
    template = "^bucks$"
    accesses = { "0" = "sub", "1" = "sub" }

    [[topics]]
    type = "shared_location"
    template = "^{{company}}/{{entity}}/{{sub}}/{{peer}}-location$"
    accesses = { "0" = "sub", "1" = "sub" }

    [[topics]]
    type = "chat"
    template = "^{{company}}/{{entity}}/{{sub}}/chat$"
    accesses = { "0" = "sub", "1" = "sub" }

    [[topics]]
    type = "general_call_entry"
    template = "^shared/{{company}}/{{entity}}/{{sub}}/call/send$"
    accesses = { "0" = "pub", "1" = "pub" }

    [[topics]]
    type = "node_call_entry"
    template = "^{{company}}/{{entity}}/{{sub}}/call/[a-zA-Z0-9_-]+/send$"
    accesses = { "0" = "pub", "1" = "pub" }

    [[topics]]
    type = "call_outgoing"
    template = "^{{company}}/{{entity}}/{{sub}}/call/receive$"
    accesses = { "0" = "sub", "1" = "sub" }
"#;

/// Manual RS512 vendor: issuer `0` (driver) signs with key A, issuer `1` (passenger) with key B.
pub fn snapp_vendor() -> VendorConfig {
    let mut vendor: VendorConfig = toml::from_str(SNAPP_VENDOR).unwrap();
    vendor.keys.insert("0".to_string(), ISSUER_A_PUBLIC.to_string());
    vendor.keys.insert("1".to_string(), ISSUER_B_PUBLIC.to_string());
    vendor
}

/// Internal HS512 vendor keyed by [`ADMIN_SECRET`].
pub fn admin_vendor() -> VendorConfig {
    toml::from_str(
        r#"
        company = "admin"
        type = "internal"
        keys = { system = "c2VjcmV0" }

        [jwt]
        signing_method = "HS512"
    "#,
    )
    .unwrap()
}

/// Gateway config whose default vendor is the first of `vendors`.
pub fn gateway_config(vendors: Vec<VendorConfig>) -> GatewayConfig {
    GatewayConfig {
        default_vendor: vendors
            .first()
            .map(|v| v.company.clone())
            .unwrap_or_default(),
        server: ServerConfig::default(),
        observability: ObservabilityConfig::default(),
        validator: ValidatorConfig::default(),
        vendors,
    }
}

/// State for a gateway serving [`snapp_vendor`] (the default) and [`admin_vendor`].
pub fn test_state() -> AppState {
    let config = gateway_config(vec![snapp_vendor(), admin_vendor()]);
    let authenticators = build_authenticators(&config).unwrap();
    AppState::new(config, authenticators)
}

pub fn test_app() -> axum::Router {
    build_app(test_state())
}
