//! Access levels a client can request on, or be granted for, a topic.
//!
//! Brokers and configuration files spell access levels in several ways: the broker's numeric
//! codes (`"1"`, `"2"`, `"3"`), short config names (`sub`, `pub`, `pubsub`) and the long action
//! names (`subscribe`, `publish`). All of them parse into the same [`AccessType`].

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

/// Access level on a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessType {
    Subscribe,
    Publish,
    PublishSubscribe,
    None,
}

impl AccessType {
    /// Numeric code used by the broker's HTTP ACL hooks.
    pub fn code(self) -> &'static str {
        match self {
            AccessType::Subscribe => "1",
            AccessType::Publish => "2",
            AccessType::PublishSubscribe => "3",
            AccessType::None => "-1",
        }
    }

    /// Short name used in configuration files.
    pub fn short_name(self) -> &'static str {
        match self {
            AccessType::Subscribe => "sub",
            AccessType::Publish => "pub",
            AccessType::PublishSubscribe => "pubsub",
            AccessType::None => "none",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AccessType::Subscribe => "subscribe",
            AccessType::Publish => "publish",
            AccessType::PublishSubscribe => "publish-subscribe",
            AccessType::None => "none",
        }
    }

    /// Whether a grant of `self` satisfies a request for `requested`.
    ///
    /// `PublishSubscribe` satisfies every concrete request, `Publish` and `Subscribe` only
    /// satisfy themselves, and `None` satisfies nothing. A request for `None` is never satisfied.
    pub fn compatible(self, requested: AccessType) -> bool {
        match (self, requested) {
            (_, AccessType::None) | (AccessType::None, _) => false,
            (AccessType::PublishSubscribe, _) => true,
            (granted, requested) => granted == requested,
        }
    }

    /// Exact membership test against an allowed set.
    ///
    /// `PublishSubscribe` must be listed explicitly; allowing both `Publish` and `Subscribe` does
    /// not imply it.
    pub fn validate(self, allowed: &[AccessType]) -> bool {
        allowed.contains(&self)
    }
}

impl fmt::Display for AccessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid access type {0:?}")]
pub struct ParseAccessTypeError(pub String);

impl FromStr for AccessType {
    type Err = ParseAccessTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "sub" | "subscribe" => Ok(AccessType::Subscribe),
            "2" | "pub" | "publish" => Ok(AccessType::Publish),
            "3" | "pubsub" | "publish-subscribe" | "publish_subscribe" => {
                Ok(AccessType::PublishSubscribe)
            }
            "-1" | "none" => Ok(AccessType::None),
            _ => Err(ParseAccessTypeError(s.to_string())),
        }
    }
}

impl Serialize for AccessType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.short_name())
    }
}

impl<'de> Deserialize<'de> for AccessType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AccessTypeVisitor;

        impl de::Visitor<'_> for AccessTypeVisitor {
            type Value = AccessType;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an access type such as \"sub\", \"publish\" or 3")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<AccessType, E> {
                v.parse().map_err(E::custom)
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<AccessType, E> {
                self.visit_str(&v.to_string())
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<AccessType, E> {
                self.visit_str(&v.to_string())
            }
        }

        deserializer.deserialize_any(AccessTypeVisitor)
    }
}
