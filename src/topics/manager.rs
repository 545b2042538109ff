use std::collections::HashMap;

use dashmap::DashMap;
use md5::Md5;
use regex::Regex;
use sha2::{Digest as _, Sha256};
use tracing::debug;

use super::{
    codec::{CodecError, IdentifierCodec},
    template::{Function, RenderError, Resolver, Template, TemplateError, Variable},
};
use crate::{
    acl::AccessType,
    config::{DigestAlgorithm, VendorConfig},
};

const DEFAULT_ISSUER: &str = "default";

/// Errors raised while compiling a vendor's topic catalog.
#[derive(Debug, thiserror::Error)]
pub enum TopicError {
    #[error("invalid hash id parameters for issuer {issuer}: {source}")]
    Codec {
        issuer: String,
        #[source]
        source: CodecError,
    },

    #[error("invalid template for topic type {topic_type}: {source}")]
    Template {
        topic_type: String,
        #[source]
        source: TemplateError,
    },

    #[error("template for topic type {topic_type} does not render a valid pattern: {source}")]
    InvalidPattern {
        topic_type: String,
        #[source]
        source: regex::Error,
    },
}

/// One compiled catalog entry.
#[derive(Debug)]
pub struct TopicRule {
    kind: String,
    template: Template,
    accesses: HashMap<String, AccessType>,
}

impl TopicRule {
    /// Type tag reported for topics this rule governs.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Whether `issuer` was granted an access compatible with `requested`.
    ///
    /// Issuers missing from the rule's grants are denied.
    pub fn has_access(&self, issuer: &str, requested: AccessType) -> bool {
        self.accesses
            .get(issuer)
            .is_some_and(|granted| granted.compatible(requested))
    }
}

/// Maps literal topic names to the vendor rule they satisfy.
///
/// Everything except the pattern cache is fixed at construction, so a manager can be shared
/// across any number of concurrent requests.
#[derive(Debug)]
pub struct TopicManager {
    company: String,
    rules: Vec<TopicRule>,
    codecs: HashMap<String, IdentifierCodec>,
    entity_map: HashMap<String, String>,
    peer_map: HashMap<String, String>,
    digest: DigestAlgorithm,
    digest_prefix: String,
    patterns: DashMap<String, Regex>,
    pattern_cache_size: usize,
}

impl TopicManager {
    pub fn new(vendor: &VendorConfig) -> Result<Self, TopicError> {
        let codecs = vendor
            .hash_id_map
            .iter()
            .map(|(issuer, params)| {
                IdentifierCodec::new(params)
                    .map(|codec| (issuer.clone(), codec))
                    .map_err(|source| TopicError::Codec {
                        issuer: issuer.clone(),
                        source,
                    })
            })
            .collect::<Result<HashMap<_, _>, _>>()?;

        let rules = vendor
            .topics
            .iter()
            .map(|topic| {
                let template =
                    Template::parse(&topic.template).map_err(|source| TopicError::Template {
                        topic_type: topic.kind.clone(),
                        source,
                    })?;

                // Rules that grant nothing are never evaluated for access, skip the probe.
                if topic.accesses.values().any(|a| *a != AccessType::None) {
                    Regex::new(&anchored(&template.probe())).map_err(|source| {
                        TopicError::InvalidPattern {
                            topic_type: topic.kind.clone(),
                            source,
                        }
                    })?;
                }

                Ok(TopicRule {
                    kind: topic.kind.clone(),
                    template,
                    accesses: topic.accesses.clone(),
                })
            })
            .collect::<Result<Vec<_>, TopicError>>()?;

        Ok(Self {
            company: vendor.company.clone(),
            rules,
            codecs,
            entity_map: vendor.iss_entity_map.clone(),
            peer_map: vendor.iss_peer_map.clone(),
            digest: vendor.digest,
            digest_prefix: vendor.digest_prefix.clone(),
            patterns: DashMap::new(),
            pattern_cache_size: vendor.pattern_cache_size,
        })
    }

    pub fn company(&self) -> &str {
        &self.company
    }

    pub fn rules(&self) -> &[TopicRule] {
        &self.rules
    }

    /// Find the first rule, in declaration order, whose rendered pattern matches `topic` in full.
    ///
    /// A rule that cannot be rendered for this issuer and subject is skipped.
    pub fn resolve(&self, topic: &str, issuer: &str, subject: &str) -> Option<&TopicRule> {
        let context = RenderContext {
            manager: self,
            issuer,
            subject,
        };

        self.rules.iter().find(|rule| {
            match rule.template.render(&context) {
                Ok(pattern) => self.is_match(&anchored(&pattern), topic),
                Err(e) => {
                    debug!(
                        company = %self.company,
                        topic_type = %rule.kind,
                        issuer,
                        error = %e,
                        "Topic rule skipped"
                    );
                    false
                }
            }
        })
    }

    /// Topic segment naming the issuer's actor class.
    pub fn entity_of(&self, issuer: &str) -> Result<String, RenderError> {
        lookup(&self.entity_map, issuer, "entity")
    }

    /// Topic segment naming the issuer's counterpart.
    pub fn peer_of(&self, issuer: &str) -> Result<String, RenderError> {
        lookup(&self.peer_map, issuer, "peer")
    }

    pub fn decode_id(&self, value: &str, issuer: &str) -> Result<u64, RenderError> {
        let codec = self
            .codecs
            .get(issuer)
            .ok_or_else(|| RenderError::MissingCodec(issuer.to_string()))?;
        Ok(codec.decode(value)?)
    }

    /// Lowercase hex digest of `"{prefix}-{value}"`.
    pub fn digest(&self, value: &str) -> String {
        let input = format!("{}-{}", self.digest_prefix, value);
        match self.digest {
            DigestAlgorithm::Md5 => hex::encode(Md5::digest(input.as_bytes())),
            DigestAlgorithm::Sha256 => hex::encode(Sha256::digest(input.as_bytes())),
        }
    }

    fn is_match(&self, pattern: &str, topic: &str) -> bool {
        if let Some(regex) = self.patterns.get(pattern) {
            return regex.is_match(topic);
        }

        let regex = match Regex::new(pattern) {
            Ok(regex) => regex,
            Err(e) => {
                debug!(company = %self.company, pattern, error = %e, "Rendered pattern is not a valid regex");
                return false;
            }
        };

        let matched = regex.is_match(topic);
        if self.patterns.len() < self.pattern_cache_size {
            self.patterns.insert(pattern.to_string(), regex);
        }
        matched
    }

    #[cfg(test)]
    fn cached_patterns(&self) -> usize {
        self.patterns.len()
    }
}

fn anchored(pattern: &str) -> String {
    format!("^(?:{pattern})$")
}

fn lookup(
    map: &HashMap<String, String>,
    issuer: &str,
    name: &'static str,
) -> Result<String, RenderError> {
    map.get(issuer)
        .or_else(|| map.get(DEFAULT_ISSUER))
        .cloned()
        .ok_or_else(|| RenderError::Unmapped {
            issuer: issuer.to_string(),
            map: name,
        })
}

struct RenderContext<'a> {
    manager: &'a TopicManager,
    issuer: &'a str,
    subject: &'a str,
}

impl Resolver for RenderContext<'_> {
    fn variable(&self, variable: Variable) -> Result<String, RenderError> {
        match variable {
            Variable::Company => Ok(self.manager.company.clone()),
            Variable::Iss => Ok(self.issuer.to_string()),
            Variable::Sub => Ok(self.subject.to_string()),
            Variable::Entity => self.manager.entity_of(self.issuer),
            Variable::Peer => self.manager.peer_of(self.issuer),
        }
    }

    fn call(&self, function: Function, args: &[String]) -> Result<String, RenderError> {
        match (function, args) {
            (Function::EntityOf, [issuer]) => self.manager.entity_of(issuer),
            (Function::PeerOf, [issuer]) => self.manager.peer_of(issuer),
            (Function::DecodeId, [value, issuer]) => {
                self.manager.decode_id(value, issuer).map(|id| id.to_string())
            }
            (Function::Digest, [value]) => Ok(self.manager.digest(value)),
            _ => Err(RenderError::Arity {
                function: function.name(),
                found: args.len(),
            }),
        }
    }
}
