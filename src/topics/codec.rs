//! Reversible, salted obfuscation of numeric ids.
//!
//! Subjects such as `DXKgaNQa7N5Y7bo` are hashids of a numeric user id. The bit-level algorithm is
//! delegated to [`harsh`]; this module only fixes the contract the topic engine relies on: a
//! value decodes when it yields exactly one id and re-encodes to itself.

use std::panic;

use harsh::Harsh;

use crate::config::HashIdConfig;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("invalid identifier codec parameters: {0}")]
    Build(String),

    #[error("cannot decode identifier {value:?}: {reason}")]
    Decode { value: String, reason: String },
}

/// Encoder/decoder for one issuer's obfuscated ids.
pub struct IdentifierCodec {
    harsh: Harsh,
    /// Length of the longest canonical encoding, that of `u64::MAX`.
    max_len: usize,
}

impl std::fmt::Debug for IdentifierCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentifierCodec").finish_non_exhaustive()
    }
}

impl IdentifierCodec {
    pub fn new(params: &HashIdConfig) -> Result<Self, CodecError> {
        let mut builder = Harsh::builder()
            .salt(params.salt.as_bytes())
            .length(params.length);

        if let Some(alphabet) = params.alphabet.as_deref().filter(|a| !a.is_empty()) {
            builder = builder.alphabet(alphabet.as_bytes());
        }

        let harsh = builder
            .build()
            .map_err(|e| CodecError::Build(e.to_string()))?;

        let max_len = harsh.encode(&[u64::MAX]).len();
        Ok(Self { harsh, max_len })
    }

    pub fn encode(&self, id: u64) -> String {
        self.harsh.encode(&[id])
    }

    pub fn decode(&self, value: &str) -> Result<u64, CodecError> {
        let decode_error = |reason: &str| CodecError::Decode {
            value: value.to_string(),
            reason: reason.to_string(),
        };

        if value.len() > self.max_len {
            return Err(decode_error("longer than any encoded number"));
        }

        // harsh accumulates digits with unchecked arithmetic, so values that do not fit a u64
        // panic in builds with overflow checks.
        let ids = panic::catch_unwind(|| self.harsh.decode(value))
            .map_err(|_| decode_error("number out of range"))?
            .map_err(|e| decode_error(&e.to_string()))?;

        let [id] = ids.as_slice() else {
            return Err(decode_error("expected exactly one encoded number"));
        };

        // Reject non-canonical spellings that happen to decode.
        if self.encode(*id) != value {
            return Err(decode_error("checksum mismatch"));
        }

        Ok(*id)
    }
}
