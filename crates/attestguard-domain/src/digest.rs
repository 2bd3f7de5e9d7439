use attestguard_types::{LoadError, ids};
use sha2::{Digest, Sha256};
use std::fmt;

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// A content digest a reference was pinned to (`@sha256:<hex>`).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PinnedDigest(String);

impl PinnedDigest {
    /// Parse `sha256:<64 hex chars>`. Hex is normalized to lowercase.
    pub fn parse(s: &str) -> Result<Self, String> {
        let Some((algo, hex_part)) = s.split_once(':') else {
            return Err(format!("digest {s:?} is missing an algorithm prefix"));
        };
        if algo != ids::DIGEST_SHA256 {
            return Err(format!("unsupported digest algorithm {algo:?}"));
        }
        if hex_part.len() != 64 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(format!("digest {s:?} is not 64 hex characters"));
        }
        Ok(Self(hex_part.to_ascii_lowercase()))
    }

    pub fn hex(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PinnedDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", ids::DIGEST_SHA256, self.0)
    }
}

/// Recompute the digest of `bytes` and compare it with the pinned value.
///
/// Returns the computed `sha256:<hex>` on success.
pub fn verify_digest(pinned: Option<&PinnedDigest>, bytes: &[u8]) -> Result<String, LoadError> {
    let actual = sha256_hex(bytes);
    if let Some(expected) = pinned
        && expected.hex() != actual
    {
        return Err(LoadError::DigestMismatch {
            expected: expected.hex().to_string(),
            actual,
        });
    }
    Ok(format!("{}:{}", ids::DIGEST_SHA256, actual))
}
