//! Voter identity hashing.
//!
//! A raw voter identifier is normalized (trimmed, upper-cased) and digested
//! into a hex [`IdentityHash`]. The hash is only a deduplication key for the
//! one-vote rule, not a privacy or security primitive.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{StationError, StationResult, ValidationError};

/// Minimum accepted length of a raw voter identifier (after trimming).
pub const MIN_VOTER_ID_LEN: usize = 5;

/// Deduplication key derived from a voter identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityHash(String);

impl IdentityHash {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 characters, for log lines.
    pub fn short(&self) -> &str {
        self.0.get(0..12).unwrap_or(&self.0)
    }
}

impl fmt::Display for IdentityHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Trim and upper-case a raw identifier.
pub fn normalize(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Check a raw identifier against the login input rules.
pub fn validate_voter_id(raw: &str) -> Result<(), ValidationError> {
    let trimmed = raw.trim();
    if trimmed.chars().count() < MIN_VOTER_ID_LEN {
        return Err(ValidationError::TooShort {
            min: MIN_VOTER_ID_LEN,
        });
    }
    if !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ValidationError::NotAlphanumeric);
    }
    Ok(())
}

/// A digest primitive turning a normalized identifier into a hex string.
pub trait DigestStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn digest(&self, normalized: &str) -> Result<String, String>;
}

/// SHA-256, lowercase hex. The default.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256Digest;

impl DigestStrategy for Sha256Digest {
    fn name(&self) -> &'static str {
        "sha256"
    }

    fn digest(&self, normalized: &str) -> Result<String, String> {
        let mut hasher = Sha256::new();
        hasher.update(normalized.as_bytes());
        Ok(hex::encode(hasher.finalize()))
    }
}

/// 32-bit multiply-by-31 rolling hash over UTF-16 code units.
///
/// Collides far more often than SHA-256. Only for reading ledgers written by
/// kiosks that keyed voters this way.
#[derive(Debug, Default, Clone, Copy)]
pub struct Rolling32Digest;

impl DigestStrategy for Rolling32Digest {
    fn name(&self) -> &'static str {
        "rolling32"
    }

    fn digest(&self, normalized: &str) -> Result<String, String> {
        let hash = normalized
            .encode_utf16()
            .fold(0i32, |acc, unit| {
                acc.wrapping_shl(5)
                    .wrapping_sub(acc)
                    .wrapping_add(i32::from(unit))
            });
        Ok(format!("{:08x}", hash as u32))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DigestKind {
    #[default]
    Sha256,
    Rolling32,
}

impl DigestKind {
    pub fn strategy(self) -> Arc<dyn DigestStrategy> {
        match self {
            DigestKind::Sha256 => Arc::new(Sha256Digest),
            DigestKind::Rolling32 => Arc::new(Rolling32Digest),
        }
    }
}

impl FromStr for DigestKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sha256" | "sha-256" => Ok(DigestKind::Sha256),
            "rolling32" => Ok(DigestKind::Rolling32),
            _ => Err(format!("invalid identity digest: {}", s)),
        }
    }
}

/// Derives identity hashes with a pluggable digest.
#[derive(Clone)]
pub struct IdentityHasher {
    strategy: Arc<dyn DigestStrategy>,
}

impl IdentityHasher {
    pub fn new(strategy: Arc<dyn DigestStrategy>) -> Self {
        Self { strategy }
    }

    pub fn from_kind(kind: DigestKind) -> Self {
        Self::new(kind.strategy())
    }

    pub fn algorithm(&self) -> &'static str {
        self.strategy.name()
    }

    /// Normalize and digest a raw identifier. The digest runs on the blocking
    /// pool so the station task can keep serving while it completes.
    pub async fn hash(&self, raw: &str) -> StationResult<IdentityHash> {
        let normalized = normalize(raw);
        let strategy = Arc::clone(&self.strategy);
        let digest = tokio::task::spawn_blocking(move || strategy.digest(&normalized))
            .await
            .map_err(|e| StationError::HashFailure(e.to_string()))?
            .map_err(StationError::HashFailure)?;
        Ok(IdentityHash(digest))
    }
}

impl Default for IdentityHasher {
    fn default() -> Self {
        Self::from_kind(DigestKind::Sha256)
    }
}

impl fmt::Debug for IdentityHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityHasher")
            .field("algorithm", &self.strategy.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Unavailable;

    impl DigestStrategy for Unavailable {
        fn name(&self) -> &'static str {
            "unavailable"
        }

        fn digest(&self, _normalized: &str) -> Result<String, String> {
            Err("digest primitive missing".to_string())
        }
    }

    #[tokio::test]
    async fn test_hash_deterministic() {
        let hasher = IdentityHasher::default();
        let h1 = hasher.hash("VOTER001").await.unwrap();
        let h2 = hasher.hash("VOTER001").await.unwrap();
        assert_eq!(h1, h2);
        assert_eq!(h1.as_str().len(), 64);
    }

    #[tokio::test]
    async fn test_hash_normalizes_input() {
        let hasher = IdentityHasher::default();
        let a = hasher.hash(" abc12 ").await.unwrap();
        let b = hasher.hash("ABC12").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_known_sha256_vector() {
        let hasher = IdentityHasher::default();
        let h = hasher.hash("abc").await.unwrap();
        assert_eq!(
            h.as_str(),
            // sha256("ABC")
            "b5d4045c3f466fa91fe2cc6abe79232a1a57cdf104f7a26e716e0a1e2789df78"
        );
    }

    #[tokio::test]
    async fn test_distinct_ids_distinct_hashes() {
        let hasher = IdentityHasher::default();
        let a = hasher.hash("VOTER001").await.unwrap();
        let b = hasher.hash("VOTER002").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_rolling32_is_selectable() {
        let hasher = IdentityHasher::from_kind(DigestKind::Rolling32);
        assert_eq!(hasher.algorithm(), "rolling32");
        let h = hasher.hash("a").await.unwrap();
        // 'A' = 65
        assert_eq!(h.as_str(), "00000041");
        assert_eq!(hasher.hash(" a ").await.unwrap(), h);
    }

    #[tokio::test]
    async fn test_unavailable_digest_is_hash_failure() {
        let hasher = IdentityHasher::new(Arc::new(Unavailable));
        let err = hasher.hash("VOTER001").await.unwrap_err();
        assert!(matches!(err, StationError::HashFailure(_)));
    }

    #[test]
    fn test_validate_voter_id() {
        assert!(validate_voter_id("VOTER001").is_ok());
        assert!(validate_voter_id("  abc12  ").is_ok());
        assert_eq!(
            validate_voter_id("abc1"),
            Err(ValidationError::TooShort { min: 5 })
        );
        assert_eq!(
            validate_voter_id("abc-123"),
            Err(ValidationError::NotAlphanumeric)
        );
        assert_eq!(
            validate_voter_id("abc 123"),
            Err(ValidationError::NotAlphanumeric)
        );
        assert!(validate_voter_id("").is_err());
    }

    #[test]
    fn test_digest_kind_parse() {
        assert_eq!("sha256".parse::<DigestKind>(), Ok(DigestKind::Sha256));
        assert_eq!("ROLLING32".parse::<DigestKind>(), Ok(DigestKind::Rolling32));
        assert!("md5".parse::<DigestKind>().is_err());
    }
}
