//! RevisionId - generation plus content digest
//!
//! - Generation increases by exactly one per ancestor edge (roots are 1)
//! - Digest is a deterministic function of the parent id, the deletion flag
//!   and the canonical properties
//! - Total order: higher generation wins, then lexicographically greater digest
//!
//! The derived `Ord` encodes that order: fields compare in declaration order.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use super::errors::{RevisionError, RevisionResult};

/// Number of hex characters kept from the SHA-256 output.
const DIGEST_HEX_LEN: usize = 32;

/// An immutable revision identity.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RevisionId {
    generation: u64,
    digest: String,
}

impl RevisionId {
    /// Creates a revision id from its parts.
    ///
    /// Generation must be positive and the digest non-empty.
    pub fn new(generation: u64, digest: impl Into<String>) -> RevisionResult<Self> {
        let digest = digest.into();
        if generation == 0 || digest.is_empty() || digest.contains('-') {
            return Err(RevisionError::InvalidRevisionId(format!(
                "{}-{}",
                generation, digest
            )));
        }
        Ok(Self { generation, digest })
    }

    /// Computes the id of a child of `parent` (or of a root when `None`).
    pub fn compute(parent: Option<&RevisionId>, deleted: bool, canonical: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        if let Some(parent) = parent {
            hasher.update(parent.to_string().as_bytes());
        }
        hasher.update([0u8, deleted as u8]);
        hasher.update(canonical);

        let mut digest = format!("{:x}", hasher.finalize());
        digest.truncate(DIGEST_HEX_LEN);

        Self {
            generation: parent.map_or(1, |p| p.generation + 1),
            digest,
        }
    }

    /// Returns the generation number.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns the content digest.
    #[inline]
    pub fn digest(&self) -> &str {
        &self.digest
    }
}

impl fmt::Display for RevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.generation, self.digest)
    }
}

impl FromStr for RevisionId {
    type Err = RevisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (generation, digest) = s
            .split_once('-')
            .ok_or_else(|| RevisionError::InvalidRevisionId(s.to_string()))?;
        let generation: u64 = generation
            .parse()
            .map_err(|_| RevisionError::InvalidRevisionId(s.to_string()))?;
        Self::new(generation, digest).map_err(|_| RevisionError::InvalidRevisionId(s.to_string()))
    }
}

impl Serialize for RevisionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RevisionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_has_generation_one() {
        let id = RevisionId::compute(None, false, b"{}");
        assert_eq!(id.generation(), 1);
        assert_eq!(id.digest().len(), DIGEST_HEX_LEN);
    }

    #[test]
    fn test_child_generation_increments() {
        let root = RevisionId::compute(None, false, b"{}");
        let child = RevisionId::compute(Some(&root), false, b"{\"a\":1}");
        assert_eq!(child.generation(), 2);
    }

    #[test]
    fn test_compute_is_deterministic() {
        let root = RevisionId::compute(None, false, b"{\"x\":1}");
        assert_eq!(root, RevisionId::compute(None, false, b"{\"x\":1}"));
    }

    #[test]
    fn test_deletion_flag_changes_digest() {
        let root = RevisionId::compute(None, false, b"{}");
        let live = RevisionId::compute(Some(&root), false, b"{}");
        let dead = RevisionId::compute(Some(&root), true, b"{}");
        assert_ne!(live, dead);
    }

    #[test]
    fn test_ordering_generation_then_digest() {
        let low = RevisionId::new(2, "ffff").unwrap();
        let high = RevisionId::new(3, "0000").unwrap();
        assert!(high > low);

        let a = RevisionId::new(3, "abc").unwrap();
        let b = RevisionId::new(3, "abd").unwrap();
        assert!(b > a);
    }

    #[test]
    fn test_parse_roundtrip_text() {
        let id: RevisionId = "4-deadbeef".parse().unwrap();
        assert_eq!(id.generation(), 4);
        assert_eq!(id.digest(), "deadbeef");
        assert_eq!(id.to_string(), "4-deadbeef");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!("deadbeef".parse::<RevisionId>().is_err());
        assert!("0-abc".parse::<RevisionId>().is_err());
        assert!("x-abc".parse::<RevisionId>().is_err());
        assert!("3-".parse::<RevisionId>().is_err());
    }

    #[test]
    fn test_serde_uses_text_form() {
        let id = RevisionId::new(7, "cafe").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"7-cafe\"");
        let back: RevisionId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
