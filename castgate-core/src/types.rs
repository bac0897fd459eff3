//! Identity and content-reference types.
//!
//! Newtypes keep Farcaster ids and cast hashes from being mixed up with
//! arbitrary numbers and strings once they leave the request payload.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of bytes in a Farcaster cast hash.
pub const CAST_HASH_BYTES: usize = 20;

/// Farcaster user id.
///
/// Deserializes from either a JSON number or a numeric string, since frame
/// payloads and the Neynar API disagree on the representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Fid(pub u64);

impl fmt::Display for Fid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Fid {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl FromStr for Fid {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        s.trim()
            .parse::<u64>()
            .map(Fid)
            .with_context(|| format!("'{}' is not a valid fid", s))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawFid {
    Number(u64),
    Text(String),
}

impl<'de> Deserialize<'de> for Fid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match RawFid::deserialize(deserializer)? {
            RawFid::Number(n) => Ok(Fid(n)),
            RawFid::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// Hash identifying a single cast, stored normalized as `0x` + 40 lowercase hex digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CastHash(String);

impl CastHash {
    /// Parse and validate a cast hash.
    ///
    /// Rejects truncated or non-hex identifiers: a short hash would silently
    /// make every reaction lookup miss.
    pub fn parse(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| anyhow!("cast hash '{}' must start with 0x", trimmed))?;

        let bytes = hex::decode(digits)
            .with_context(|| format!("cast hash '{}' is not valid hex", trimmed))?;

        if bytes.len() != CAST_HASH_BYTES {
            return Err(anyhow!(
                "cast hash '{}' has {} bytes, expected {}",
                trimmed,
                bytes.len(),
                CAST_HASH_BYTES
            ));
        }

        Ok(Self(format!("0x{}", hex::encode(bytes))))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns a truncated hash for display (`0x` plus the first 8 digits).
    pub fn short(&self) -> &str {
        &self.0[..10]
    }
}

impl fmt::Display for CastHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CastHash {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// The cast a caller must have liked and recasted, and the account they must follow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CastReference {
    pub cast_hash: CastHash,
    pub target_fid: Fid,
}

impl CastReference {
    pub fn new(cast_hash: CastHash, target_fid: Fid) -> Self {
        Self {
            cast_hash,
            target_fid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str = "0x3ba6f52a9b1c4e0d7f8a6b5c4d3e2f1a0b9c8d7e";

    #[test]
    fn test_fid_deserializes_from_number_and_string() {
        let from_number: Fid = serde_json::from_str("14871").unwrap();
        let from_string: Fid = serde_json::from_str("\"14871\"").unwrap();
        assert_eq!(from_number, Fid(14871));
        assert_eq!(from_string, Fid(14871));
    }

    #[test]
    fn test_fid_rejects_non_numeric_string() {
        assert!(serde_json::from_str::<Fid>("\"alice\"").is_err());
        assert!("".parse::<Fid>().is_err());
    }

    #[test]
    fn test_cast_hash_accepts_full_hash() {
        let hash = CastHash::parse(HASH).unwrap();
        assert_eq!(hash.as_str(), HASH);
        assert_eq!(hash.short(), "0x3ba6f52a");
    }

    #[test]
    fn test_cast_hash_normalizes_case() {
        let hash = CastHash::parse(&HASH.to_uppercase().replacen("0X", "0x", 1)).unwrap();
        assert_eq!(hash.as_str(), HASH);
    }

    #[test]
    fn test_cast_hash_rejects_truncated_hash() {
        let err = CastHash::parse("0x3ba6f52a").unwrap_err();
        assert!(err.to_string().contains("expected 20"), "{}", err);
    }

    #[test]
    fn test_cast_hash_rejects_missing_prefix_and_bad_hex() {
        assert!(CastHash::parse(&HASH[2..]).is_err());
        assert!(CastHash::parse("0xzz a6f52a9b1c4e0d7f8a6b5c4d3e2f1a0b9c8d7e").is_err());
    }
}
