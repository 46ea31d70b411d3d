//! Content digests in `algo:hex` form, e.g. `sha256:9f86d081884c7d65...`.
//!
//! Two writers of the same bytes produce the same [`Digest`]; this is the
//! identity primitive the rest of the broker builds on (blob storage,
//! replication bookkeeping, ref accounting).

use data_encoding::HEXLOWER_PERMISSIVE;
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Algorithms this deployment accepts. The algorithm is fixed per
/// deployment (see the data model), but parsing still validates against an
/// allow-list so a malformed or foreign digest fails fast rather than
/// silently comparing unequal to everything.
const ALLOWED_ALGORITHMS: &[&str] = &["sha256"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("bad digest {0:?}: missing ':' separator")]
    MissingSeparator(String),
    #[error("bad digest {0:?}: unknown algorithm {1:?}")]
    UnknownAlgorithm(String, String),
    #[error("bad digest {0:?}: invalid hex payload")]
    InvalidHex(String),
}

/// A content digest, `algo:hex`. Equality/Hash/Ord are defined on the
/// normalized (lowercase hex) form so it can key maps and BTreeMaps.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Digest {
    algo: String,
    hex: String,
}

impl Digest {
    pub fn algorithm(&self) -> &str {
        &self.algo
    }

    pub fn hex(&self) -> &str {
        &self.hex
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algo, self.hex)
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl FromStr for Digest {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (algo, hex) = s
            .split_once(':')
            .ok_or_else(|| Error::MissingSeparator(s.to_string()))?;

        if !ALLOWED_ALGORITHMS.contains(&algo) {
            return Err(Error::UnknownAlgorithm(s.to_string(), algo.to_string()));
        }

        if hex.is_empty() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::InvalidHex(s.to_string()));
        }

        Ok(Digest {
            algo: algo.to_string(),
            hex: hex.to_ascii_lowercase(),
        })
    }
}

impl TryFrom<String> for Digest {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Digest> for String {
    fn from(value: Digest) -> Self {
        value.to_string()
    }
}

/// Hashes `bytes` under the deployment's fixed algorithm (sha256).
pub fn hash(bytes: &[u8]) -> Digest {
    let out = Sha256::digest(bytes);
    Digest {
        algo: "sha256".to_string(),
        hex: HEXLOWER_PERMISSIVE.encode(&out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_bytes_same_digest() {
        assert_eq!(hash(b"hello"), hash(b"hello"));
    }

    #[test]
    fn different_bytes_different_digest() {
        assert_ne!(hash(b"hello"), hash(b"world"));
    }

    #[test]
    fn roundtrip_display_parse() {
        let d = hash(b"hello");
        let parsed: Digest = d.to_string().parse().unwrap();
        assert_eq!(d, parsed);
    }

    #[test]
    fn rejects_missing_separator() {
        assert_eq!(
            "deadbeef".parse::<Digest>(),
            Err(Error::MissingSeparator("deadbeef".to_string()))
        );
    }

    #[test]
    fn rejects_unknown_algorithm() {
        assert!(matches!(
            "md5:abcd".parse::<Digest>(),
            Err(Error::UnknownAlgorithm(_, _))
        ));
    }

    #[test]
    fn rejects_non_hex_payload() {
        assert!(matches!(
            "sha256:not-hex".parse::<Digest>(),
            Err(Error::InvalidHex(_))
        ));
    }

    #[test]
    fn normalizes_hex_case() {
        let upper: Digest = "sha256:DEADBEEF".parse().unwrap();
        let lower: Digest = "sha256:deadbeef".parse().unwrap();
        assert_eq!(upper, lower);
    }
}
