//! Identifiers used throughout SafePay.
//!
//! Addresses are raw 32-byte values. A participant's address is its
//! ed25519 public key; a program-derived address is a hash that is
//! deliberately not a point on the curve. Receipts use UUIDv7 for
//! time-ordered sorting.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::SafepayError;

// ---------------------------------------------------------------------------
// Pubkey
// ---------------------------------------------------------------------------

/// A 32-byte account address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Default)]
pub struct Pubkey(pub [u8; 32]);

impl Pubkey {
    pub const LEN: usize = 32;

    #[must_use]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// First four bytes as hex, for log lines.
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Read a key from a fixed offset inside account data.
    ///
    /// # Errors
    /// Returns `AccountDataCorrupt` if the slice is too short.
    pub fn read_from(data: &[u8], offset: usize) -> crate::Result<Self> {
        let bytes: [u8; 32] = data
            .get(offset..offset + Self::LEN)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| SafepayError::AccountDataCorrupt {
                reason: format!("no pubkey at offset {offset}"),
            })?;
        Ok(Self(bytes))
    }
}

impl AsRef<[u8]> for Pubkey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for Pubkey {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl From<&ed25519_dalek::VerifyingKey> for Pubkey {
    fn from(key: &ed25519_dalek::VerifyingKey) -> Self {
        Self(key.to_bytes())
    }
}

impl fmt::Display for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pubkey({})", self.short())
    }
}

impl FromStr for Pubkey {
    type Err = SafepayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = hex::decode(s)
            .map_err(|e| SafepayError::Serialization(format!("bad pubkey hex: {e}")))?;
        let bytes: [u8; 32] = raw.try_into().map_err(|v: Vec<u8>| {
            SafepayError::Serialization(format!("pubkey must be 32 bytes, got {}", v.len()))
        })?;
        Ok(Self(bytes))
    }
}

impl Serialize for Pubkey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Pubkey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Random key for unit tests. **Never use in production.**
#[cfg(any(test, feature = "test-helpers"))]
impl Pubkey {
    #[must_use]
    pub fn new_unique() -> Self {
        Self(rand::random::<[u8; 32]>())
    }
}

// ---------------------------------------------------------------------------
// ReceiptId
// ---------------------------------------------------------------------------

/// Unique identifier for a transition receipt. Uses UUIDv7 for time-ordered sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ReceiptId(pub Uuid);

impl ReceiptId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ReceiptId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ReceiptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rcpt:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pubkey_hex_roundtrip() {
        let key = Pubkey::new_unique();
        let parsed: Pubkey = key.to_string().parse().unwrap();
        assert_eq!(key, parsed);
    }

    #[test]
    fn pubkey_rejects_wrong_length() {
        let err = "abcd".parse::<Pubkey>().unwrap_err();
        assert!(matches!(err, SafepayError::Serialization(_)));
        assert!("zz".repeat(32).parse::<Pubkey>().is_err());
    }

    #[test]
    fn pubkey_serializes_as_hex_string() {
        let key = Pubkey([0xab; 32]);
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, format!("\"{}\"", "ab".repeat(32)));
        let back: Pubkey = serde_json::from_str(&json).unwrap();
        assert_eq!(key, back);
    }

    #[test]
    fn read_from_bounds_checked() {
        let data = [9u8; 40];
        assert_eq!(Pubkey::read_from(&data, 8).unwrap(), Pubkey([9u8; 32]));
        assert!(matches!(
            Pubkey::read_from(&data, 9),
            Err(SafepayError::AccountDataCorrupt { .. })
        ));
    }

    #[test]
    fn receipt_id_ordering() {
        let a = ReceiptId::new();
        let b = ReceiptId::new();
        assert!(a < b);
    }
}
