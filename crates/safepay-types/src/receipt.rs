//! Receipts for committed escrow transitions.
//!
//! Every committed initiate / reclaim / settle produces a [`Receipt`]
//! carrying a SHA-256 digest over its canonical fields, so a caller can
//! later prove which transition happened and for how much.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{Pubkey, ReceiptId, constants};

/// The transition this receipt proves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReceiptType {
    /// Funds moved sender → vault and the record was opened.
    Initiated,
    /// Funds moved vault → sender and the record was closed.
    Reclaimed,
    /// Funds moved vault → receiver and the record was closed.
    Settled,
}

impl ReceiptType {
    fn tag(self) -> u8 {
        match self {
            Self::Initiated => 0,
            Self::Reclaimed => 1,
            Self::Settled => 2,
        }
    }
}

impl std::fmt::Display for ReceiptType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initiated => write!(f, "INITIATED"),
            Self::Reclaimed => write!(f, "RECLAIMED"),
            Self::Settled => write!(f, "SETTLED"),
        }
    }
}

/// Proof of one committed transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub id: ReceiptId,
    pub receipt_type: ReceiptType,
    /// The escrow record address (the record handle).
    pub record: Pubkey,
    /// The custody vault address.
    pub vault: Pubkey,
    /// The key that authorized the transition.
    pub signer: Pubkey,
    /// Token account the funds were moved into.
    pub destination: Pubkey,
    /// Base units moved.
    pub amount: u64,
    /// SHA-256 over the canonical receipt fields.
    pub digest: [u8; 32],
    pub issued_at: DateTime<Utc>,
}

impl Receipt {
    /// Build a receipt and compute its digest.
    #[must_use]
    pub fn new(
        receipt_type: ReceiptType,
        record: Pubkey,
        vault: Pubkey,
        signer: Pubkey,
        destination: Pubkey,
        amount: u64,
    ) -> Self {
        let id = ReceiptId::new();
        let issued_at = Utc::now();
        let mut receipt = Self {
            id,
            receipt_type,
            record,
            vault,
            signer,
            destination,
            amount,
            digest: [0u8; 32],
            issued_at,
        };
        receipt.digest = receipt.compute_digest();
        receipt
    }

    /// `SHA-256(domain || id || type || record || vault || signer || destination || amount || issued_at_ms)`
    #[must_use]
    pub fn compute_digest(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(constants::RECEIPT_DOMAIN);
        hasher.update(self.id.0.as_bytes());
        hasher.update([self.receipt_type.tag()]);
        hasher.update(self.record.as_ref());
        hasher.update(self.vault.as_ref());
        hasher.update(self.signer.as_ref());
        hasher.update(self.destination.as_ref());
        hasher.update(self.amount.to_le_bytes());
        hasher.update(self.issued_at.timestamp_millis().to_le_bytes());
        hasher.finalize().into()
    }

    /// Whether the stored digest still matches the fields.
    #[must_use]
    pub fn verify_digest(&self) -> bool {
        self.compute_digest() == self.digest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn receipt() -> Receipt {
        Receipt::new(
            ReceiptType::Settled,
            Pubkey([1u8; 32]),
            Pubkey([2u8; 32]),
            Pubkey([3u8; 32]),
            Pubkey([4u8; 32]),
            20_000_000,
        )
    }

    #[test]
    fn receipt_type_display() {
        assert_eq!(format!("{}", ReceiptType::Initiated), "INITIATED");
        assert_eq!(format!("{}", ReceiptType::Reclaimed), "RECLAIMED");
    }

    #[test]
    fn digest_detects_tampering() {
        let mut r = receipt();
        assert!(r.verify_digest());
        r.amount += 1;
        assert!(!r.verify_digest());
    }

    #[test]
    fn serde_keeps_digest_valid() {
        let r = receipt();
        let json = serde_json::to_string(&r).unwrap();
        let back: Receipt = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
        assert!(back.verify_digest());
    }
}
