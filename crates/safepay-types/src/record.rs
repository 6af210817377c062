//! # Escrow record: the durable state of one escrow
//!
//! ## State Machine
//!
//! ```text
//!   (no record)  initiate   ┌─────────────┐  reclaim | settle  ┌────────┐
//!   ───────────────────────▶│ INITIALIZED ├───────────────────▶│ CLOSED │
//!                           └─────────────┘                    └────────┘
//! ```
//!
//! Absence of a record is the pre-initiate state. `Closed` is terminal and
//! the record stays behind as a tombstone, so the same identity triple can
//! never be opened twice.
//!
//! ## Byte layout (version 1, little-endian)
//!
//! | Offset | Size | Field |
//! |-------:|-----:|-------|
//! | 0   | 8  | discriminator, `SHA-256("safepay:account:EscrowRecord")[..8]` |
//! | 8   | 1  | layout version |
//! | 9   | 1  | state (`1` initialized, `2` closed) |
//! | 10  | 32 | sender |
//! | 42  | 32 | receiver |
//! | 74  | 32 | asset (mint) |
//! | 106 | 32 | vault |
//! | 138 | 8  | amount |
//! | 146 | 1  | record bump |
//! | 147 | 1  | vault bump |

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{Pubkey, Result, SafepayError, constants};

/// Lifecycle state of an escrow record.
///
/// The only transition is `Initialized → Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EscrowState {
    /// Funds are held in the vault. Reclaim or settle may fire.
    Initialized,
    /// Funds left the vault. **Irreversible.**
    Closed,
}

impl EscrowState {
    /// Can this record transition to the given target state?
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        matches!((self, target), (Self::Initialized, Self::Closed))
    }

    fn to_byte(self) -> u8 {
        match self {
            Self::Initialized => 1,
            Self::Closed => 2,
        }
    }

    fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            1 => Ok(Self::Initialized),
            2 => Ok(Self::Closed),
            other => Err(SafepayError::AccountDataCorrupt {
                reason: format!("unknown escrow state byte {other}"),
            }),
        }
    }
}

impl fmt::Display for EscrowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initialized => write!(f, "INITIALIZED"),
            Self::Closed => write!(f, "CLOSED"),
        }
    }
}

/// The party acting on an escrow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Sender,
    Receiver,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sender => write!(f, "sender"),
            Self::Receiver => write!(f, "receiver"),
        }
    }
}

/// The identity triple that uniquely names an escrow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EscrowKey {
    pub sender: Pubkey,
    pub receiver: Pubkey,
    pub asset: Pubkey,
}

impl EscrowKey {
    #[must_use]
    pub fn new(sender: Pubkey, receiver: Pubkey, asset: Pubkey) -> Self {
        Self {
            sender,
            receiver,
            asset,
        }
    }
}

/// The escrow record account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowRecord {
    /// Who funded the escrow and may reclaim it.
    pub sender: Pubkey,
    /// Who may settle the escrow.
    pub receiver: Pubkey,
    /// The mint of the escrowed token.
    pub asset: Pubkey,
    /// The custody vault holding the funds.
    pub vault: Pubkey,
    /// Escrowed quantity in base units. Fixed at creation.
    pub amount: u64,
    /// Current lifecycle state.
    pub state: EscrowState,
    /// Bump that reproduces the record address.
    pub record_bump: u8,
    /// Bump that reproduces the vault address.
    pub vault_bump: u8,
}

impl EscrowRecord {
    /// Packed size in bytes.
    pub const LEN: usize = 148;

    const VERSION_OFFSET: usize = 8;
    const STATE_OFFSET: usize = 9;
    const SENDER_OFFSET: usize = 10;
    const RECEIVER_OFFSET: usize = 42;
    const ASSET_OFFSET: usize = 74;
    const VAULT_OFFSET: usize = 106;
    const AMOUNT_OFFSET: usize = 138;
    const RECORD_BUMP_OFFSET: usize = 146;
    const VAULT_BUMP_OFFSET: usize = 147;

    /// The 8-byte account type tag at the start of every packed record.
    #[must_use]
    pub fn discriminator() -> [u8; 8] {
        let hash = Sha256::digest(constants::RECORD_DISCRIMINATOR_DOMAIN);
        let mut out = [0u8; 8];
        out.copy_from_slice(&hash[..8]);
        out
    }

    /// The identity triple of this record.
    #[must_use]
    pub fn key(&self) -> EscrowKey {
        EscrowKey::new(self.sender, self.receiver, self.asset)
    }

    /// The identity allowed to act in `role`.
    #[must_use]
    pub fn party(&self, role: Role) -> Pubkey {
        match role {
            Role::Sender => self.sender,
            Role::Receiver => self.receiver,
        }
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state == EscrowState::Initialized
    }

    /// Transition to CLOSED.
    ///
    /// # Errors
    /// Returns `AlreadyClosed` if the record is not INITIALIZED.
    pub fn close(&mut self, address: Pubkey) -> Result<()> {
        if !self.state.can_transition_to(EscrowState::Closed) {
            return Err(SafepayError::AlreadyClosed(address));
        }
        self.state = EscrowState::Closed;
        Ok(())
    }

    /// Serialize into the fixed version-1 layout.
    #[must_use]
    pub fn pack(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(Self::LEN);
        data.extend_from_slice(&Self::discriminator());
        data.push(constants::RECORD_LAYOUT_VERSION);
        data.push(self.state.to_byte());
        data.extend_from_slice(self.sender.as_ref());
        data.extend_from_slice(self.receiver.as_ref());
        data.extend_from_slice(self.asset.as_ref());
        data.extend_from_slice(self.vault.as_ref());
        data.extend_from_slice(&self.amount.to_le_bytes());
        data.push(self.record_bump);
        data.push(self.vault_bump);
        debug_assert_eq!(data.len(), Self::LEN);
        data
    }

    /// Decode and validate a packed record.
    ///
    /// # Errors
    /// Returns `AccountDataCorrupt` on a length, discriminator, version or
    /// state byte mismatch.
    pub fn unpack(data: &[u8]) -> Result<Self> {
        if data.len() != Self::LEN {
            return Err(SafepayError::AccountDataCorrupt {
                reason: format!("escrow record is {} bytes, expected {}", data.len(), Self::LEN),
            });
        }
        if data[..Self::VERSION_OFFSET] != Self::discriminator() {
            return Err(SafepayError::AccountDataCorrupt {
                reason: "escrow record discriminator mismatch".into(),
            });
        }
        let version = data[Self::VERSION_OFFSET];
        if version != constants::RECORD_LAYOUT_VERSION {
            return Err(SafepayError::AccountDataCorrupt {
                reason: format!("unsupported escrow record version {version}"),
            });
        }

        let mut amount = [0u8; 8];
        amount.copy_from_slice(&data[Self::AMOUNT_OFFSET..Self::AMOUNT_OFFSET + 8]);

        Ok(Self {
            state: EscrowState::from_byte(data[Self::STATE_OFFSET])?,
            sender: Pubkey::read_from(data, Self::SENDER_OFFSET)?,
            receiver: Pubkey::read_from(data, Self::RECEIVER_OFFSET)?,
            asset: Pubkey::read_from(data, Self::ASSET_OFFSET)?,
            vault: Pubkey::read_from(data, Self::VAULT_OFFSET)?,
            amount: u64::from_le_bytes(amount),
            record_bump: data[Self::RECORD_BUMP_OFFSET],
            vault_bump: data[Self::VAULT_BUMP_OFFSET],
        })
    }
}

/// Open record for unit tests. **Never use in production.**
#[cfg(any(test, feature = "test-helpers"))]
impl EscrowRecord {
    pub fn dummy(amount: u64) -> Self {
        Self {
            sender: Pubkey::new_unique(),
            receiver: Pubkey::new_unique(),
            asset: Pubkey::new_unique(),
            vault: Pubkey::new_unique(),
            amount,
            state: EscrowState::Initialized,
            record_bump: 255,
            vault_bump: 254,
        }
    }
}
