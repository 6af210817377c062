//! Token account layout.
//!
//! A token account holds a balance of exactly one mint and is controlled
//! by exactly one owner (its authority). The owner is either a wallet key
//! or a program-derived address.
//!
//! Layout (version 1, little-endian):
//!
//! | Offset | Size | Field |
//! |-------:|-----:|-------|
//! | 0  | 1  | layout version |
//! | 1  | 1  | state (`1` initialized) |
//! | 2  | 32 | mint |
//! | 34 | 32 | owner |
//! | 66 | 8  | amount |

use serde::{Deserialize, Serialize};

use crate::{Pubkey, Result, SafepayError, constants};

const STATE_INITIALIZED: u8 = 1;

/// Decoded token account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAccount {
    /// The token this account holds.
    pub mint: Pubkey,
    /// The only key allowed to move tokens out.
    pub owner: Pubkey,
    /// Balance in base units.
    pub amount: u64,
}

impl TokenAccount {
    /// Packed size in bytes.
    pub const LEN: usize = 74;

    #[must_use]
    pub fn new(mint: Pubkey, owner: Pubkey) -> Self {
        Self {
            mint,
            owner,
            amount: 0,
        }
    }

    /// Serialize into the fixed version-1 layout.
    #[must_use]
    pub fn pack(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(Self::LEN);
        data.push(constants::TOKEN_ACCOUNT_LAYOUT_VERSION);
        data.push(STATE_INITIALIZED);
        data.extend_from_slice(self.mint.as_ref());
        data.extend_from_slice(self.owner.as_ref());
        data.extend_from_slice(&self.amount.to_le_bytes());
        data
    }

    /// Decode and validate a packed token account.
    ///
    /// # Errors
    /// Returns `AccountDataCorrupt` on a length, version or state mismatch.
    pub fn unpack(data: &[u8]) -> Result<Self> {
        if data.len() != Self::LEN {
            return Err(SafepayError::AccountDataCorrupt {
                reason: format!("token account is {} bytes, expected {}", data.len(), Self::LEN),
            });
        }
        if data[0] != constants::TOKEN_ACCOUNT_LAYOUT_VERSION {
            return Err(SafepayError::AccountDataCorrupt {
                reason: format!("unsupported token account version {}", data[0]),
            });
        }
        if data[1] != STATE_INITIALIZED {
            return Err(SafepayError::AccountDataCorrupt {
                reason: "token account is not initialized".into(),
            });
        }
        let mut amount = [0u8; 8];
        amount.copy_from_slice(&data[66..74]);
        Ok(Self {
            mint: Pubkey::read_from(data, 2)?,
            owner: Pubkey::read_from(data, 34)?,
            amount: u64::from_le_bytes(amount),
        })
    }

    /// Check that this account holds `mint` and is controlled by `owner`.
    ///
    /// # Errors
    /// Returns `InvalidTokenAccount` naming the first mismatch.
    pub fn expect(&self, address: Pubkey, mint: Pubkey, owner: Pubkey) -> Result<()> {
        if self.mint != mint {
            return Err(SafepayError::InvalidTokenAccount {
                account: address,
                reason: format!("holds mint {}, expected {}", self.mint.short(), mint.short()),
            });
        }
        if self.owner != owner {
            return Err(SafepayError::InvalidTokenAccount {
                account: address,
                reason: format!(
                    "owned by {}, expected {}",
                    self.owner.short(),
                    owner.short()
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account() -> TokenAccount {
        TokenAccount {
            mint: Pubkey([1u8; 32]),
            owner: Pubkey([2u8; 32]),
            amount: 1_337_000_000,
        }
    }

    #[test]
    fn pack_layout() {
        let data = account().pack();
        assert_eq!(data.len(), TokenAccount::LEN);
        assert_eq!(data[0], 1);
        assert_eq!(data[1], 1);
        assert_eq!(&data[2..34], &[1u8; 32]);
        assert_eq!(&data[34..66], &[2u8; 32]);
        assert_eq!(&data[66..74], &1_337_000_000u64.to_le_bytes());
        assert_eq!(TokenAccount::unpack(&data).unwrap(), account());
    }

    #[test]
    fn unpack_validates() {
        let data = account().pack();
        assert!(TokenAccount::unpack(&data[..73]).is_err());

        let mut bad_version = data.clone();
        bad_version[0] = 9;
        assert!(TokenAccount::unpack(&bad_version).is_err());

        let mut uninit = data;
        uninit[1] = 0;
        let err = TokenAccount::unpack(&uninit).unwrap_err();
        assert!(matches!(err, SafepayError::AccountDataCorrupt { .. }));
    }

    #[test]
    fn expect_checks_mint_then_owner() {
        let acct = account();
        let address = Pubkey([3u8; 32]);
        assert!(acct.expect(address, acct.mint, acct.owner).is_ok());

        let err = acct.expect(address, Pubkey([9u8; 32]), acct.owner).unwrap_err();
        assert!(matches!(err, SafepayError::InvalidTokenAccount { account, .. } if account == address));

        let err = acct.expect(address, acct.mint, Pubkey([9u8; 32])).unwrap_err();
        assert!(err.to_string().contains("owned by"));
    }
}
