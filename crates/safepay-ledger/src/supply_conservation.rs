//! Supply conservation invariant checker.
//!
//! Invariant enforced by the token ledger:
//! ```text
//! ∀ mint: Σ(account balances) == issued(mint)
//! ```
//!
//! Transfers, vault deposits and releases only move balances between
//! accounts, so nothing but minting may change the left-hand side. A
//! mismatch means tokens were created or destroyed out of band.

use std::collections::HashMap;

use safepay_types::{Pubkey, Result, SafepayError};

/// Tracks per-mint issuance since genesis.
#[derive(Debug, Clone, Default)]
pub struct SupplyConservation {
    issued: HashMap<Pubkey, u64>,
}

impl SupplyConservation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record newly minted units.
    ///
    /// # Errors
    /// Returns `InvalidAmount` if issuance would overflow `u64`.
    pub fn record_issuance(&mut self, mint: Pubkey, amount: u64) -> Result<()> {
        let issued = self.issued.entry(mint).or_insert(0);
        *issued = issued
            .checked_add(amount)
            .ok_or_else(|| SafepayError::InvalidAmount {
                amount,
                reason: format!("supply of mint {} would overflow", mint.short()),
            })?;
        Ok(())
    }

    /// Expected total supply for a mint.
    #[must_use]
    pub fn expected_supply(&self, mint: &Pubkey) -> u64 {
        self.issued.get(mint).copied().unwrap_or(0)
    }

    /// Verify that `actual_supply` (sum of all balances) equals issuance.
    ///
    /// # Errors
    /// Returns [`SafepayError::SupplyInvariantViolation`] if they differ.
    pub fn verify(&self, mint: &Pubkey, actual_supply: u64) -> Result<()> {
        let expected = self.expected_supply(mint);
        if actual_supply != expected {
            tracing::error!(
                mint = %mint.short(),
                expected,
                actual = actual_supply,
                "Supply invariant violated"
            );
            return Err(SafepayError::SupplyInvariantViolation {
                reason: format!(
                    "mint {}: actual supply {actual_supply} != issued {expected}",
                    mint.short()
                ),
            });
        }
        Ok(())
    }

    /// All mints with recorded issuance.
    #[must_use]
    pub fn tracked_mints(&self) -> Vec<Pubkey> {
        let mut mints: Vec<Pubkey> = self.issued.keys().copied().collect();
        mints.sort();
        mints
    }
}
