//! Wallet-only access to a token ledger.
//!
//! Code running outside the escrow program reaches the ledger through a
//! [`LedgerView`]. Every instruction it issues must be authorized by a
//! wallet signature: [`Authority::Program`] is refused before the ledger
//! sees it. Seeds and bumps are public, so anyone can reproduce a
//! [`ProgramSigner`]; only the program's own settlement path is allowed
//! to act with one.
//!
//! [`ProgramSigner`]: safepay_derive::ProgramSigner

use safepay_types::{Pubkey, Result, SafepayError, TokenAccount};

use crate::token_ledger::{Authority, InMemoryTokenLedger, TokenLedger};

/// Borrowed ledger that only accepts wallet authority.
pub struct LedgerView<'a, L> {
    ledger: &'a mut L,
}

fn wallet_only(authority: Authority<'_>) -> Result<Authority<'_>> {
    match authority {
        Authority::Signer(_) => Ok(authority),
        Authority::Program(signer) => {
            tracing::warn!(
                address = %signer.address().short(),
                "Program authority refused outside the escrow program"
            );
            Err(SafepayError::Unauthorized {
                signer: signer.address(),
            })
        }
    }
}

impl<'a, L: TokenLedger> LedgerView<'a, L> {
    #[must_use]
    pub fn new(ledger: &'a mut L) -> Self {
        Self { ledger }
    }

    /// See [`TokenLedger::token_account`].
    ///
    /// # Errors
    /// As the ledger.
    pub fn token_account(&self, address: &Pubkey) -> Result<TokenAccount> {
        self.ledger.token_account(address)
    }

    /// See [`TokenLedger::create_token_account`].
    ///
    /// # Errors
    /// `Unauthorized` for program authority, otherwise as the ledger.
    pub fn create_token_account(
        &mut self,
        authority: Authority<'_>,
        address: Pubkey,
        mint: Pubkey,
        owner: Pubkey,
    ) -> Result<()> {
        self.ledger
            .create_token_account(wallet_only(authority)?, address, mint, owner)
    }

    /// See [`TokenLedger::transfer`].
    ///
    /// # Errors
    /// `Unauthorized` for program authority, otherwise as the ledger.
    pub fn transfer(
        &mut self,
        authority: Authority<'_>,
        from: &Pubkey,
        to: &Pubkey,
        amount: u64,
    ) -> Result<()> {
        self.ledger
            .transfer(wallet_only(authority)?, from, to, amount)
    }

    /// See [`TokenLedger::close_account`].
    ///
    /// # Errors
    /// `Unauthorized` for program authority, otherwise as the ledger.
    pub fn close_account(
        &mut self,
        authority: Authority<'_>,
        account: &Pubkey,
        lamport_destination: &Pubkey,
    ) -> Result<u64> {
        self.ledger
            .close_account(wallet_only(authority)?, account, lamport_destination)
    }

    #[must_use]
    pub fn lamports(&self, address: &Pubkey) -> u64 {
        self.ledger.lamports(address)
    }

    /// See [`TokenLedger::transfer_lamports`].
    ///
    /// # Errors
    /// `Unauthorized` for program authority, otherwise as the ledger.
    pub fn transfer_lamports(
        &mut self,
        authority: Authority<'_>,
        from: &Pubkey,
        to: &Pubkey,
        amount: u64,
    ) -> Result<()> {
        self.ledger
            .transfer_lamports(wallet_only(authority)?, from, to, amount)
    }

    /// # Errors
    /// As [`TokenLedger::circulating`].
    pub fn circulating(&self, mint: &Pubkey) -> Result<u64> {
        self.ledger.circulating(mint)
    }

    /// # Errors
    /// `SupplyInvariantViolation` if `mint`'s balances drift from issuance.
    pub fn verify_supply(&self, mint: &Pubkey) -> Result<()> {
        self.ledger.verify_supply(mint)
    }
}

impl LedgerView<'_, InMemoryTokenLedger> {
    /// See [`InMemoryTokenLedger::create_mint`].
    ///
    /// # Errors
    /// `AccountAlreadyExists` for a known mint.
    pub fn create_mint(&mut self, mint: Pubkey, authority: Pubkey) -> Result<()> {
        self.ledger.create_mint(mint, authority)
    }

    /// See [`InMemoryTokenLedger::mint_to`].
    ///
    /// # Errors
    /// `Unauthorized` for program authority, otherwise as the ledger.
    pub fn mint_to(
        &mut self,
        authority: Authority<'_>,
        mint: &Pubkey,
        account: &Pubkey,
        amount: u64,
    ) -> Result<()> {
        self.ledger
            .mint_to(wallet_only(authority)?, mint, account, amount)
    }

    /// # Errors
    /// `Internal` on lamport overflow.
    pub fn airdrop(&mut self, address: Pubkey, lamports: u64) -> Result<()> {
        self.ledger.airdrop(address, lamports)
    }

    /// See [`InMemoryTokenLedger::create_associated_account`].
    ///
    /// # Errors
    /// As the ledger.
    pub fn create_associated_account(&mut self, owner: Pubkey, mint: Pubkey) -> Result<Pubkey> {
        self.ledger.create_associated_account(owner, mint)
    }
}
