//! Token and lamport ledger.
//!
//! Holds every token account, the mint registry and lamport balances.
//! Credits are open to anyone. Debits are not: each one names an
//! [`Authority`], and the ledger refuses it unless that authority controls
//! the debited account. A wallet key authorizes through a
//! [`VerifiedSigner`], a program-derived address only through a
//! [`ProgramSigner`].

use std::collections::HashMap;

use safepay_derive::{ProgramSigner, associated_token_address};
use safepay_types::{Pubkey, Result, SafepayError, TokenAccount, VerifiedSigner};

use crate::{supply_conservation::SupplyConservation, transactional::Transactional};

/// Who is authorizing a debit.
#[derive(Debug, Clone, Copy)]
pub enum Authority<'a> {
    /// A wallet whose signature was verified for this call.
    Signer(&'a VerifiedSigner),
    /// A program-derived address, proven by re-derivation.
    Program(&'a ProgramSigner),
}

impl Authority<'_> {
    /// The address this authority acts for.
    #[must_use]
    pub fn key(&self) -> Pubkey {
        match self {
            Self::Signer(signer) => signer.key(),
            Self::Program(signer) => signer.address(),
        }
    }
}

/// Token account and lamport operations the escrow relies on.
pub trait TokenLedger: Transactional + Send {
    /// Decode the token account at `address`.
    ///
    /// # Errors
    /// `AccountNotFound` if absent, `AccountDataCorrupt` if undecodable.
    fn token_account(&self, address: &Pubkey) -> Result<TokenAccount>;

    /// Create an empty token account for a registered mint at an address
    /// `authority` acts for. Allocation needs the new address's own
    /// signature: a wallet key for a wallet address, a [`ProgramSigner`]
    /// for a program-derived one.
    ///
    /// # Errors
    /// `Unauthorized` if `authority` is not `address`,
    /// `AccountAlreadyExists` if `address` holds a token account,
    /// `AccountNotFound` if the mint is unknown.
    fn create_token_account(
        &mut self,
        authority: Authority<'_>,
        address: Pubkey,
        mint: Pubkey,
        owner: Pubkey,
    ) -> Result<()>;

    /// Move `amount` units between two accounts of the same mint.
    ///
    /// # Errors
    /// `Unauthorized` if `authority` does not own `from`,
    /// `InvalidTokenAccount` on a mint mismatch, `InsufficientFunds` if
    /// `from` holds less than `amount`.
    fn transfer(
        &mut self,
        authority: Authority<'_>,
        from: &Pubkey,
        to: &Pubkey,
        amount: u64,
    ) -> Result<()>;

    /// Delete an empty token account and send its lamports to
    /// `lamport_destination`. Returns the lamports moved.
    ///
    /// # Errors
    /// `Unauthorized` if `authority` does not own the account,
    /// `InvalidTokenAccount` if its balance is not zero.
    fn close_account(
        &mut self,
        authority: Authority<'_>,
        account: &Pubkey,
        lamport_destination: &Pubkey,
    ) -> Result<u64>;

    /// Lamports held at `address`. Zero for unknown addresses.
    fn lamports(&self, address: &Pubkey) -> u64;

    /// Move lamports out of the authority's own address.
    ///
    /// # Errors
    /// `Unauthorized` if `authority` is not `from`, `InsufficientLamports`
    /// if `from` holds less than `amount`.
    fn transfer_lamports(
        &mut self,
        authority: Authority<'_>,
        from: &Pubkey,
        to: &Pubkey,
        amount: u64,
    ) -> Result<()>;

    /// Sum of all token balances of `mint`.
    fn circulating(&self, mint: &Pubkey) -> Result<u64>;

    /// Check that `mint`'s balances add up to its issuance.
    ///
    /// # Errors
    /// `SupplyInvariantViolation` if they do not.
    fn verify_supply(&self, mint: &Pubkey) -> Result<()>;
}

#[derive(Debug, Clone, Default)]
struct LedgerState {
    /// mint -> mint authority
    mints: HashMap<Pubkey, Pubkey>,
    /// address -> packed token account
    accounts: HashMap<Pubkey, Vec<u8>>,
    lamports: HashMap<Pubkey, u64>,
    supply: SupplyConservation,
}

/// Token ledger held in memory.
#[derive(Debug, Default)]
pub struct InMemoryTokenLedger {
    state: LedgerState,
    checkpoint: Option<LedgerState>,
}

impl InMemoryTokenLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a mint controlled by `authority`.
    ///
    /// # Errors
    /// Returns `AccountAlreadyExists` if the mint is already registered.
    pub fn create_mint(&mut self, mint: Pubkey, authority: Pubkey) -> Result<()> {
        if self.state.mints.contains_key(&mint) {
            return Err(SafepayError::AccountAlreadyExists(mint));
        }
        self.state.mints.insert(mint, authority);
        tracing::debug!(mint = %mint.short(), authority = %authority.short(), "Mint created");
        Ok(())
    }

    /// Issue `amount` new units of `mint` into `account`.
    ///
    /// # Errors
    /// `AccountNotFound` for an unknown mint or account, `Unauthorized` if
    /// `authority` is not the mint authority, `InvalidTokenAccount` if the
    /// account holds another mint.
    pub fn mint_to(
        &mut self,
        authority: Authority<'_>,
        mint: &Pubkey,
        account: &Pubkey,
        amount: u64,
    ) -> Result<()> {
        let mint_authority = *self
            .state
            .mints
            .get(mint)
            .ok_or(SafepayError::AccountNotFound(*mint))?;
        if authority.key() != mint_authority {
            return Err(SafepayError::Unauthorized {
                signer: authority.key(),
            });
        }
        let mut target = self.read(account)?;
        if target.mint != *mint {
            return Err(SafepayError::InvalidTokenAccount {
                account: *account,
                reason: format!("holds mint {}, not {}", target.mint.short(), mint.short()),
            });
        }
        target.amount = target
            .amount
            .checked_add(amount)
            .ok_or_else(|| SafepayError::InvalidAmount {
                amount,
                reason: "account balance would overflow".into(),
            })?;
        self.state.supply.record_issuance(*mint, amount)?;
        self.write(*account, &target);
        tracing::debug!(mint = %mint.short(), account = %account.short(), amount, "Minted");
        Ok(())
    }

    /// Fund `address` with lamports from outside the ledger.
    ///
    /// # Errors
    /// Returns `Internal` if the balance would overflow.
    pub fn airdrop(&mut self, address: Pubkey, lamports: u64) -> Result<()> {
        self.credit_lamports(&address, lamports)
    }

    /// Create the canonical token account for `owner` and `mint` and
    /// return its address. Anyone may do this: the address is fixed by
    /// `(owner, mint)`, so it cannot be used to squat another address.
    ///
    /// # Errors
    /// `AccountAlreadyExists` or `AccountNotFound` as for
    /// [`TokenLedger::create_token_account`].
    pub fn create_associated_account(&mut self, owner: Pubkey, mint: Pubkey) -> Result<Pubkey> {
        let address = associated_token_address(&owner, &mint)?;
        self.allocate(address, mint, owner)?;
        Ok(address)
    }

    /// Overwrite the raw bytes at `address`. Test-only.
    #[cfg(any(test, feature = "test-helpers"))]
    pub fn put_raw(&mut self, address: Pubkey, data: Vec<u8>) {
        self.state.accounts.insert(address, data);
    }

    fn read(&self, address: &Pubkey) -> Result<TokenAccount> {
        let data = self
            .state
            .accounts
            .get(address)
            .ok_or(SafepayError::AccountNotFound(*address))?;
        TokenAccount::unpack(data)
    }

    fn write(&mut self, address: Pubkey, account: &TokenAccount) {
        self.state.accounts.insert(address, account.pack());
    }

    fn allocate(&mut self, address: Pubkey, mint: Pubkey, owner: Pubkey) -> Result<()> {
        if self.state.accounts.contains_key(&address) {
            return Err(SafepayError::AccountAlreadyExists(address));
        }
        if !self.state.mints.contains_key(&mint) {
            return Err(SafepayError::AccountNotFound(mint));
        }
        self.write(address, &TokenAccount::new(mint, owner));
        tracing::debug!(
            account = %address.short(),
            mint = %mint.short(),
            owner = %owner.short(),
            "Token account created"
        );
        Ok(())
    }

    fn credit_lamports(&mut self, to: &Pubkey, amount: u64) -> Result<()> {
        let balance = self.state.lamports.entry(*to).or_insert(0);
        *balance = balance
            .checked_add(amount)
            .ok_or_else(|| SafepayError::Internal(format!("lamport overflow at {}", to.short())))?;
        Ok(())
    }
}

impl TokenLedger for InMemoryTokenLedger {
    fn token_account(&self, address: &Pubkey) -> Result<TokenAccount> {
        self.read(address)
    }

    fn create_token_account(
        &mut self,
        authority: Authority<'_>,
        address: Pubkey,
        mint: Pubkey,
        owner: Pubkey,
    ) -> Result<()> {
        if authority.key() != address {
            tracing::warn!(
                account = %address.short(),
                signer = %authority.key().short(),
                "Account allocation without the address's signature"
            );
            return Err(SafepayError::Unauthorized {
                signer: authority.key(),
            });
        }
        self.allocate(address, mint, owner)
    }

    fn transfer(
        &mut self,
        authority: Authority<'_>,
        from: &Pubkey,
        to: &Pubkey,
        amount: u64,
    ) -> Result<()> {
        let mut source = self.read(from)?;
        let mut dest = self.read(to)?;

        if authority.key() != source.owner {
            return Err(SafepayError::Unauthorized {
                signer: authority.key(),
            });
        }
        if dest.mint != source.mint {
            return Err(SafepayError::InvalidTokenAccount {
                account: *to,
                reason: format!(
                    "holds mint {}, source holds {}",
                    dest.mint.short(),
                    source.mint.short()
                ),
            });
        }
        if source.amount < amount {
            return Err(SafepayError::InsufficientFunds {
                needed: amount,
                available: source.amount,
            });
        }
        if from == to {
            return Ok(());
        }

        source.amount -= amount;
        dest.amount = dest
            .amount
            .checked_add(amount)
            .ok_or_else(|| SafepayError::Internal(format!("balance overflow at {}", to.short())))?;
        self.write(*from, &source);
        self.write(*to, &dest);

        tracing::debug!(
            from = %from.short(),
            to = %to.short(),
            mint = %source.mint.short(),
            amount,
            "Transfer"
        );
        Ok(())
    }

    fn close_account(
        &mut self,
        authority: Authority<'_>,
        account: &Pubkey,
        lamport_destination: &Pubkey,
    ) -> Result<u64> {
        let existing = self.read(account)?;
        if authority.key() != existing.owner {
            return Err(SafepayError::Unauthorized {
                signer: authority.key(),
            });
        }
        if existing.amount != 0 {
            return Err(SafepayError::InvalidTokenAccount {
                account: *account,
                reason: format!("cannot close with balance {}", existing.amount),
            });
        }

        self.state.accounts.remove(account);
        let lamports = self.state.lamports.remove(account).unwrap_or(0);
        self.credit_lamports(lamport_destination, lamports)?;

        tracing::debug!(
            account = %account.short(),
            lamports,
            to = %lamport_destination.short(),
            "Token account closed"
        );
        Ok(lamports)
    }

    fn lamports(&self, address: &Pubkey) -> u64 {
        self.state.lamports.get(address).copied().unwrap_or(0)
    }

    fn transfer_lamports(
        &mut self,
        authority: Authority<'_>,
        from: &Pubkey,
        to: &Pubkey,
        amount: u64,
    ) -> Result<()> {
        if authority.key() != *from {
            return Err(SafepayError::Unauthorized {
                signer: authority.key(),
            });
        }
        let available = self.lamports(from);
        if available < amount {
            return Err(SafepayError::InsufficientLamports {
                needed: amount,
                available,
            });
        }
        self.state.lamports.insert(*from, available - amount);
        self.credit_lamports(to, amount)
    }

    fn circulating(&self, mint: &Pubkey) -> Result<u64> {
        let mut total: u64 = 0;
        for data in self.state.accounts.values() {
            let account = TokenAccount::unpack(data)?;
            if account.mint == *mint {
                total = total.checked_add(account.amount).ok_or_else(|| {
                    SafepayError::SupplyInvariantViolation {
                        reason: format!("balances of mint {} overflow u64", mint.short()),
                    }
                })?;
            }
        }
        Ok(total)
    }

    fn verify_supply(&self, mint: &Pubkey) -> Result<()> {
        self.state.supply.verify(mint, self.circulating(mint)?)
    }
}

impl Transactional for InMemoryTokenLedger {
    fn checkpoint(&mut self) {
        self.checkpoint = Some(self.state.clone());
    }

    fn commit(&mut self) {
        self.checkpoint = None;
    }

    fn rollback(&mut self) {
        if let Some(saved) = self.checkpoint.take() {
            self.state = saved;
        }
    }
}
