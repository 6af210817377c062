//! Vault funding, release and retirement on top of a [`TokenLedger`].

use safepay_derive::ProgramSigner;
use safepay_ledger::{Authority, TokenLedger, Transactional};
use safepay_types::{Pubkey, Result, TokenAccount, VerifiedSigner};

/// Moves escrowed value. Injected into the escrow program.
pub trait SettlementExecutor: Transactional + Send {
    /// The ledger the executor settles against.
    type Ledger: TokenLedger;

    fn ledger(&self) -> &Self::Ledger;

    fn ledger_mut(&mut self) -> &mut Self::Ledger;

    /// Allocate an empty vault for `asset` controlled by `authority`.
    /// `vault` signs for its own address.
    fn open_vault(
        &mut self,
        vault: &ProgramSigner,
        asset: Pubkey,
        authority: Pubkey,
    ) -> Result<()>;

    /// Take `lamports` from the payer's wallet into `account`.
    fn fund_rent(&mut self, payer: &VerifiedSigner, account: Pubkey, lamports: u64) -> Result<()>;

    /// Inbound leg: `amount` from the signer's `source` into `vault`.
    fn deposit(
        &mut self,
        signer: &VerifiedSigner,
        source: &Pubkey,
        vault: &Pubkey,
        amount: u64,
    ) -> Result<()>;

    /// Outbound leg: `amount` from `vault` into `destination`.
    fn release(
        &mut self,
        signer: &ProgramSigner,
        vault: &Pubkey,
        destination: &Pubkey,
        amount: u64,
    ) -> Result<()>;

    /// Delete the (empty) vault and send its lamports to
    /// `rent_destination`. Returns the lamports refunded.
    fn close_vault(
        &mut self,
        signer: &ProgramSigner,
        vault: &Pubkey,
        rent_destination: &Pubkey,
    ) -> Result<u64>;

    /// Return every lamport held at the signer's own address to `to`.
    fn refund_rent(&mut self, signer: &ProgramSigner, to: &Pubkey) -> Result<u64>;

    fn token_account(&self, address: &Pubkey) -> Result<TokenAccount> {
        self.ledger().token_account(address)
    }

    fn lamports(&self, address: &Pubkey) -> u64 {
        self.ledger().lamports(address)
    }
}

/// Executor that issues plain ledger instructions.
#[derive(Debug, Default)]
pub struct TokenSettlementExecutor<L> {
    ledger: L,
}

impl<L: TokenLedger> TokenSettlementExecutor<L> {
    #[must_use]
    pub fn new(ledger: L) -> Self {
        Self { ledger }
    }

    #[must_use]
    pub fn into_inner(self) -> L {
        self.ledger
    }
}

fn fail_closed<T>(leg: &'static str, result: Result<T>) -> Result<T> {
    if let Err(err) = &result {
        tracing::warn!(leg, code = %err.code(), error = %err, "Settlement leg failed");
    }
    result
}

impl<L: TokenLedger> SettlementExecutor for TokenSettlementExecutor<L> {
    type Ledger = L;

    fn ledger(&self) -> &L {
        &self.ledger
    }

    fn ledger_mut(&mut self) -> &mut L {
        &mut self.ledger
    }

    fn open_vault(
        &mut self,
        vault: &ProgramSigner,
        asset: Pubkey,
        authority: Pubkey,
    ) -> Result<()> {
        fail_closed(
            "open_vault",
            self.ledger.create_token_account(
                Authority::Program(vault),
                vault.address(),
                asset,
                authority,
            ),
        )
    }

    fn fund_rent(&mut self, payer: &VerifiedSigner, account: Pubkey, lamports: u64) -> Result<()> {
        let from = payer.key();
        fail_closed(
            "fund_rent",
            self.ledger
                .transfer_lamports(Authority::Signer(payer), &from, &account, lamports),
        )
    }

    fn deposit(
        &mut self,
        signer: &VerifiedSigner,
        source: &Pubkey,
        vault: &Pubkey,
        amount: u64,
    ) -> Result<()> {
        fail_closed(
            "deposit",
            self.ledger
                .transfer(Authority::Signer(signer), source, vault, amount),
        )?;
        tracing::debug!(
            source = %source.short(),
            vault = %vault.short(),
            amount,
            "Escrow deposited"
        );
        Ok(())
    }

    fn release(
        &mut self,
        signer: &ProgramSigner,
        vault: &Pubkey,
        destination: &Pubkey,
        amount: u64,
    ) -> Result<()> {
        fail_closed(
            "release",
            self.ledger
                .transfer(Authority::Program(signer), vault, destination, amount),
        )?;
        tracing::debug!(
            vault = %vault.short(),
            destination = %destination.short(),
            amount,
            "Escrow released"
        );
        Ok(())
    }

    fn close_vault(
        &mut self,
        signer: &ProgramSigner,
        vault: &Pubkey,
        rent_destination: &Pubkey,
    ) -> Result<u64> {
        fail_closed(
            "close_vault",
            self.ledger
                .close_account(Authority::Program(signer), vault, rent_destination),
        )
    }

    fn refund_rent(&mut self, signer: &ProgramSigner, to: &Pubkey) -> Result<u64> {
        let from = signer.address();
        let lamports = self.ledger.lamports(&from);
        fail_closed(
            "refund_rent",
            self.ledger
                .transfer_lamports(Authority::Program(signer), &from, to, lamports),
        )?;
        Ok(lamports)
    }
}

impl<L: TokenLedger> Transactional for TokenSettlementExecutor<L> {
    fn checkpoint(&mut self) {
        self.ledger.checkpoint();
    }

    fn commit(&mut self) {
        self.ledger.commit();
    }

    fn rollback(&mut self) {
        self.ledger.rollback();
    }
}
