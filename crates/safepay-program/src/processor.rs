//! The escrow state machine.
//!
//! ## initiate
//! 1. Reject a zero amount
//! 2. Derive the record and vault addresses for `(sender, receiver, asset)`
//! 3. Reject if any record, open or closed, exists at the record address
//! 4. Check the source account (sender-owned, agreed mint, enough balance)
//!    and the sender's lamports for both rent allowances
//! 5. Allocate the vault under its own program signer, with the record
//!    address as its only authority
//! 6. Fund both rent allowances, deposit the amount
//! 7. Write the record as INITIALIZED
//!
//! ## reclaim / settle
//! 1. Load the record
//! 2. Check the caller's role and the record state (both always evaluated)
//! 3. Re-derive the program signer from the stored bumps
//! 4. Check the vault (mint, authority, balance == amount)
//! 5. Check the destination (owned by the acting party, agreed mint)
//! 6. Release the full amount, close the record, close the vault and
//!    refund both rent allowances to the sender

use std::sync::{Mutex, MutexGuard};

use safepay_derive::{AddressDeriver, EscrowAddresses, EscrowDeriver};
use safepay_ledger::{
    InMemoryRecordStore, InMemoryTokenLedger, LedgerView, RecordStore, Transactional,
};
use safepay_settlement::{SettlementExecutor, TokenSettlementExecutor};
use safepay_types::{
    ErrorClass, EscrowKey, EscrowRecord, EscrowState, Instruction, ProgramConfig, Pubkey,
    Receipt, ReceiptType, Response, Result, Role, SafepayError, SignedRequest, VerifiedSigner,
};

/// The escrow program wired to the in-memory ledger.
pub type InMemoryEscrowProgram = EscrowProgram<
    EscrowDeriver,
    InMemoryRecordStore,
    TokenSettlementExecutor<InMemoryTokenLedger>,
>;

/// State guarded by the program lock.
struct Accounts<S, X> {
    records: S,
    executor: X,
}

/// Two-party token escrow.
pub struct EscrowProgram<D, S, X> {
    config: ProgramConfig,
    deriver: D,
    accounts: Mutex<Accounts<S, X>>,
}

impl InMemoryEscrowProgram {
    /// Program over a fresh in-memory ledger with the default deriver for
    /// `config`.
    pub fn in_memory(config: ProgramConfig) -> Result<Self> {
        let deriver = EscrowDeriver::from_config(&config)?;
        Self::new(
            config,
            deriver,
            InMemoryRecordStore::new(),
            TokenSettlementExecutor::new(InMemoryTokenLedger::new()),
        )
    }
}

impl<D, S, X> EscrowProgram<D, S, X>
where
    D: AddressDeriver,
    S: RecordStore,
    X: SettlementExecutor,
{
    /// Wire a program from its collaborators.
    ///
    /// # Errors
    /// Returns `Configuration` if `config` fails validation.
    pub fn new(config: ProgramConfig, deriver: D, records: S, executor: X) -> Result<Self> {
        config.validate()?;
        tracing::info!(
            program = %config.program_id.short(),
            record_seed = %config.record_seed,
            vault_seed = %config.vault_seed,
            "Escrow program ready"
        );
        Ok(Self {
            config,
            deriver,
            accounts: Mutex::new(Accounts { records, executor }),
        })
    }

    #[must_use]
    pub fn program_id(&self) -> Pubkey {
        self.config.program_id
    }

    #[must_use]
    pub fn config(&self) -> &ProgramConfig {
        &self.config
    }

    /// Where the escrow for this triple lives (or would live).
    pub fn addresses(
        &self,
        sender: Pubkey,
        receiver: Pubkey,
        asset: Pubkey,
    ) -> Result<EscrowAddresses> {
        let key = EscrowKey::new(sender, receiver, asset);
        self.deriver.derive(&self.config.program_id, &key)
    }

    /// Current record at `address`, if any.
    pub fn record(&self, address: &Pubkey) -> Result<Option<EscrowRecord>> {
        self.lock()?.records.load(address)
    }

    /// Run ledger instructions (funding, minting, user transfers) under the
    /// program lock, as one all-or-nothing unit. The ledger is seen through
    /// a [`LedgerView`], which accepts wallet signatures only: program
    /// authority over vaults and records never leaves this type.
    pub fn with_ledger<T>(
        &self,
        f: impl FnOnce(&mut LedgerView<'_, X::Ledger>) -> Result<T>,
    ) -> Result<T> {
        self.transact("ledger", |accounts| {
            f(&mut LedgerView::new(accounts.executor.ledger_mut()))
        })
    }

    /// Lock `amount` of `asset` from the signer's `source` account in a new
    /// escrow for `receiver`.
    ///
    /// # Errors
    /// `InvalidAmount`, `RecordAlreadyExists`, `DerivationFailure`,
    /// `AccountNotFound`, `InvalidTokenAccount`, `InsufficientFunds`,
    /// `InsufficientLamports`.
    pub fn initiate(
        &self,
        signer: &VerifiedSigner,
        receiver: Pubkey,
        asset: Pubkey,
        amount: u64,
        source: Pubkey,
    ) -> Result<Receipt> {
        let sender = signer.key();
        self.transact("initiate", |accounts| {
            if amount == 0 {
                return Err(SafepayError::InvalidAmount {
                    amount,
                    reason: "escrow amount must be positive".into(),
                });
            }

            let key = EscrowKey::new(sender, receiver, asset);
            let addresses = self.deriver.derive(&self.config.program_id, &key)?;
            if accounts.records.load(&addresses.record)?.is_some() {
                return Err(SafepayError::RecordAlreadyExists(addresses.record));
            }
            let vault_signer =
                self.deriver
                    .vault_signer(&self.config.program_id, &key, &addresses)?;

            let funding = accounts.executor.token_account(&source)?;
            funding.expect(source, asset, sender)?;
            if funding.amount < amount {
                return Err(SafepayError::InsufficientFunds {
                    needed: amount,
                    available: funding.amount,
                });
            }
            let rent = self.config.rent_total();
            let lamports = accounts.executor.lamports(&sender);
            if lamports < rent {
                return Err(SafepayError::InsufficientLamports {
                    needed: rent,
                    available: lamports,
                });
            }

            let executor = &mut accounts.executor;
            executor.open_vault(&vault_signer, asset, addresses.record)?;
            executor.fund_rent(signer, addresses.vault, self.config.vault_rent_lamports)?;
            executor.fund_rent(signer, addresses.record, self.config.record_rent_lamports)?;
            executor.deposit(signer, &source, &addresses.vault, amount)?;

            let held = executor.token_account(&addresses.vault)?.amount;
            if held != amount {
                return Err(SafepayError::VaultBalanceMismatch {
                    expected: amount,
                    actual: held,
                });
            }

            let record = EscrowRecord {
                sender,
                receiver,
                asset,
                vault: addresses.vault,
                amount,
                state: EscrowState::Initialized,
                record_bump: addresses.record_bump,
                vault_bump: addresses.vault_bump,
            };
            accounts.records.insert(addresses.record, &record)?;

            tracing::info!(
                record = %addresses.record.short(),
                vault = %addresses.vault.short(),
                sender = %sender.short(),
                receiver = %receiver.short(),
                asset = %asset.short(),
                amount,
                "Escrow initiated"
            );
            Ok(Receipt::new(
                ReceiptType::Initiated,
                addresses.record,
                addresses.vault,
                sender,
                addresses.vault,
                amount,
            ))
        })
    }

    /// Return the escrowed funds to the sender.
    ///
    /// # Errors
    /// `RecordNotFound`, `Unauthorized` (caller is not the sender),
    /// `AlreadyClosed`, `VaultBalanceMismatch`, `InvalidTokenAccount`.
    pub fn reclaim(
        &self,
        signer: &VerifiedSigner,
        record: Pubkey,
        destination: Pubkey,
    ) -> Result<Receipt> {
        self.close_escrow(Role::Sender, signer, record, destination)
    }

    /// Release the escrowed funds to the receiver.
    ///
    /// # Errors
    /// Same as [`reclaim`](Self::reclaim) with the roles swapped.
    pub fn settle(
        &self,
        signer: &VerifiedSigner,
        record: Pubkey,
        destination: Pubkey,
    ) -> Result<Receipt> {
        self.close_escrow(Role::Receiver, signer, record, destination)
    }

    /// Verify a signed request and run its instruction.
    pub fn process(&self, request: &SignedRequest) -> Result<Receipt> {
        let signer = request.verify(&self.config.program_id).inspect_err(|err| {
            tracing::warn!(
                signer = %request.signer.short(),
                instruction = request.instruction.name(),
                error = %err,
                "Request signature rejected"
            );
        })?;
        match request.instruction {
            Instruction::Initiate {
                receiver,
                asset,
                amount,
                source,
            } => self.initiate(&signer, receiver, asset, amount, source),
            Instruction::Reclaim {
                record,
                destination,
            } => self.reclaim(&signer, record, destination),
            Instruction::Settle {
                record,
                destination,
            } => self.settle(&signer, record, destination),
        }
    }

    /// [`process`](Self::process), answered as a public [`Response`].
    pub fn handle(&self, request: &SignedRequest) -> Response {
        Response::from_result(self.process(request))
    }

    fn close_escrow(
        &self,
        role: Role,
        signer: &VerifiedSigner,
        record_address: Pubkey,
        destination: Pubkey,
    ) -> Result<Receipt> {
        let (op, receipt_type) = match role {
            Role::Sender => ("reclaim", ReceiptType::Reclaimed),
            Role::Receiver => ("settle", ReceiptType::Settled),
        };
        self.transact(op, |accounts| {
            let mut record = accounts
                .records
                .load(&record_address)?
                .ok_or(SafepayError::RecordNotFound(record_address))?;

            let party = record.party(role);
            let authorized = signer.key() == party;
            let open = record.is_open();
            if !authorized {
                return Err(SafepayError::Unauthorized {
                    signer: signer.key(),
                });
            }
            if !open {
                return Err(SafepayError::AlreadyClosed(record_address));
            }

            let authority =
                self.deriver
                    .program_signer(&self.config.program_id, &record_address, &record)?;

            let executor = &mut accounts.executor;
            let vault = executor.token_account(&record.vault)?;
            vault.expect(record.vault, record.asset, record_address)?;
            if vault.amount != record.amount {
                return Err(SafepayError::VaultBalanceMismatch {
                    expected: record.amount,
                    actual: vault.amount,
                });
            }
            executor
                .token_account(&destination)?
                .expect(destination, record.asset, party)?;

            executor.release(&authority, &record.vault, &destination, record.amount)?;
            record.close(record_address)?;
            accounts.records.update(record_address, &record)?;

            let executor = &mut accounts.executor;
            let vault_rent = executor.close_vault(&authority, &record.vault, &record.sender)?;
            let record_rent = executor.refund_rent(&authority, &record.sender)?;

            tracing::info!(
                record = %record_address.short(),
                role = %role,
                destination = %destination.short(),
                amount = record.amount,
                rent_refunded = vault_rent.saturating_add(record_rent),
                "Escrow closed"
            );
            Ok(Receipt::new(
                receipt_type,
                record_address,
                record.vault,
                signer.key(),
                destination,
                record.amount,
            ))
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Accounts<S, X>>> {
        self.accounts.lock().map_err(|_| {
            tracing::error!("Escrow account lock poisoned");
            SafepayError::Internal("escrow account lock poisoned".into())
        })
    }

    /// Run `f` with every collaborator checkpointed; commit on `Ok`, roll
    /// everything back on `Err`.
    fn transact<T>(
        &self,
        op: &'static str,
        f: impl FnOnce(&mut Accounts<S, X>) -> Result<T>,
    ) -> Result<T> {
        let mut guard = self.lock()?;
        let accounts = &mut *guard;
        accounts.records.checkpoint();
        accounts.executor.checkpoint();

        match f(accounts) {
            Ok(value) => {
                accounts.records.commit();
                accounts.executor.commit();
                Ok(value)
            }
            Err(err) => {
                accounts.records.rollback();
                accounts.executor.rollback();
                match err.class() {
                    ErrorClass::Integrity | ErrorClass::Internal => {
                        tracing::error!(op, code = %err.code(), error = %err, "Transition aborted");
                    }
                    class => {
                        tracing::warn!(op, %class, code = %err.code(), error = %err, "Transition rejected");
                    }
                }
                Err(err)
            }
        }
    }
}
