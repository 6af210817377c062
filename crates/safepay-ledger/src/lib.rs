//! # safepay-ledger
//!
//! **Account state**: everything an escrow reads or writes lives here.
//!
//! ## Architecture
//!
//! 1. [`RecordStore`]: escrow records by address, stored in their packed
//!    layout and validated on every read.
//! 2. [`TokenLedger`]: token accounts, mints and lamport balances. Every
//!    debit names an [`Authority`] and is refused unless it controls the
//!    debited account.
//! 3. [`SupplyConservation`]: per-mint issuance totals, checked against
//!    the sum of all balances.
//! 4. [`Transactional`]: checkpoint / rollback, so one failed step undoes
//!    the whole operation.
//! 5. [`LedgerView`]: the ledger as seen from outside the escrow program,
//!    where only wallet signatures authorize anything.
//!
//! The in-memory implementations stand in for on-chain account storage.

pub mod record_store;
pub mod supply_conservation;
pub mod token_ledger;
pub mod transactional;
pub mod view;

pub use record_store::{InMemoryRecordStore, RecordStore};
pub use supply_conservation::SupplyConservation;
pub use token_ledger::{Authority, InMemoryTokenLedger, TokenLedger};
pub use transactional::Transactional;
pub use view::LedgerView;
