//! # safepay-settlement
//!
//! **Settlement Executor**: the only code that moves escrowed value.
//!
//! ## Legs
//!
//! - **Inbound** (initiate): open the vault, take the rent allowances from
//!   the sender, move the escrowed amount from the sender's account into
//!   the vault. Authorized by the sender's [`VerifiedSigner`].
//! - **Outbound** (reclaim / settle): move the vault balance to the
//!   winning party, close the vault and refund both rent allowances.
//!   Authorized only by the record's [`ProgramSigner`].
//!
//! Every leg fails closed: an error is logged and returned unchanged, and
//! the caller rolls the whole transition back.
//!
//! [`VerifiedSigner`]: safepay_types::VerifiedSigner
//! [`ProgramSigner`]: safepay_derive::ProgramSigner

pub mod executor;

pub use executor::{SettlementExecutor, TokenSettlementExecutor};
