//! # safepay-types
//!
//! Shared types, errors, and configuration for the **SafePay** escrow.
//!
//! This crate is the leaf dependency of the workspace: every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`Pubkey`], [`ReceiptId`]
//! - **Escrow record**: [`EscrowRecord`], [`EscrowState`], [`EscrowKey`], [`Role`]
//! - **Token accounts**: [`TokenAccount`] with its fixed byte layout
//! - **Requests**: [`Instruction`], [`SignedRequest`], [`VerifiedSigner`], [`Response`]
//! - **Receipts**: [`Receipt`], [`ReceiptType`]
//! - **Configuration**: [`ProgramConfig`]
//! - **Errors**: [`SafepayError`] with `SP_ERR_` prefix codes
//! - **Constants**: seed tags, layout versions, program ids

pub mod config;
pub mod constants;
pub mod error;
pub mod ids;
pub mod receipt;
pub mod record;
pub mod request;
pub mod token;

pub use config::*;
pub use error::*;
pub use ids::*;
pub use receipt::*;
pub use record::*;
pub use request::*;
pub use token::*;

// Constants are accessed via `safepay_types::constants::FOO`
// (not re-exported to avoid name collisions).
