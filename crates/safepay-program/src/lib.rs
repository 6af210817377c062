//! # safepay-program
//!
//! **Escrow State Machine**: the three transitions of a two-party escrow.
//!
//! ```text
//!   (no record) ──initiate──► INITIALIZED ──reclaim (sender)──► CLOSED
//!                                  │
//!                                  └────settle (receiver)─────► CLOSED
//! ```
//!
//! [`EscrowProgram`] owns the injected collaborators: an
//! [`AddressDeriver`](safepay_derive::AddressDeriver), a
//! [`RecordStore`](safepay_ledger::RecordStore) and a
//! [`SettlementExecutor`](safepay_settlement::SettlementExecutor). Every
//! call runs under one lock as one all-or-nothing unit; a failure at any
//! step rolls the record store and the ledger back together.
//!
//! Callers either invoke the typed methods with a
//! [`VerifiedSigner`](safepay_types::VerifiedSigner) or hand a
//! [`SignedRequest`](safepay_types::SignedRequest) to
//! [`EscrowProgram::handle`], which verifies it and answers with a
//! [`Response`](safepay_types::Response).

pub mod processor;
pub mod telemetry;

pub use processor::{EscrowProgram, InMemoryEscrowProgram};
pub use telemetry::{LogFormat, init_tracing};
