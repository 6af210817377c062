//! # safepay-derive
//!
//! **Address Deriver**: pure, deterministic computation of the addresses
//! an escrow lives at.
//!
//! ## Architecture
//!
//! 1. [`pda`]: program-address primitives (`create_program_address`,
//!    `find_program_address`). An address is valid only if it is *not* an
//!    ed25519 point, so no private key can exist for it.
//! 2. [`escrow_addresses`]: the [`AddressDeriver`] seam and the default
//!    [`EscrowDeriver`], which turns an identity triple into a record
//!    address and a vault address.
//! 3. [`signer`]: [`ProgramSigner`], the capability that authorizes moving
//!    funds out of a program-owned account. It can only be obtained by
//!    re-deriving the address from its seeds.
//!
//! Nothing here touches state. Identical inputs always give identical
//! outputs, on every machine.

pub mod escrow_addresses;
pub mod pda;
pub mod signer;

pub use escrow_addresses::{AddressDeriver, EscrowAddresses, EscrowDeriver};
pub use pda::{associated_token_address, create_program_address, find_program_address};
pub use signer::ProgramSigner;
