//! System-wide constants for the SafePay escrow.

use crate::Pubkey;

/// Default domain tag mixed into the escrow record address.
pub const DEFAULT_RECORD_SEED: &str = "safe_pay_state";

/// Default domain tag mixed into the custody vault address.
pub const DEFAULT_VAULT_SEED: &str = "safe_pay_wallet";

/// Maximum number of seeds accepted by program-address derivation.
pub const MAX_SEEDS: usize = 16;

/// Maximum length in bytes of a single derivation seed.
pub const MAX_SEED_LEN: usize = 32;

/// Marker appended to every program-address hash input.
pub const PDA_MARKER: &[u8] = b"ProgramDerivedAddress";

/// Current escrow record layout version.
pub const RECORD_LAYOUT_VERSION: u8 = 1;

/// Current token account layout version.
pub const TOKEN_ACCOUNT_LAYOUT_VERSION: u8 = 1;

/// Domain string hashed to produce the escrow record discriminator.
pub const RECORD_DISCRIMINATOR_DOMAIN: &[u8] = b"safepay:account:EscrowRecord";

/// Domain prefix for signed request payloads.
pub const REQUEST_DOMAIN: &[u8] = b"safepay:request:v1:";

/// Domain prefix for receipt digests.
pub const RECEIPT_DOMAIN: &[u8] = b"safepay:receipt:v1:";

/// Default rent allowance (lamports) for an escrow record account.
pub const DEFAULT_RECORD_RENT_LAMPORTS: u64 = 1_920_960;

/// Default rent allowance (lamports) for a vault token account.
pub const DEFAULT_VAULT_RENT_LAMPORTS: u64 = 2_039_280;

/// Default SafePay program id.
pub const DEFAULT_PROGRAM_ID: Pubkey = Pubkey([
    0xd7, 0x5c, 0x1a, 0x3e, 0x92, 0x08, 0x4b, 0x6f, 0x21, 0xa0, 0x77, 0xc3, 0x5e, 0x19, 0x8d,
    0xf4, 0x06, 0xbb, 0x42, 0x91, 0x3a, 0xe8, 0x60, 0x2d, 0xc5, 0x17, 0x9f, 0x84, 0x0e, 0x73,
    0xaa, 0x31,
]);

/// Id of the token program that owns every token account.
pub const TOKEN_PROGRAM_ID: Pubkey = Pubkey([
    0x06, 0xdd, 0xf6, 0xe1, 0xd7, 0x65, 0xa1, 0x93, 0xd9, 0xcb, 0xe1, 0x46, 0xce, 0xeb, 0x79,
    0xac, 0x1c, 0xb4, 0x85, 0xed, 0x5f, 0x5b, 0x37, 0x91, 0x3a, 0x8c, 0xf5, 0x85, 0x7e, 0xff,
    0x00, 0xa9,
]);

/// Id of the associated-token-account program.
pub const ASSOCIATED_TOKEN_PROGRAM_ID: Pubkey = Pubkey([
    0x8c, 0x97, 0x25, 0x8f, 0x4e, 0x24, 0x89, 0xf1, 0xbb, 0x3d, 0x10, 0x29, 0x14, 0x8e, 0x0d,
    0x83, 0x0b, 0x5a, 0x13, 0x99, 0xda, 0xff, 0x10, 0x84, 0x04, 0x8e, 0x7b, 0xd8, 0xdb, 0xe9,
    0xf8, 0x59,
]);

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
