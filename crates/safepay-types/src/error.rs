//! Error types for the SafePay escrow.
//!
//! All errors use the `SP_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by class:
//! - 1xx: Validation errors (caller mistakes)
//! - 2xx: State errors (request no longer applies)
//! - 3xx: Authorization errors
//! - 4xx: Integrity errors (an invariant was violated)
//! - 9xx: General / internal errors
//!
//! No error is retried or recovered locally. Every error aborts the
//! enclosing transition and rolls back all of its effects.

use std::fmt;

use thiserror::Error;

use crate::Pubkey;

/// Public code returned for every authorization or state rejection.
pub const REJECTED_CODE: &str = "SP_ERR_REJECTED";

/// Central error enum for all SafePay operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SafepayError {
    // =================================================================
    // Validation Errors (1xx)
    // =================================================================
    /// The escrow amount is zero.
    #[error("SP_ERR_100: Invalid amount {amount}: {reason}")]
    InvalidAmount { amount: u64, reason: String },

    /// The source token account does not hold enough of the asset.
    #[error("SP_ERR_101: Insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: u64, available: u64 },

    /// The payer cannot cover the rent allowance of the new accounts.
    #[error("SP_ERR_102: Insufficient lamports: need {needed}, have {available}")]
    InsufficientLamports { needed: u64, available: u64 },

    /// A token account has the wrong owner or mint for this operation.
    #[error("SP_ERR_103: Invalid token account {account}: {reason}")]
    InvalidTokenAccount { account: Pubkey, reason: String },

    /// Signature verification failed or the request targets another program.
    #[error("SP_ERR_104: Invalid signature: {reason}")]
    InvalidSignature { reason: String },

    /// The referenced ledger account does not exist.
    #[error("SP_ERR_105: Account not found: {0}")]
    AccountNotFound(Pubkey),

    /// An account already exists at the target address.
    #[error("SP_ERR_106: Account already exists: {0}")]
    AccountAlreadyExists(Pubkey),

    // =================================================================
    // State Errors (2xx)
    // =================================================================
    /// A record already exists (open or closed) for this identity triple.
    #[error("SP_ERR_200: Escrow record already exists: {0}")]
    RecordAlreadyExists(Pubkey),

    /// No escrow record at this address.
    #[error("SP_ERR_201: Escrow record not found: {0}")]
    RecordNotFound(Pubkey),

    /// The escrow was already reclaimed or settled.
    #[error("SP_ERR_202: Escrow already closed: {0}")]
    AlreadyClosed(Pubkey),

    // =================================================================
    // Authorization Errors (3xx)
    // =================================================================
    /// The signer is not the party allowed to perform this transition.
    #[error("SP_ERR_300: Unauthorized signer {signer}")]
    Unauthorized { signer: Pubkey },

    // =================================================================
    // Integrity Errors (4xx)
    // =================================================================
    /// The vault does not hold exactly the escrowed amount.
    #[error("SP_ERR_400: Vault balance mismatch: expected {expected}, found {actual}")]
    VaultBalanceMismatch { expected: u64, actual: u64 },

    /// No valid program address could be derived, or a stored bump no
    /// longer reproduces the stored address.
    #[error("SP_ERR_401: Address derivation failed: {reason}")]
    DerivationFailure { reason: String },

    /// Account bytes failed layout validation on read.
    #[error("SP_ERR_402: Account data corrupt: {reason}")]
    AccountDataCorrupt { reason: String },

    /// Token supply is no longer equal to the sum of account balances.
    #[error("SP_ERR_403: Supply invariant violation: {reason}")]
    SupplyInvariantViolation { reason: String },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("SP_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("SP_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (invalid config file, bad seed tags, etc.).
    #[error("SP_ERR_902: Configuration error: {0}")]
    Configuration(String),

    /// I/O error (disk, network).
    #[error("SP_ERR_903: I/O error: {0}")]
    Io(String),
}

/// The class an error belongs to. Drives logging level and the public
/// response shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    Validation,
    State,
    Authorization,
    Integrity,
    Internal,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "VALIDATION"),
            Self::State => write!(f, "STATE"),
            Self::Authorization => write!(f, "AUTHORIZATION"),
            Self::Integrity => write!(f, "INTEGRITY"),
            Self::Internal => write!(f, "INTERNAL"),
        }
    }
}

impl SafepayError {
    /// Which class of failure this is.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidAmount { .. }
            | Self::InsufficientFunds { .. }
            | Self::InsufficientLamports { .. }
            | Self::InvalidTokenAccount { .. }
            | Self::InvalidSignature { .. }
            | Self::AccountNotFound(_)
            | Self::AccountAlreadyExists(_) => ErrorClass::Validation,
            Self::RecordAlreadyExists(_) | Self::RecordNotFound(_) | Self::AlreadyClosed(_) => {
                ErrorClass::State
            }
            Self::Unauthorized { .. } => ErrorClass::Authorization,
            Self::VaultBalanceMismatch { .. }
            | Self::DerivationFailure { .. }
            | Self::AccountDataCorrupt { .. }
            | Self::SupplyInvariantViolation { .. } => ErrorClass::Integrity,
            Self::Internal(_) | Self::Serialization(_) | Self::Configuration(_) | Self::Io(_) => {
                ErrorClass::Internal
            }
        }
    }

    /// Whether this error is reported to callers as an opaque rejection.
    ///
    /// Authorization and state errors share one public code so a caller
    /// cannot tell a wrong identity apart from a stale request.
    #[must_use]
    pub fn is_opaque_rejection(&self) -> bool {
        matches!(self.class(), ErrorClass::State | ErrorClass::Authorization)
    }

    /// The `SP_ERR_nnn` code of this error.
    #[must_use]
    pub fn code(&self) -> String {
        let msg = self.to_string();
        msg.split(':').next().unwrap_or("SP_ERR_900").to_string()
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, SafepayError>;

impl From<std::io::Error> for SafepayError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for SafepayError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_contains_prefix() {
        let err = SafepayError::RecordNotFound(Pubkey([7u8; 32]));
        let msg = format!("{err}");
        assert!(msg.starts_with("SP_ERR_201"), "Got: {msg}");
    }

    #[test]
    fn insufficient_funds_display() {
        let err = SafepayError::InsufficientFunds {
            needed: 100,
            available: 50,
        };
        let msg = format!("{err}");
        assert!(msg.contains("SP_ERR_101"));
        assert!(msg.contains("100"));
        assert!(msg.contains("50"));
    }

    #[test]
    fn code_is_prefix_of_display() {
        let err = SafepayError::VaultBalanceMismatch {
            expected: 10,
            actual: 11,
        };
        assert_eq!(err.code(), "SP_ERR_400");
        assert_eq!(SafepayError::Internal("x".into()).code(), "SP_ERR_900");
    }

    #[test]
    fn classes() {
        let key = Pubkey([1u8; 32]);
        assert_eq!(
            SafepayError::InvalidAmount {
                amount: 0,
                reason: "zero".into()
            }
            .class(),
            ErrorClass::Validation
        );
        assert_eq!(SafepayError::AlreadyClosed(key).class(), ErrorClass::State);
        assert_eq!(
            SafepayError::Unauthorized { signer: key }.class(),
            ErrorClass::Authorization
        );
        assert_eq!(
            SafepayError::DerivationFailure {
                reason: "none".into()
            }
            .class(),
            ErrorClass::Integrity
        );
    }

    #[test]
    fn authorization_and_state_are_opaque() {
        let key = Pubkey([1u8; 32]);
        assert!(SafepayError::Unauthorized { signer: key }.is_opaque_rejection());
        assert!(SafepayError::AlreadyClosed(key).is_opaque_rejection());
        assert!(SafepayError::RecordNotFound(key).is_opaque_rejection());
        assert!(
            !SafepayError::VaultBalanceMismatch {
                expected: 1,
                actual: 2
            }
            .is_opaque_rejection()
        );
    }

    #[test]
    fn all_errors_have_sp_err_prefix() {
        let key = Pubkey([2u8; 32]);
        let errors: Vec<Box<dyn std::error::Error>> = vec![
            Box::new(SafepayError::AccountNotFound(key)),
            Box::new(SafepayError::RecordAlreadyExists(key)),
            Box::new(SafepayError::Unauthorized { signer: key }),
            Box::new(SafepayError::Internal("test".into())),
            Box::new(SafepayError::AccountDataCorrupt {
                reason: "short".into(),
            }),
        ];
        for err in errors {
            let msg = format!("{err}");
            assert!(
                msg.starts_with("SP_ERR_"),
                "Error missing SP_ERR_ prefix: {msg}"
            );
        }
    }
}
