//! Program-derived signing authority.
//!
//! A program-derived address has no private key. The only thing that can
//! move funds out of an account it owns is a [`ProgramSigner`], and the
//! only way to obtain one is to present the seeds and bump that reproduce
//! the address under the program's id. Construction is private to this
//! crate: callers receive signers through
//! [`AddressDeriver`](crate::AddressDeriver), and ledgers handed to code
//! outside the escrow program refuse them outright.

use safepay_types::{Pubkey, Result, SafepayError};

use crate::pda::create_program_address;

/// Capability to act as a program-derived address.
///
/// Fields are private: holders can read the address but never forge one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramSigner {
    program_id: Pubkey,
    address: Pubkey,
}

impl ProgramSigner {
    /// Re-derive `expected` from `seeds` (bump last) under `program_id`.
    ///
    /// # Errors
    /// Returns `DerivationFailure` if the seeds are invalid or reproduce a
    /// different address.
    pub(crate) fn from_seeds(
        seeds: &[&[u8]],
        program_id: &Pubkey,
        expected: &Pubkey,
    ) -> Result<Self> {
        let address = create_program_address(seeds, program_id)?;
        if address != *expected {
            return Err(SafepayError::DerivationFailure {
                reason: format!(
                    "seeds derive {}, expected {}",
                    address.short(),
                    expected.short()
                ),
            });
        }
        Ok(Self {
            program_id: *program_id,
            address,
        })
    }

    /// Test-only: same re-derivation without going through a deriver.
    ///
    /// # Errors
    /// Returns `DerivationFailure` if the seeds do not reproduce `expected`.
    #[cfg(any(test, feature = "test-helpers"))]
    pub fn test_signer(seeds: &[&[u8]], program_id: &Pubkey, expected: &Pubkey) -> Result<Self> {
        Self::from_seeds(seeds, program_id, expected)
    }

    /// The address this capability acts for.
    #[must_use]
    pub fn address(&self) -> Pubkey {
        self.address
    }

    /// The program the address is bound to.
    #[must_use]
    pub fn program_id(&self) -> Pubkey {
        self.program_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pda::find_program_address;

    #[test]
    fn matching_seeds_yield_signer() {
        let program = Pubkey::new_unique();
        let (address, bump) = find_program_address(&[b"vault"], &program).unwrap();
        let signer = ProgramSigner::from_seeds(&[b"vault", &[bump]], &program, &address).unwrap();
        assert_eq!(signer.address(), address);
        assert_eq!(signer.program_id(), program);
    }

    #[test]
    fn wrong_bump_rejected() {
        let program = Pubkey::new_unique();
        let (address, bump) = find_program_address(&[b"vault"], &program).unwrap();
        let other = bump.wrapping_sub(1);
        let err = ProgramSigner::from_seeds(&[b"vault", &[other]], &program, &address).unwrap_err();
        assert!(matches!(err, SafepayError::DerivationFailure { .. }));
    }

    #[test]
    fn other_program_rejected() {
        let program = Pubkey::new_unique();
        let (address, bump) = find_program_address(&[b"vault"], &program).unwrap();
        let intruder = Pubkey::new_unique();
        assert!(ProgramSigner::from_seeds(&[b"vault", &[bump]], &intruder, &address).is_err());
    }
}
