//! Escrow address derivation.
//!
//! Both addresses of an escrow come from the same identity triple, each
//! under its own domain tag:
//!
//! ```text
//! record = find_program_address([record_tag, sender, receiver, asset], program_id)
//! vault  = find_program_address([vault_tag,  sender, receiver, asset], program_id)
//! ```
//!
//! Distinct tags keep the two addresses apart. The same triple always
//! lands on the same record, which is what makes a second initiate for it
//! collide instead of opening a second vault.

use safepay_types::{EscrowKey, EscrowRecord, ProgramConfig, Pubkey, Result, SafepayError};

use crate::{pda::create_program_address, pda::find_program_address, signer::ProgramSigner};

/// Both addresses of one escrow plus the bumps that reproduce them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscrowAddresses {
    pub record: Pubkey,
    pub record_bump: u8,
    pub vault: Pubkey,
    pub vault_bump: u8,
}

/// Pure address derivation, injected into the escrow program.
pub trait AddressDeriver: Send + Sync {
    /// Compute the record and vault addresses for an identity triple.
    fn derive(&self, program_id: &Pubkey, key: &EscrowKey) -> Result<EscrowAddresses>;

    /// Signer for the vault address itself, needed to allocate the vault
    /// account at initiate.
    ///
    /// # Errors
    /// Returns `DerivationFailure` if `addresses.vault_bump` does not
    /// reproduce `addresses.vault`.
    fn vault_signer(
        &self,
        program_id: &Pubkey,
        key: &EscrowKey,
        addresses: &EscrowAddresses,
    ) -> Result<ProgramSigner>;

    /// Re-derive both stored addresses of `record` from its stored bumps
    /// and return the signer for the record address, which is the vault's
    /// authority.
    ///
    /// # Errors
    /// Returns `DerivationFailure` if either address no longer reproduces.
    fn program_signer(
        &self,
        program_id: &Pubkey,
        record_address: &Pubkey,
        record: &EscrowRecord,
    ) -> Result<ProgramSigner>;
}

/// The default deriver: `[tag, sender, receiver, asset]` seeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscrowDeriver {
    record_seed: Vec<u8>,
    vault_seed: Vec<u8>,
}

impl EscrowDeriver {
    /// # Errors
    /// Returns `Configuration` if the tags are equal.
    pub fn new(record_seed: impl Into<Vec<u8>>, vault_seed: impl Into<Vec<u8>>) -> Result<Self> {
        let record_seed = record_seed.into();
        let vault_seed = vault_seed.into();
        if record_seed == vault_seed {
            return Err(SafepayError::Configuration(
                "record and vault seed tags must differ".into(),
            ));
        }
        Ok(Self {
            record_seed,
            vault_seed,
        })
    }

    /// Build from a validated program config.
    pub fn from_config(config: &ProgramConfig) -> Result<Self> {
        config.validate()?;
        Self::new(config.record_seed.as_bytes(), config.vault_seed.as_bytes())
    }

    fn seeds<'a>(tag: &'a [u8], key: &'a EscrowKey) -> [&'a [u8]; 4] {
        [
            tag,
            key.sender.as_ref(),
            key.receiver.as_ref(),
            key.asset.as_ref(),
        ]
    }
}

impl Default for EscrowDeriver {
    fn default() -> Self {
        Self {
            record_seed: safepay_types::constants::DEFAULT_RECORD_SEED.as_bytes().to_vec(),
            vault_seed: safepay_types::constants::DEFAULT_VAULT_SEED.as_bytes().to_vec(),
        }
    }
}

impl AddressDeriver for EscrowDeriver {
    fn derive(&self, program_id: &Pubkey, key: &EscrowKey) -> Result<EscrowAddresses> {
        let (record, record_bump) =
            find_program_address(&Self::seeds(&self.record_seed, key), program_id)?;
        let (vault, vault_bump) =
            find_program_address(&Self::seeds(&self.vault_seed, key), program_id)?;
        Ok(EscrowAddresses {
            record,
            record_bump,
            vault,
            vault_bump,
        })
    }

    fn vault_signer(
        &self,
        program_id: &Pubkey,
        key: &EscrowKey,
        addresses: &EscrowAddresses,
    ) -> Result<ProgramSigner> {
        let [tag, sender, receiver, asset] = Self::seeds(&self.vault_seed, key);
        ProgramSigner::from_seeds(
            &[tag, sender, receiver, asset, &[addresses.vault_bump]],
            program_id,
            &addresses.vault,
        )
    }

    fn program_signer(
        &self,
        program_id: &Pubkey,
        record_address: &Pubkey,
        record: &EscrowRecord,
    ) -> Result<ProgramSigner> {
        let key = record.key();

        let [tag, sender, receiver, asset] = Self::seeds(&self.vault_seed, &key);
        let vault = create_program_address(
            &[tag, sender, receiver, asset, &[record.vault_bump]],
            program_id,
        )?;
        if vault != record.vault {
            tracing::error!(
                record = %record_address.short(),
                stored = %record.vault.short(),
                derived = %vault.short(),
                "Stored vault address does not reproduce"
            );
            return Err(SafepayError::DerivationFailure {
                reason: format!(
                    "vault bump derives {}, record says {}",
                    vault.short(),
                    record.vault.short()
                ),
            });
        }

        let [tag, sender, receiver, asset] = Self::seeds(&self.record_seed, &key);
        ProgramSigner::from_seeds(
            &[tag, sender, receiver, asset, &[record.record_bump]],
            program_id,
            record_address,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use safepay_types::EscrowState;

    fn key() -> EscrowKey {
        EscrowKey::new(Pubkey::new_unique(), Pubkey::new_unique(), Pubkey::new_unique())
    }

    fn record_for(addresses: &EscrowAddresses, key: &EscrowKey) -> EscrowRecord {
        EscrowRecord {
            sender: key.sender,
            receiver: key.receiver,
            asset: key.asset,
            vault: addresses.vault,
            amount: 10,
            state: EscrowState::Initialized,
            record_bump: addresses.record_bump,
            vault_bump: addresses.vault_bump,
        }
    }

    #[test]
    fn derive_is_pure() {
        let deriver = EscrowDeriver::default();
        let program = Pubkey::new_unique();
        let k = key();
        assert_eq!(
            deriver.derive(&program, &k).unwrap(),
            deriver.derive(&program, &k).unwrap()
        );
    }

    #[test]
    fn record_and_vault_never_collide() {
        let deriver = EscrowDeriver::default();
        let program = Pubkey::new_unique();
        for _ in 0..16 {
            let a = deriver.derive(&program, &key()).unwrap();
            assert_ne!(a.record, a.vault);
        }
    }

    #[test]
    fn swapping_roles_changes_addresses() {
        let deriver = EscrowDeriver::default();
        let program = Pubkey::new_unique();
        let k = key();
        let swapped = EscrowKey::new(k.receiver, k.sender, k.asset);
        assert_ne!(
            deriver.derive(&program, &k).unwrap().record,
            deriver.derive(&program, &swapped).unwrap().record
        );
    }

    #[test]
    fn equal_tags_rejected() {
        assert!(EscrowDeriver::new("same", "same").is_err());
    }

    #[test]
    fn program_signer_for_stored_record() {
        let deriver = EscrowDeriver::default();
        let program = Pubkey::new_unique();
        let k = key();
        let addresses = deriver.derive(&program, &k).unwrap();
        let record = record_for(&addresses, &k);
        let signer = deriver
            .program_signer(&program, &addresses.record, &record)
            .unwrap();
        assert_eq!(signer.address(), addresses.record);
    }

    #[test]
    fn vault_signer_matches_derived_vault() {
        let deriver = EscrowDeriver::default();
        let program = Pubkey::new_unique();
        let k = key();
        let addresses = deriver.derive(&program, &k).unwrap();
        let signer = deriver.vault_signer(&program, &k, &addresses).unwrap();
        assert_eq!(signer.address(), addresses.vault);

        let mut wrong = addresses;
        wrong.vault_bump = wrong.vault_bump.wrapping_sub(1);
        assert!(deriver.vault_signer(&program, &k, &wrong).is_err());
    }

    #[test]
    fn program_signer_rejects_tampered_vault() {
        let deriver = EscrowDeriver::default();
        let program = Pubkey::new_unique();
        let k = key();
        let addresses = deriver.derive(&program, &k).unwrap();
        let mut record = record_for(&addresses, &k);
        record.vault = Pubkey::new_unique();
        let err = deriver
            .program_signer(&program, &addresses.record, &record)
            .unwrap_err();
        assert!(matches!(err, SafepayError::DerivationFailure { .. }));
    }

    #[test]
    fn program_signer_rejects_foreign_record_address() {
        let deriver = EscrowDeriver::default();
        let program = Pubkey::new_unique();
        let k = key();
        let addresses = deriver.derive(&program, &k).unwrap();
        let record = record_for(&addresses, &k);
        assert!(
            deriver
                .program_signer(&program, &Pubkey::new_unique(), &record)
                .is_err()
        );
    }
}
