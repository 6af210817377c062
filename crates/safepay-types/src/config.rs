//! Configuration for a SafePay program instance.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Pubkey, Result, SafepayError, constants};

/// Configuration for one deployed escrow program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgramConfig {
    /// Id every derived address is bound to.
    pub program_id: Pubkey,
    /// Domain tag for escrow record addresses.
    pub record_seed: String,
    /// Domain tag for custody vault addresses.
    pub vault_seed: String,
    /// Lamports the sender deposits to keep the record alive.
    pub record_rent_lamports: u64,
    /// Lamports the sender deposits to keep the vault alive.
    pub vault_rent_lamports: u64,
}

impl Default for ProgramConfig {
    fn default() -> Self {
        Self {
            program_id: constants::DEFAULT_PROGRAM_ID,
            record_seed: constants::DEFAULT_RECORD_SEED.to_string(),
            vault_seed: constants::DEFAULT_VAULT_SEED.to_string(),
            record_rent_lamports: constants::DEFAULT_RECORD_RENT_LAMPORTS,
            vault_rent_lamports: constants::DEFAULT_VAULT_RENT_LAMPORTS,
        }
    }
}

impl ProgramConfig {
    /// Parse and validate a JSON config. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Check the seed tags.
    ///
    /// # Errors
    /// Returns `Configuration` if a tag is empty, longer than
    /// [`constants::MAX_SEED_LEN`], or both tags are equal (the record and
    /// vault addresses would collide).
    pub fn validate(&self) -> Result<()> {
        for (name, seed) in [("record_seed", &self.record_seed), ("vault_seed", &self.vault_seed)] {
            if seed.is_empty() {
                return Err(SafepayError::Configuration(format!("{name} is empty")));
            }
            if seed.len() > constants::MAX_SEED_LEN {
                return Err(SafepayError::Configuration(format!(
                    "{name} is {} bytes, max {}",
                    seed.len(),
                    constants::MAX_SEED_LEN
                )));
            }
        }
        if self.record_seed == self.vault_seed {
            return Err(SafepayError::Configuration(
                "record_seed and vault_seed must differ".into(),
            ));
        }
        Ok(())
    }

    /// Total lamports an initiate needs from the sender.
    #[must_use]
    pub fn rent_total(&self) -> u64 {
        self.record_rent_lamports
            .saturating_add(self.vault_rent_lamports)
    }
}
