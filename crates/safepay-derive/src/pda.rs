//! Program-address derivation.
//!
//! ```text
//! address = SHA-256(seed_0 || … || seed_n || program_id || "ProgramDerivedAddress")
//! ```
//!
//! The result is rejected if it decompresses to a valid Edwards point.
//! [`find_program_address`] appends a one-byte bump seed and walks it down
//! from 255 until the hash lands off the curve; the first hit is the
//! canonical bump.

use curve25519_dalek::edwards::CompressedEdwardsY;
use safepay_types::{Pubkey, Result, SafepayError, constants};
use sha2::{Digest, Sha256};

/// Whether `bytes` is the compressed form of a valid ed25519 point.
#[must_use]
pub fn is_on_curve(bytes: &[u8; 32]) -> bool {
    CompressedEdwardsY(*bytes).decompress().is_some()
}

fn check_seeds(seeds: &[&[u8]], max_seeds: usize) -> Result<()> {
    if seeds.len() > max_seeds {
        return Err(SafepayError::DerivationFailure {
            reason: format!("{} seeds, max {max_seeds}", seeds.len()),
        });
    }
    if let Some(seed) = seeds.iter().find(|s| s.len() > constants::MAX_SEED_LEN) {
        return Err(SafepayError::DerivationFailure {
            reason: format!("seed of {} bytes, max {}", seed.len(), constants::MAX_SEED_LEN),
        });
    }
    Ok(())
}

fn hash_seeds(seeds: &[&[u8]], bump: Option<u8>, program_id: &Pubkey) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for seed in seeds {
        hasher.update(seed);
    }
    if let Some(bump) = bump {
        hasher.update([bump]);
    }
    hasher.update(program_id.as_ref());
    hasher.update(constants::PDA_MARKER);
    hasher.finalize().into()
}

/// Derive the program address for an exact seed list (bump included).
///
/// # Errors
/// Returns `DerivationFailure` if there are too many seeds, a seed is too
/// long, or the hash is a valid curve point.
pub fn create_program_address(seeds: &[&[u8]], program_id: &Pubkey) -> Result<Pubkey> {
    check_seeds(seeds, constants::MAX_SEEDS)?;
    let hash = hash_seeds(seeds, None, program_id);
    if is_on_curve(&hash) {
        return Err(SafepayError::DerivationFailure {
            reason: "derived address is on the ed25519 curve".into(),
        });
    }
    Ok(Pubkey(hash))
}

/// Search for the canonical bump: the highest value in `255..=1` whose
/// address is off the curve.
///
/// # Errors
/// Returns `DerivationFailure` if no bump in the search space works, or
/// the seeds themselves are invalid.
pub fn find_program_address(seeds: &[&[u8]], program_id: &Pubkey) -> Result<(Pubkey, u8)> {
    // One slot is reserved for the bump.
    check_seeds(seeds, constants::MAX_SEEDS - 1)?;
    for bump in (1..=u8::MAX).rev() {
        let hash = hash_seeds(seeds, Some(bump), program_id);
        if !is_on_curve(&hash) {
            return Ok((Pubkey(hash), bump));
        }
    }
    tracing::error!(
        program = %program_id.short(),
        seeds = seeds.len(),
        "No off-curve bump in search space"
    );
    Err(SafepayError::DerivationFailure {
        reason: "no viable bump seed".into(),
    })
}

/// Canonical token account address for `owner` holding `mint`.
///
/// Seeds: `[owner, TOKEN_PROGRAM_ID, mint]` under the associated-token
/// program.
///
/// # Errors
/// Returns `DerivationFailure` if no bump works.
pub fn associated_token_address(owner: &Pubkey, mint: &Pubkey) -> Result<Pubkey> {
    let seeds: [&[u8]; 3] = [
        owner.as_ref(),
        constants::TOKEN_PROGRAM_ID.as_ref(),
        mint.as_ref(),
    ];
    find_program_address(&seeds, &constants::ASSOCIATED_TOKEN_PROGRAM_ID).map(|(address, _)| address)
}

#[cfg(test)]
mod tests {
    use ed25519_dalek::SigningKey;
    use rand::rngs::OsRng;

    use super::*;

    #[test]
    fn find_is_deterministic() {
        let program = Pubkey([3u8; 32]);
        let a = find_program_address(&[b"tag", &[1u8; 32]], &program).unwrap();
        let b = find_program_address(&[b"tag", &[1u8; 32]], &program).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn found_address_is_off_curve_and_reproducible() {
        let program = Pubkey::new_unique();
        let seed = Pubkey::new_unique();
        let (address, bump) = find_program_address(&[b"tag", seed.as_ref()], &program).unwrap();
        assert!(!is_on_curve(address.as_bytes()));
        let again = create_program_address(&[b"tag", seed.as_ref(), &[bump]], &program).unwrap();
        assert_eq!(address, again);
    }

    #[test]
    fn canonical_bump_is_highest_viable() {
        let program = Pubkey::new_unique();
        let (_, bump) = find_program_address(&[b"x"], &program).unwrap();
        for higher in (u16::from(bump) + 1)..=u16::from(u8::MAX) {
            let higher = u8::try_from(higher).unwrap();
            assert!(create_program_address(&[b"x", &[higher]], &program).is_err());
        }
    }

    #[test]
    fn different_program_different_address() {
        let seeds: [&[u8]; 1] = [b"same"];
        let a = find_program_address(&seeds, &Pubkey([1u8; 32])).unwrap();
        let b = find_program_address(&seeds, &Pubkey([2u8; 32])).unwrap();
        assert_ne!(a.0, b.0);
    }

    #[test]
    fn wallet_keys_are_on_curve() {
        let key = SigningKey::generate(&mut OsRng);
        assert!(is_on_curve(key.verifying_key().as_bytes()));
    }

    #[test]
    fn oversized_seed_rejected() {
        let long = [0u8; 33];
        let err = find_program_address(&[&long], &Pubkey([1u8; 32])).unwrap_err();
        assert!(matches!(err, SafepayError::DerivationFailure { .. }));
    }

    #[test]
    fn too_many_seeds_rejected() {
        let seed: &[u8] = b"s";
        let seeds = vec![seed; constants::MAX_SEEDS];
        assert!(find_program_address(&seeds, &Pubkey([1u8; 32])).is_err());
        let seeds = vec![seed; constants::MAX_SEEDS + 1];
        assert!(create_program_address(&seeds, &Pubkey([1u8; 32])).is_err());
    }

    #[test]
    fn associated_token_address_per_mint() {
        let owner = Pubkey::new_unique();
        let a = associated_token_address(&owner, &Pubkey([1u8; 32])).unwrap();
        let b = associated_token_address(&owner, &Pubkey([2u8; 32])).unwrap();
        assert_ne!(a, b);
        assert_eq!(a, associated_token_address(&owner, &Pubkey([1u8; 32])).unwrap());
    }
}
