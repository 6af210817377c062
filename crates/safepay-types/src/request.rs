//! Signed requests: the only way a caller can drive a transition.
//!
//! A request names the target program, the [`Instruction`], the signer's
//! key and an ed25519 signature over
//! `"safepay:request:v1:" || program_id || instruction.pack()`.
//!
//! Verifying a request yields a [`VerifiedSigner`]. That value cannot be
//! built any other way than by checking a signature, so code that takes a
//! `&VerifiedSigner` knows the key really authorized the call.
//!
//! ## Instruction wire encoding
//!
//! | Tag | Instruction | Fields (in order) | Size |
//! |----:|-------------|-------------------|-----:|
//! | 0 | `Initiate` | receiver 32, asset 32, amount u64 LE, source 32 | 105 |
//! | 1 | `Reclaim`  | record 32, destination 32 | 65 |
//! | 2 | `Settle`   | record 32, destination 32 | 65 |

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::{Pubkey, Receipt, Result, SafepayError, constants, error::REJECTED_CODE};

const TAG_INITIATE: u8 = 0;
const TAG_RECLAIM: u8 = 1;
const TAG_SETTLE: u8 = 2;

/// Bytes after the tag: receiver, asset, amount, source.
const INITIATE_BODY_LEN: usize = 3 * Pubkey::LEN + 8;
/// Bytes after the tag: record, destination.
const CLOSE_BODY_LEN: usize = 2 * Pubkey::LEN;

/// An escrow operation and its parameters. The signer is implied by the
/// enclosing [`SignedRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    /// Lock `amount` of `asset` from `source` for `receiver`.
    Initiate {
        receiver: Pubkey,
        asset: Pubkey,
        amount: u64,
        source: Pubkey,
    },
    /// Sender takes the escrowed funds back into `destination`.
    Reclaim { record: Pubkey, destination: Pubkey },
    /// Receiver takes the escrowed funds into `destination`.
    Settle { record: Pubkey, destination: Pubkey },
}

impl Instruction {
    /// Encoded size of the largest instruction (`Initiate`).
    pub const MAX_LEN: usize = 1 + INITIATE_BODY_LEN;

    /// Operation name for logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Initiate { .. } => "initiate",
            Self::Reclaim { .. } => "reclaim",
            Self::Settle { .. } => "settle",
        }
    }

    /// Fixed-width wire encoding.
    #[must_use]
    pub fn pack(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::MAX_LEN);
        match self {
            Self::Initiate {
                receiver,
                asset,
                amount,
                source,
            } => {
                out.push(TAG_INITIATE);
                out.extend_from_slice(receiver.as_ref());
                out.extend_from_slice(asset.as_ref());
                out.extend_from_slice(&amount.to_le_bytes());
                out.extend_from_slice(source.as_ref());
            }
            Self::Reclaim {
                record,
                destination,
            } => {
                out.push(TAG_RECLAIM);
                out.extend_from_slice(record.as_ref());
                out.extend_from_slice(destination.as_ref());
            }
            Self::Settle {
                record,
                destination,
            } => {
                out.push(TAG_SETTLE);
                out.extend_from_slice(record.as_ref());
                out.extend_from_slice(destination.as_ref());
            }
        }
        out
    }

    /// Decode the wire encoding.
    ///
    /// # Errors
    /// Returns `Serialization` on an unknown tag or wrong length.
    pub fn unpack(data: &[u8]) -> Result<Self> {
        let (&tag, rest) = data
            .split_first()
            .ok_or_else(|| SafepayError::Serialization("empty instruction".into()))?;
        let expected = match tag {
            TAG_INITIATE => INITIATE_BODY_LEN,
            TAG_RECLAIM | TAG_SETTLE => CLOSE_BODY_LEN,
            other => {
                return Err(SafepayError::Serialization(format!(
                    "unknown instruction tag {other}"
                )));
            }
        };
        if rest.len() != expected {
            return Err(SafepayError::Serialization(format!(
                "instruction tag {tag} carries {} bytes, expected {expected}",
                rest.len()
            )));
        }
        let key_at = |offset| {
            Pubkey::read_from(rest, offset).map_err(|e| SafepayError::Serialization(e.to_string()))
        };
        Ok(match tag {
            TAG_INITIATE => {
                let mut amount = [0u8; 8];
                amount.copy_from_slice(&rest[64..72]);
                Self::Initiate {
                    receiver: key_at(0)?,
                    asset: key_at(32)?,
                    amount: u64::from_le_bytes(amount),
                    source: key_at(72)?,
                }
            }
            TAG_RECLAIM => Self::Reclaim {
                record: key_at(0)?,
                destination: key_at(32)?,
            },
            _ => Self::Settle {
                record: key_at(0)?,
                destination: key_at(32)?,
            },
        })
    }
}

/// Proof that a key authorized the current call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifiedSigner {
    key: Pubkey,
}

impl VerifiedSigner {
    /// The verified key.
    #[must_use]
    pub fn key(&self) -> Pubkey {
        self.key
    }

    /// Authorize directly with a locally held keypair.
    ///
    /// Signs and verifies a one-off challenge, so the result carries the
    /// same guarantee as a verified request.
    #[must_use]
    pub fn from_signing_key(signing_key: &SigningKey) -> Self {
        let verifying_key = signing_key.verifying_key();
        let challenge = Self::challenge(&verifying_key);
        let signature = signing_key.sign(&challenge);
        debug_assert!(verifying_key.verify_strict(&challenge, &signature).is_ok());
        Self {
            key: Pubkey::from(&verifying_key),
        }
    }

    fn challenge(key: &VerifyingKey) -> Vec<u8> {
        let mut challenge = constants::REQUEST_DOMAIN.to_vec();
        challenge.extend_from_slice(b"local:");
        challenge.extend_from_slice(key.as_bytes());
        challenge
    }
}

/// A request as it arrives from a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedRequest {
    /// The program this request is addressed to.
    pub program_id: Pubkey,
    /// What to do.
    pub instruction: Instruction,
    /// The key that signed.
    pub signer: Pubkey,
    /// Ed25519 signature over [`SignedRequest::signing_payload`].
    pub signature: Vec<u8>,
}

impl SignedRequest {
    /// Canonical bytes covered by the signature.
    #[must_use]
    pub fn signing_payload(program_id: &Pubkey, instruction: &Instruction) -> Vec<u8> {
        let mut payload = Vec::with_capacity(160);
        payload.extend_from_slice(constants::REQUEST_DOMAIN);
        payload.extend_from_slice(program_id.as_ref());
        payload.extend_from_slice(&instruction.pack());
        payload
    }

    /// Build and sign a request.
    #[must_use]
    pub fn sign(program_id: Pubkey, instruction: Instruction, signing_key: &SigningKey) -> Self {
        let payload = Self::signing_payload(&program_id, &instruction);
        let signature = signing_key.sign(&payload);
        Self {
            program_id,
            instruction,
            signer: Pubkey::from(&signing_key.verifying_key()),
            signature: signature.to_bytes().to_vec(),
        }
    }

    /// Verify the signature for `expected_program`.
    ///
    /// # Errors
    /// Returns `InvalidSignature` if the request targets another program,
    /// the signer is not a valid ed25519 key, or the signature fails strict
    /// verification.
    pub fn verify(&self, expected_program: &Pubkey) -> Result<VerifiedSigner> {
        if self.program_id != *expected_program {
            return Err(SafepayError::InvalidSignature {
                reason: format!("request addressed to program {}", self.program_id.short()),
            });
        }
        let verifying_key =
            VerifyingKey::from_bytes(self.signer.as_bytes()).map_err(|e| {
                SafepayError::InvalidSignature {
                    reason: format!("signer is not an ed25519 key: {e}"),
                }
            })?;
        let signature =
            Signature::from_slice(&self.signature).map_err(|e| SafepayError::InvalidSignature {
                reason: format!("malformed signature: {e}"),
            })?;
        let payload = Self::signing_payload(&self.program_id, &self.instruction);
        verifying_key
            .verify_strict(&payload, &signature)
            .map_err(|_| SafepayError::InvalidSignature {
                reason: "signature does not verify".into(),
            })?;
        Ok(VerifiedSigner { key: self.signer })
    }
}

/// What a caller gets back for a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Response {
    /// The transition committed.
    Committed(Receipt),
    /// Authorization or state rejection. Carries no detail on purpose.
    Rejected { code: String },
    /// Any other failure, with its code and message.
    Failed { code: String, message: String },
}

impl Response {
    #[must_use]
    pub fn from_result(result: Result<Receipt>) -> Self {
        match result {
            Ok(receipt) => Self::Committed(receipt),
            Err(err) if err.is_opaque_rejection() => Self::Rejected {
                code: REJECTED_CODE.to_string(),
            },
            Err(err) => Self::Failed {
                code: err.code(),
                message: err.to_string(),
            },
        }
    }
}
