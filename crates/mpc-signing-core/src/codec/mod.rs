//! Key/Signature codec
//!
//! Pure functions for turning raw curve material into canonical byte layouts:
//! - public keys are decoded with a mandatory curve check and re-encoded
//!   without prefixes
//! - signatures are written into fixed-width slots, left-padded, and never
//!   truncated

mod ecdsa;
mod eddsa;

pub use ecdsa::{
    ECDSA_PUBLIC_KEY_LEN, ECDSA_SIGNATURE_LEN, compose_ecdsa_signature, decode_ecdsa_public_key,
    encode_ecdsa_public_key, verify_ecdsa_signature,
};
pub use eddsa::{
    EDDSA_PUBLIC_KEY_LEN, EDDSA_SIGNATURE_LEN, compose_eddsa_signature, decode_eddsa_public_key,
    encode_eddsa_public_key, verify_eddsa_signature,
};

use crate::error::{Error, Result};
use crate::types::{KeyType, SignatureShare, strip_leading_zeros};

/// Width of one signature component slot
pub const COMPONENT_LEN: usize = 32;

/// Write a big-endian magnitude into `out`, right-aligned with zero padding
///
/// Leading zero bytes of `value` are ignored. A magnitude that still needs
/// more room than `out` is rejected.
pub(crate) fn write_left_padded(
    component: &'static str,
    value: &[u8],
    out: &mut [u8],
) -> Result<()> {
    let magnitude = strip_leading_zeros(value);
    if magnitude.len() > out.len() {
        return Err(Error::SignatureComponentOverflow {
            component,
            len: magnitude.len(),
            max: out.len(),
        });
    }

    let offset = out.len() - magnitude.len();
    out[..offset].fill(0);
    out[offset..].copy_from_slice(magnitude);
    Ok(())
}

/// Compose the canonical signature for `key_type` from an agreed share
pub fn compose_signature(key_type: KeyType, share: &SignatureShare) -> Result<Vec<u8>> {
    match key_type {
        KeyType::EcdsaSecp256k1 => {
            let recovery = share.recovery_id.ok_or_else(|| {
                Error::SignatureComposition("ECDSA share is missing a recovery id".into())
            })?;
            let signature = compose_ecdsa_signature(&share.r, &share.s, recovery)?;
            Ok(signature.to_vec())
        }
        KeyType::EddsaEd25519 => Ok(compose_eddsa_signature(&share.r, &share.s)?.to_vec()),
    }
}

/// Check that `bytes` is a valid public key for `key_type`
pub fn validate_public_key(key_type: KeyType, bytes: &[u8]) -> Result<()> {
    match key_type {
        KeyType::EcdsaSecp256k1 => decode_ecdsa_public_key(bytes).map(|_| ()),
        KeyType::EddsaEd25519 => decode_eddsa_public_key(bytes).map(|_| ()),
    }
}

/// Verify a composed signature against a group public key
///
/// For ECDSA `message` is the 32-byte prehash and the key is recovered from
/// V; for EdDSA `message` is the signed payload.
pub fn verify_signature(
    key_type: KeyType,
    public_key: &[u8],
    message: &[u8],
    signature: &[u8],
) -> Result<()> {
    match key_type {
        KeyType::EcdsaSecp256k1 => {
            let key = decode_ecdsa_public_key(public_key)?;
            verify_ecdsa_signature(&key, message, signature)
        }
        KeyType::EddsaEd25519 => {
            let key = decode_eddsa_public_key(public_key)?;
            verify_eddsa_signature(&key, message, signature)
        }
    }
}
