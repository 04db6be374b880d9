//! Ed25519 public keys and R‖S signatures

use ed25519_dalek::{Signature, VerifyingKey};

use super::{COMPONENT_LEN, write_left_padded};
use crate::error::{Error, Result};

/// Compressed Edwards Y
pub const EDDSA_PUBLIC_KEY_LEN: usize = 32;

/// R‖S
pub const EDDSA_SIGNATURE_LEN: usize = 64;

/// Decode a compressed Ed25519 public key
pub fn decode_eddsa_public_key(bytes: &[u8]) -> Result<VerifyingKey> {
    if bytes.is_empty() {
        return Err(Error::InvalidKeyEncoding("public key is empty".into()));
    }

    let array: [u8; EDDSA_PUBLIC_KEY_LEN] = bytes.try_into().map_err(|_| {
        Error::InvalidKeyEncoding(format!(
            "expected {EDDSA_PUBLIC_KEY_LEN} bytes, got {}",
            bytes.len()
        ))
    })?;

    VerifyingKey::from_bytes(&array)
        .map_err(|e| Error::InvalidKeyEncoding(format!("not an Edwards point: {e}")))
}

pub fn encode_eddsa_public_key(key: &VerifyingKey) -> [u8; EDDSA_PUBLIC_KEY_LEN] {
    key.to_bytes()
}

/// Compose R‖S from two magnitudes
pub fn compose_eddsa_signature(r: &[u8], s: &[u8]) -> Result<[u8; EDDSA_SIGNATURE_LEN]> {
    let mut out = [0u8; EDDSA_SIGNATURE_LEN];
    write_left_padded("r", r, &mut out[..COMPONENT_LEN])?;
    write_left_padded("s", s, &mut out[COMPONENT_LEN..])?;
    Ok(out)
}

/// Strict Ed25519 verification of `signature` over `message`
pub fn verify_eddsa_signature(
    public_key: &VerifyingKey,
    message: &[u8],
    signature: &[u8],
) -> Result<()> {
    let sig = Signature::from_slice(signature)
        .map_err(|e| Error::VerificationFailed(e.to_string()))?;
    public_key
        .verify_strict(message, &sig)
        .map_err(|e| Error::VerificationFailed(e.to_string()))
}
