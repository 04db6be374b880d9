//! secp256k1 public keys and R‖S‖V signatures

use k256::{
    EncodedPoint, FieldBytes, PublicKey,
    ecdsa::{RecoveryId, Signature, VerifyingKey},
    elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint},
};

use super::{COMPONENT_LEN, write_left_padded};
use crate::error::{Error, Result};

/// X‖Y without the SEC1 marker
pub const ECDSA_PUBLIC_KEY_LEN: usize = 64;

/// R‖S‖V
pub const ECDSA_SIGNATURE_LEN: usize = 65;

const UNCOMPRESSED_MARKER: u8 = 0x04;

/// Decode an uncompressed secp256k1 public key
///
/// Accepts 64 bytes X‖Y or 65 bytes with a leading `0x04`. The point must
/// lie on the curve.
pub fn decode_ecdsa_public_key(bytes: &[u8]) -> Result<PublicKey> {
    let xy = match bytes.len() {
        ECDSA_PUBLIC_KEY_LEN => bytes,
        65 if bytes[0] == UNCOMPRESSED_MARKER => &bytes[1..],
        65 => {
            return Err(Error::InvalidKeyEncoding(format!(
                "unexpected point marker 0x{:02x}",
                bytes[0]
            )));
        }
        len => {
            return Err(Error::InvalidKeyEncoding(format!(
                "expected 64 or 65 bytes, got {len}"
            )));
        }
    };

    let x = FieldBytes::from(coordinate(&xy[..COMPONENT_LEN])?);
    let y = FieldBytes::from(coordinate(&xy[COMPONENT_LEN..])?);
    let point = EncodedPoint::from_affine_coordinates(&x, &y, false);

    Option::from(PublicKey::from_encoded_point(&point)).ok_or(Error::PointNotOnCurve)
}

fn coordinate(bytes: &[u8]) -> Result<[u8; COMPONENT_LEN]> {
    bytes.try_into().map_err(|_| {
        Error::InvalidKeyEncoding(format!(
            "coordinate must be {COMPONENT_LEN} bytes, got {}",
            bytes.len()
        ))
    })
}

/// Encode a secp256k1 public key as X‖Y, each coordinate 32 bytes
pub fn encode_ecdsa_public_key(key: &PublicKey) -> [u8; ECDSA_PUBLIC_KEY_LEN] {
    let point = key.to_encoded_point(false);
    let mut out = [0u8; ECDSA_PUBLIC_KEY_LEN];
    // Skip the 0x04 marker
    out.copy_from_slice(&point.as_bytes()[1..]);
    out
}

/// Compose R‖S‖V from big-endian magnitudes and a recovery byte
pub fn compose_ecdsa_signature(
    r: &[u8],
    s: &[u8],
    recovery: u8,
) -> Result<[u8; ECDSA_SIGNATURE_LEN]> {
    let mut out = [0u8; ECDSA_SIGNATURE_LEN];
    write_left_padded("r", r, &mut out[..COMPONENT_LEN])?;
    write_left_padded("s", s, &mut out[COMPONENT_LEN..2 * COMPONENT_LEN])?;
    out[2 * COMPONENT_LEN] = recovery;
    Ok(out)
}

/// Recover the signer of `prehash` from R‖S‖V and compare it with `public_key`
///
/// V may be given raw (0..=3) or with the Ethereum offset of 27.
pub fn verify_ecdsa_signature(
    public_key: &PublicKey,
    prehash: &[u8],
    signature: &[u8],
) -> Result<()> {
    if signature.len() != ECDSA_SIGNATURE_LEN {
        return Err(Error::VerificationFailed(format!(
            "expected {ECDSA_SIGNATURE_LEN} signature bytes, got {}",
            signature.len()
        )));
    }

    let sig = Signature::from_slice(&signature[..2 * COMPONENT_LEN])
        .map_err(|e| Error::VerificationFailed(e.to_string()))?;

    let v = signature[2 * COMPONENT_LEN];
    let v = if v >= 27 { v - 27 } else { v };
    let recovery_id = RecoveryId::from_byte(v)
        .ok_or_else(|| Error::VerificationFailed(format!("invalid recovery id {v}")))?;

    let recovered = VerifyingKey::recover_from_prehash(prehash, &sig, recovery_id)
        .map_err(|e| Error::VerificationFailed(e.to_string()))?;

    if recovered != VerifyingKey::from(public_key) {
        return Err(Error::VerificationFailed(
            "recovered key does not match the group key".into(),
        ));
    }
    Ok(())
}
