//! Unit tests for the key/signature codec

use ed25519_dalek::{Signer, SigningKey as EdSigningKey};
use k256::{PublicKey, ecdsa::SigningKey};
use mpc_signing_core::{
    Error, ErrorCode, KeyType, SignatureShare,
    codec::{
        compose_ecdsa_signature, compose_eddsa_signature, compose_signature,
        decode_ecdsa_public_key, decode_eddsa_public_key, encode_ecdsa_public_key,
        encode_eddsa_public_key, validate_public_key, verify_signature,
    },
};
use rand::rngs::OsRng;

// ============================================================================
// ECDSA composition
// ============================================================================

#[test]
fn test_compose_ecdsa_pads_short_components() {
    let sig = compose_ecdsa_signature(&[0x12, 0x34], &[0x56, 0x78], 0x01).unwrap();

    assert_eq!(sig.len(), 65);
    assert!(sig[..30].iter().all(|b| *b == 0));
    assert_eq!(&sig[30..32], &[0x12, 0x34]);
    assert!(sig[32..62].iter().all(|b| *b == 0));
    assert_eq!(&sig[62..64], &[0x56, 0x78]);
    assert_eq!(sig[64], 0x01);
}

#[test]
fn test_compose_ecdsa_full_width_components() {
    let r = [0xaau8; 32];
    let s = [0xbbu8; 32];
    let sig = compose_ecdsa_signature(&r, &s, 27).unwrap();

    assert_eq!(&sig[..32], &r);
    assert_eq!(&sig[32..64], &s);
    assert_eq!(sig[64], 27);
}

#[test]
fn test_compose_ecdsa_rejects_33_byte_component() {
    let mut r = vec![0x01u8];
    r.extend_from_slice(&[0xffu8; 32]);

    let err = compose_ecdsa_signature(&r, &[1], 0).unwrap_err();
    assert_eq!(err.code(), ErrorCode::SignatureComponentOverflow);
    assert!(matches!(
        err,
        Error::SignatureComponentOverflow {
            component: "r",
            len: 33,
            ..
        }
    ));

    let err = compose_ecdsa_signature(&[1], &r, 0).unwrap_err();
    assert!(matches!(
        err,
        Error::SignatureComponentOverflow { component: "s", .. }
    ));
}

#[test]
fn test_compose_ecdsa_accepts_leading_zero_padding() {
    // 33 bytes whose first byte is zero is still a 32-byte magnitude
    let mut r = vec![0x00u8];
    r.extend_from_slice(&[0x11u8; 32]);

    let sig = compose_ecdsa_signature(&r, &[0x22], 1).unwrap();
    assert_eq!(&sig[..32], &[0x11u8; 32]);
}

#[test]
fn test_compose_empty_components_are_zero() {
    let sig = compose_eddsa_signature(&[], &[]).unwrap();
    assert_eq!(sig, [0u8; 64]);
}

// ============================================================================
// EdDSA composition
// ============================================================================

#[test]
fn test_compose_eddsa_layout() {
    let sig = compose_eddsa_signature(&[0x01], &[0x02, 0x03]).unwrap();

    assert_eq!(sig.len(), 64);
    assert_eq!(sig[31], 0x01);
    assert_eq!(&sig[62..], &[0x02, 0x03]);
}

#[test]
fn test_compose_eddsa_overflow() {
    let err = compose_eddsa_signature(&[0x01; 33], &[0x01]).unwrap_err();
    assert_eq!(err.code(), ErrorCode::SignatureComponentOverflow);
}

#[test]
fn test_compose_signature_dispatches_on_key_type() {
    let share = SignatureShare::ecdsa(vec![0x12, 0x34], vec![0x56, 0x78], 1);

    assert_eq!(
        compose_signature(KeyType::EcdsaSecp256k1, &share).unwrap().len(),
        65
    );
    assert_eq!(
        compose_signature(KeyType::EddsaEd25519, &share).unwrap().len(),
        64
    );
}

// ============================================================================
// Public keys
// ============================================================================

#[test]
fn test_ecdsa_public_key_roundtrip_with_and_without_prefix() {
    let signing_key = SigningKey::random(&mut OsRng);
    let public_key = PublicKey::from(signing_key.verifying_key());

    let encoded = encode_ecdsa_public_key(&public_key);
    assert_eq!(encoded.len(), 64);

    let mut prefixed = vec![0x04];
    prefixed.extend_from_slice(&encoded);

    assert_eq!(decode_ecdsa_public_key(&encoded).unwrap(), public_key);
    assert_eq!(decode_ecdsa_public_key(&prefixed).unwrap(), public_key);
}

#[test]
fn test_ecdsa_public_key_wrong_lengths() {
    for len in [0usize, 32, 33, 63, 66] {
        let bytes = vec![0x04u8; len];
        let err = decode_ecdsa_public_key(&bytes).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidKeyEncoding, "length {len}");
    }
}

#[test]
fn test_ecdsa_public_key_off_curve() {
    let signing_key = SigningKey::random(&mut OsRng);
    let mut encoded = encode_ecdsa_public_key(&PublicKey::from(signing_key.verifying_key()));

    // Flip the low bit of Y; (x, y') no longer satisfies the curve equation
    // unless y' = -y, which a single-bit flip cannot produce
    encoded[63] ^= 0x01;

    let err = decode_ecdsa_public_key(&encoded).unwrap_err();
    assert_eq!(err.code(), ErrorCode::PointNotOnCurve);
}

#[test]
fn test_eddsa_public_key_roundtrip() {
    let signing_key = EdSigningKey::generate(&mut OsRng);
    let encoded = encode_eddsa_public_key(&signing_key.verifying_key());

    assert_eq!(
        decode_eddsa_public_key(&encoded).unwrap(),
        signing_key.verifying_key()
    );
}

#[test]
fn test_eddsa_public_key_invalid_point() {
    // Roughly half of all y-coordinates do not decompress
    let invalid = (0u8..=255)
        .map(|i| {
            let mut bytes = [0u8; 32];
            bytes[0] = i;
            bytes[31] = 0x7f;
            bytes
        })
        .find(|bytes| decode_eddsa_public_key(bytes).is_err())
        .expect("some candidate must fail to decompress");

    let err = decode_eddsa_public_key(&invalid).unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidKeyEncoding);
}

#[test]
fn test_eddsa_public_key_empty() {
    let err = validate_public_key(KeyType::EddsaEd25519, &[]).unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidKeyEncoding);
}

// ============================================================================
// Verification
// ============================================================================

#[test]
fn test_verify_composed_ecdsa_signature() {
    let signing_key = SigningKey::random(&mut OsRng);
    let public_key = encode_ecdsa_public_key(&PublicKey::from(signing_key.verifying_key()));
    let prehash = [0x42u8; 32];

    let (sig, recovery_id) = signing_key.sign_prehash_recoverable(&prehash).unwrap();
    let bytes = sig.to_bytes();
    let share = SignatureShare::ecdsa(
        bytes[..32].to_vec(),
        bytes[32..].to_vec(),
        recovery_id.to_byte(),
    );
    let composed = compose_signature(KeyType::EcdsaSecp256k1, &share).unwrap();

    verify_signature(KeyType::EcdsaSecp256k1, &public_key, &prehash, &composed).unwrap();

    let other = [0x43u8; 32];
    let err = verify_signature(KeyType::EcdsaSecp256k1, &public_key, &other, &composed)
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::SignatureVerificationFailed);
}

#[test]
fn test_verify_composed_eddsa_signature() {
    let signing_key = EdSigningKey::generate(&mut OsRng);
    let public_key = encode_eddsa_public_key(&signing_key.verifying_key());
    let message = b"solana transfer";

    let sig = signing_key.sign(message).to_bytes();
    let share = SignatureShare::eddsa(sig[..32].to_vec(), sig[32..].to_vec());
    let composed = compose_signature(KeyType::EddsaEd25519, &share).unwrap();

    verify_signature(KeyType::EddsaEd25519, &public_key, message, &composed).unwrap();

    let mut tampered = composed.clone();
    tampered[40] ^= 0x01;
    let result = verify_signature(KeyType::EddsaEd25519, &public_key, message, &tampered);
    assert!(result.is_err());
}
