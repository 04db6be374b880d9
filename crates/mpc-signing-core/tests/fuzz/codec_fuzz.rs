//! Fuzz tests for the key/signature codec
//!
//! Composition must place every magnitude that fits exactly and reject every
//! magnitude that does not; decoding must never panic on arbitrary bytes.

use mpc_signing_core::{
    ErrorCode, KeyType, SignatureShare,
    codec::{
        compose_ecdsa_signature, compose_eddsa_signature, compose_signature,
        decode_ecdsa_public_key, decode_eddsa_public_key,
    },
};
use proptest::prelude::*;

// ============================================================================
// Strategies for generating test data
// ============================================================================

/// Magnitude of at most 32 significant bytes, optionally zero-prefixed
fn fitting_magnitude_strategy() -> impl Strategy<Value = Vec<u8>> {
    (
        prop::collection::vec(any::<u8>(), 0..=32),
        0usize..8,
    )
        .prop_map(|(magnitude, zeros)| {
            let mut padded = vec![0u8; zeros];
            padded.extend(magnitude);
            padded
        })
}

/// Magnitude with more than 32 significant bytes
fn overflowing_magnitude_strategy() -> impl Strategy<Value = Vec<u8>> {
    (1u8..=255, prop::collection::vec(any::<u8>(), 32..48)).prop_map(|(lead, rest)| {
        let mut bytes = vec![lead];
        bytes.extend(rest);
        bytes
    })
}

fn strip(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

// ============================================================================
// Composition Fuzzing
// ============================================================================

proptest! {
    /// Fitting magnitudes land right-aligned in their slots
    #[test]
    fn ecdsa_components_right_aligned(
        r in fitting_magnitude_strategy(),
        s in fitting_magnitude_strategy(),
        v in any::<u8>(),
    ) {
        let sig = compose_ecdsa_signature(&r, &s, v).unwrap();

        prop_assert_eq!(strip(&sig[..32]), strip(&r));
        prop_assert_eq!(strip(&sig[32..64]), strip(&s));
        prop_assert_eq!(sig[64], v);
    }

    /// Oversized magnitudes are rejected, never truncated
    #[test]
    fn oversized_components_rejected(
        big in overflowing_magnitude_strategy(),
        small in fitting_magnitude_strategy(),
    ) {
        let err = compose_ecdsa_signature(&big, &small, 0).unwrap_err();
        prop_assert_eq!(err.code(), ErrorCode::SignatureComponentOverflow);

        let err = compose_eddsa_signature(&small, &big).unwrap_err();
        prop_assert_eq!(err.code(), ErrorCode::SignatureComponentOverflow);
    }

    /// Same components always produce the same bytes
    #[test]
    fn composition_is_deterministic(
        r in fitting_magnitude_strategy(),
        s in fitting_magnitude_strategy(),
        v in any::<u8>(),
    ) {
        let first = compose_ecdsa_signature(&r, &s, v).unwrap();
        let second = compose_ecdsa_signature(&r, &s, v).unwrap();
        prop_assert_eq!(first, second);

        let first = compose_eddsa_signature(&r, &s).unwrap();
        let second = compose_eddsa_signature(&r, &s).unwrap();
        prop_assert_eq!(first, second);

        // Zero-prefixing a magnitude does not change the output
        let mut padded_r = vec![0u8; 3];
        padded_r.extend_from_slice(&r);
        let share = SignatureShare::ecdsa(r.clone(), s.clone(), v);
        let padded = SignatureShare::ecdsa(padded_r, s, v);
        prop_assert_eq!(
            compose_signature(KeyType::EcdsaSecp256k1, &share).unwrap(),
            compose_signature(KeyType::EcdsaSecp256k1, &padded).unwrap()
        );
    }

    /// Composed length always matches the key type
    #[test]
    fn composed_length_matches_key_type(
        r in fitting_magnitude_strategy(),
        s in fitting_magnitude_strategy(),
        v in 0u8..4,
    ) {
        let share = SignatureShare::ecdsa(r, s, v);
        for key_type in [KeyType::EcdsaSecp256k1, KeyType::EddsaEd25519] {
            let sig = compose_signature(key_type, &share).unwrap();
            prop_assert_eq!(sig.len(), key_type.signature_len());
        }
    }
}

// ============================================================================
// Key Decoding Fuzzing
// ============================================================================

proptest! {
    /// Arbitrary bytes never panic and only produce codec error codes
    #[test]
    fn ecdsa_decode_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..80)) {
        if let Err(err) = decode_ecdsa_public_key(&bytes) {
            prop_assert!(matches!(
                err.code(),
                ErrorCode::InvalidKeyEncoding | ErrorCode::PointNotOnCurve
            ));
        } else {
            prop_assert!(bytes.len() == 64 || bytes.len() == 65);
        }
    }

    #[test]
    fn eddsa_decode_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..40)) {
        match decode_eddsa_public_key(&bytes) {
            Ok(_) => prop_assert_eq!(bytes.len(), 32),
            Err(err) => prop_assert_eq!(err.code(), ErrorCode::InvalidKeyEncoding),
        }
    }
}
