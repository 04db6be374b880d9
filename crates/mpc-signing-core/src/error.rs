//! Error types and wire error codes for threshold signing

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type alias for signing operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error code carried on the wire in responses and error events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Success
    None,
    /// Malformed request, unknown wallet or key type mismatch
    InvalidRequest,
    /// Public key bytes have the wrong shape
    InvalidKeyEncoding,
    /// Coordinates do not lie on the curve
    PointNotOnCurve,
    /// A signature component needs more bytes than its slot
    SignatureComponentOverflow,
    /// Signature could not be assembled
    SignatureCompositionError,
    /// Composed signature does not verify against the group key
    SignatureVerificationFailed,
    /// A party sent two different shares in one round
    ConflictingContribution,
    /// Threshold can no longer be reached
    InsufficientQuorum,
    /// Deadline elapsed before completion
    Timeout,
    /// Request folded into a live session
    AlreadyInFlight,
    /// Unexpected failure inside the coordinator
    InternalError,
}

impl ErrorCode {
    /// Wire representation of this code
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::None => "NONE",
            ErrorCode::InvalidRequest => "INVALID_REQUEST",
            ErrorCode::InvalidKeyEncoding => "INVALID_KEY_ENCODING",
            ErrorCode::PointNotOnCurve => "POINT_NOT_ON_CURVE",
            ErrorCode::SignatureComponentOverflow => "SIGNATURE_COMPONENT_OVERFLOW",
            ErrorCode::SignatureCompositionError => "SIGNATURE_COMPOSITION_ERROR",
            ErrorCode::SignatureVerificationFailed => "SIGNATURE_VERIFICATION_FAILED",
            ErrorCode::ConflictingContribution => "CONFLICTING_CONTRIBUTION",
            ErrorCode::InsufficientQuorum => "INSUFFICIENT_QUORUM",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::AlreadyInFlight => "ALREADY_IN_FLIGHT",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Check if a client may resubmit the same request after this failure
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCode::Timeout | ErrorCode::InsufficientQuorum | ErrorCode::InternalError
        )
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ErrorCode::None)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur while validating, composing or transporting signatures
#[derive(Debug, Error)]
pub enum Error {
    // ============ Request Errors ============
    /// Request is missing required fields or is otherwise malformed
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // ============ Codec Errors ============
    /// Public key bytes have an unexpected length or marker
    #[error("Invalid key encoding: {0}")]
    InvalidKeyEncoding(String),

    /// Public key coordinates are not a point on the curve
    #[error("Point is not on the curve")]
    PointNotOnCurve,

    /// Signature component magnitude exceeds its fixed slot
    #[error("Signature component {component} is {len} bytes, exceeds {max}")]
    SignatureComponentOverflow {
        component: &'static str,
        len: usize,
        max: usize,
    },

    /// Signature could not be assembled from the share
    #[error("Signature composition failed: {0}")]
    SignatureComposition(String),

    /// Composed signature does not verify
    #[error("Signature verification failed: {0}")]
    VerificationFailed(String),

    // ============ Transport Errors ============
    /// Transport rejected or failed to deliver a message
    #[error("Transport error: {0}")]
    Transport(String),

    /// Timeout waiting on the transport
    #[error("Timeout waiting for {0}")]
    Timeout(String),

    // ============ Serialization Errors ============
    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // ============ Internal Errors ============
    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to its wire error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::InvalidRequest(_) => ErrorCode::InvalidRequest,
            Error::InvalidKeyEncoding(_) => ErrorCode::InvalidKeyEncoding,
            Error::PointNotOnCurve => ErrorCode::PointNotOnCurve,
            Error::SignatureComponentOverflow { .. } => ErrorCode::SignatureComponentOverflow,
            Error::SignatureComposition(_) => ErrorCode::SignatureCompositionError,
            Error::VerificationFailed(_) => ErrorCode::SignatureVerificationFailed,
            Error::Timeout(_) => ErrorCode::Timeout,
            Error::Transport(_)
            | Error::Serialization(_)
            | Error::Deserialization(_)
            | Error::Internal(_) => ErrorCode::InternalError,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<hex::FromHexError> for Error {
    fn from(e: hex::FromHexError) -> Self {
        Error::Deserialization(e.to_string())
    }
}
