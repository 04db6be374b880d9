//! Error types for the signing coordinator

use mpc_signing_core::{ErrorCode, KeyType};
use thiserror::Error;

/// Coordinator errors
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// Wallet has no registered signing group
    #[error("Unknown wallet: {0}")]
    UnknownWallet(String),

    /// Request key type differs from the wallet's
    #[error("Key type mismatch: wallet uses {expected}, request asked for {actual}")]
    KeyTypeMismatch { expected: KeyType, actual: KeyType },

    /// Signing group is malformed
    #[error("Invalid signing group: {0}")]
    InvalidGroup(String),

    /// Configuration could not be loaded
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Error from the core library
    #[error(transparent)]
    Core(#[from] mpc_signing_core::Error),
}

impl CoordinatorError {
    /// Get the wire error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            CoordinatorError::UnknownWallet(_) => ErrorCode::InvalidRequest,
            CoordinatorError::KeyTypeMismatch { .. } => ErrorCode::InvalidRequest,
            CoordinatorError::InvalidGroup(_) => ErrorCode::InvalidRequest,
            CoordinatorError::Config(_) => ErrorCode::InternalError,
            CoordinatorError::Core(e) => e.code(),
        }
    }

    /// Check if the request could succeed if resubmitted unchanged
    pub fn is_retryable(&self) -> bool {
        self.code().is_retryable()
    }
}

impl From<serde_json::Error> for CoordinatorError {
    fn from(err: serde_json::Error) -> Self {
        CoordinatorError::Config(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, CoordinatorError>;
