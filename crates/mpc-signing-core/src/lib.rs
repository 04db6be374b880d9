//! # MPC Signing Core
//!
//! Shared building blocks for coordinating threshold signing requests across a
//! quorum of independent signer parties.
//!
//! ## Architecture
//!
//! This crate provides:
//! - **Wire types**: `SigningMessage` requests, round dispatches, partial
//!   contributions, `SigningResponse` results and error events
//! - **Error taxonomy**: closed [`ErrorCode`] set carried on the wire
//! - **Key/Signature Codec**: curve-checked public key decoding and exact,
//!   fixed-width composition of ECDSA (R‖S‖V) and EdDSA (R‖S) signatures
//! - **Transport seam**: the async [`transport::Transport`] trait with an
//!   in-memory implementation for tests and local simulation
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use mpc_signing_core::codec::compose_ecdsa_signature;
//!
//! let sig = compose_ecdsa_signature(&[0x12, 0x34], &[0x56, 0x78], 1)?;
//! assert_eq!(sig.len(), 65);
//! assert_eq!(sig[64], 1);
//! ```

pub mod codec;
pub mod error;
pub mod types;

// Runtime-dependent modules (require tokio)
#[cfg(feature = "runtime")]
pub mod transport;

pub use error::{Error, ErrorCode, Result};
pub use types::{
    KeyType, PartialContribution, PartyId, SessionFingerprint, SignRoundRequest, SignatureShare,
    SigningRequest, SigningResponse, SigningResultErrorEvent,
};
