//! # MPC Signing Coordinator
//!
//! Coordination engine that turns a signing request into exactly one terminal
//! outcome, driving a quorum of signer parties over an asynchronous transport.
//!
//! ## Features
//!
//! - **Single-flight admission**: concurrent requests for the same
//!   `(wallet_id, tx_id)` share one session and one outcome
//! - **Quorum collection**: per-round accumulation of partial contributions
//!   with conflict detection
//! - **Session state machine**: typed events, hard deadline, dispatch retry
//! - **Outcome publication**: one `SigningResponse` (plus an error event on
//!   failure) per session, retried on transport errors
//!
//! ## Session Flow
//!
//! ```text
//! Client ──► submit ──► Registry ──► Session ──► dispatch ──► Signer parties
//!                          │            ▲                          │
//!                          │            └──── on_contribution ◄────┘
//!                          ▼
//!                      Publisher ──► mpc.signing_result
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use mpc_signing_coordinator::{CoordinatorConfig, SigningCoordinator, StaticKeyDirectory};
//! use mpc_signing_core::transport::MemoryTransport;
//!
//! let directory = StaticKeyDirectory::new();
//! directory.insert("wallet-1", group);
//!
//! let coordinator = SigningCoordinator::new(
//!     Arc::new(MemoryTransport::new()),
//!     Arc::new(directory),
//!     CoordinatorConfig::default().with_session_timeout_secs(10),
//! );
//!
//! let response = coordinator.sign(request).await;
//! ```

pub mod collector;
pub mod config;
pub mod coordinator;
pub mod directory;
pub mod error;
pub mod publisher;
pub mod registry;
pub mod session;

pub use collector::{CollectorOutcome, QuorumCollector};
pub use config::{CoordinatorConfig, RetryConfig};
pub use coordinator::{CoordinatorStats, SigningCoordinator};
pub use directory::{KeyDirectory, SigningGroup, StaticKeyDirectory};
pub use error::{CoordinatorError, Result};
pub use publisher::OutcomePublisher;
pub use registry::{Admission, SessionHandle, SessionRegistry, SessionTicket};
pub use session::{
    DiscardReason, SessionEvent, SessionOutcome, SessionState, SigningFailure, SigningSession,
    StepOutcome,
};
