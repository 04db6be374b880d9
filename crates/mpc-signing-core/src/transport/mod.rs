//! Transport seam between the coordinator and signer parties
//!
//! The `Transport` trait abstracts the pub/sub fabric: outbound round
//! dispatches go to the signer parties, terminal responses and error events
//! go to the result topics. Contributions flow back in through the
//! coordinator's API rather than through this trait.

use crate::{Result, SignRoundRequest, SigningResponse, SigningResultErrorEvent};

pub use async_trait::async_trait;

pub mod memory;

pub use memory::MemoryTransport;

/// Topic carrying round dispatches to signer parties
pub const SIGNING_REQUEST_TOPIC: &str = "mpc.signing_request";

/// Topic carrying terminal signing responses
pub const SIGNING_RESULT_TOPIC: &str = "mpc.signing_result";

/// Topic carrying failure notifications
pub const SIGNING_RESULT_ERROR_TOPIC: &str = "mpc.signing_result_error";

/// Outbound message transport
#[async_trait]
pub trait Transport: Send + Sync {
    /// Ask the signer parties to run a signing round
    async fn dispatch(&self, request: &SignRoundRequest) -> Result<()>;

    /// Publish the terminal response of a session
    async fn publish_response(&self, response: &SigningResponse) -> Result<()>;

    /// Publish a failure notification
    async fn publish_error_event(&self, event: &SigningResultErrorEvent) -> Result<()>;
}

/// Extension trait for transport with timeout support
#[async_trait]
pub trait TransportExt: Transport {
    /// Dispatch with timeout
    async fn dispatch_with_timeout(
        &self,
        request: &SignRoundRequest,
        timeout: std::time::Duration,
    ) -> Result<()>;
}

#[async_trait]
impl<T: Transport + ?Sized> TransportExt for T {
    async fn dispatch_with_timeout(
        &self,
        request: &SignRoundRequest,
        timeout: std::time::Duration,
    ) -> Result<()> {
        tokio::time::timeout(timeout, self.dispatch(request))
            .await
            .map_err(|_| crate::Error::Timeout(format!("dispatch of round {}", request.round)))?
    }
}
