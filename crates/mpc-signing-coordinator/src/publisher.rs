//! Outcome publication
//!
//! Maps a terminal session outcome to its wire messages and hands them to the
//! transport. Delivery failures are retried with backoff and then logged; the
//! response returned to local waiters does not depend on delivery.

use mpc_signing_core::transport::Transport;
use mpc_signing_core::{Result as CoreResult, SigningResponse, SigningResultErrorEvent};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, error, instrument, warn};

use crate::config::RetryConfig;
use crate::session::SessionOutcome;

enum Outbound<'a> {
    Response(&'a SigningResponse),
    ErrorEvent(&'a SigningResultErrorEvent),
}

impl Outbound<'_> {
    fn kind(&self) -> &'static str {
        match self {
            Outbound::Response(_) => "response",
            Outbound::ErrorEvent(_) => "error_event",
        }
    }
}

pub struct OutcomePublisher<T: Transport> {
    transport: Arc<T>,
    retry: RetryConfig,
    error_events: bool,
    failed_deliveries: AtomicU64,
}

impl<T: Transport> OutcomePublisher<T> {
    pub fn new(transport: Arc<T>, retry: RetryConfig, error_events: bool) -> Self {
        Self {
            transport,
            retry,
            error_events,
            failed_deliveries: AtomicU64::new(0),
        }
    }

    /// Publish the response (and error event, for failures) for an outcome
    #[instrument(
        skip(self, outcome),
        fields(wallet_id = %outcome.wallet_id(), tx_id = %outcome.tx_id())
    )]
    pub async fn publish(&self, outcome: &SessionOutcome) -> SigningResponse {
        let response = outcome.to_response();
        self.deliver(Outbound::Response(&response)).await;

        if self.error_events {
            if let Some(event) = response.error_event() {
                self.deliver(Outbound::ErrorEvent(&event)).await;
            }
        }

        response
    }

    /// Messages that could not be delivered after all retries
    pub fn failed_deliveries(&self) -> u64 {
        self.failed_deliveries.load(Ordering::Relaxed)
    }

    async fn send(&self, message: &Outbound<'_>) -> CoreResult<()> {
        match message {
            Outbound::Response(response) => self.transport.publish_response(response).await,
            Outbound::ErrorEvent(event) => self.transport.publish_error_event(event).await,
        }
    }

    async fn deliver(&self, message: Outbound<'_>) -> bool {
        let mut attempt = 0;
        let mut delay_ms = self.retry.initial_delay_ms;

        loop {
            attempt += 1;

            match self.send(&message).await {
                Ok(()) => {
                    debug!(kind = message.kind(), attempt, "Outcome published");
                    return true;
                }
                Err(e) if attempt >= self.retry.attempts() => {
                    self.failed_deliveries.fetch_add(1, Ordering::Relaxed);
                    error!(
                        kind = message.kind(),
                        attempts = attempt,
                        error = %e,
                        "Outcome publication failed after max retries"
                    );
                    return false;
                }
                Err(e) => {
                    warn!(
                        kind = message.kind(),
                        attempt,
                        error = %e,
                        "Outcome publication failed, retrying"
                    );
                }
            }

            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            delay_ms = self.retry.next_delay_ms(delay_ms);
        }
    }
}
