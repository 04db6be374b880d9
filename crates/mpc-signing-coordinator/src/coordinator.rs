//! Signing coordinator engine
//!
//! Wires intake, validation, admission, dispatch, the deadline timer,
//! contribution routing and publication together. Each admitted session gets
//! one driver task; contributions are applied by whichever task delivers
//! them, under the session lock.
//!
//! Lock order: a session lock is never held while the registry lock is taken,
//! and neither is held across an await.

use mpc_signing_core::transport::{Transport, TransportExt};
use mpc_signing_core::{PartialContribution, SigningRequest, SigningResponse};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::config::CoordinatorConfig;
use crate::directory::{KeyDirectory, SigningGroup};
use crate::publisher::OutcomePublisher;
use crate::registry::{Admission, SessionHandle, SessionRegistry, SessionTicket};
use crate::session::{
    DiscardReason, SessionEvent, SessionOutcome, SessionState, SigningFailure, SigningSession,
    StepOutcome,
};
use crate::{CoordinatorError, Result};

/// Coordinator statistics
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct CoordinatorStats {
    pub sessions_created: u64,
    pub requests_deduplicated: u64,
    pub requests_replayed: u64,
    pub requests_rejected: u64,
    pub sessions_completed: u64,
    pub sessions_failed: u64,
    pub sessions_timed_out: u64,
    pub contributions_discarded: u64,
}

/// Threshold signing coordinator
pub struct SigningCoordinator<T: Transport + 'static> {
    transport: Arc<T>,
    directory: Arc<dyn KeyDirectory>,
    registry: Arc<SessionRegistry>,
    publisher: Arc<OutcomePublisher<T>>,
    config: Arc<CoordinatorConfig>,
    stats: Arc<RwLock<CoordinatorStats>>,
}

impl<T: Transport + 'static> Clone for SigningCoordinator<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            directory: Arc::clone(&self.directory),
            registry: Arc::clone(&self.registry),
            publisher: Arc::clone(&self.publisher),
            config: Arc::clone(&self.config),
            stats: Arc::clone(&self.stats),
        }
    }
}

impl<T: Transport + 'static> SigningCoordinator<T> {
    pub fn new(
        transport: Arc<T>,
        directory: Arc<dyn KeyDirectory>,
        config: CoordinatorConfig,
    ) -> Self {
        let publisher = OutcomePublisher::new(
            Arc::clone(&transport),
            config.publish_retry.clone(),
            config.publish_error_events,
        );
        Self {
            transport,
            directory,
            registry: Arc::new(SessionRegistry::new(config.completed_retention())),
            publisher: Arc::new(publisher),
            config: Arc::new(config),
            stats: Arc::new(RwLock::new(CoordinatorStats::default())),
        }
    }

    /// Accept a signing request
    ///
    /// Returns a ticket for the session's eventual response. A request that
    /// fails validation is published as a failure and returned as `Err`.
    #[instrument(
        skip(self, request),
        fields(wallet_id = %request.wallet_id, tx_id = %request.tx_id)
    )]
    pub async fn submit(
        &self,
        request: SigningRequest,
    ) -> std::result::Result<SessionTicket, SigningResponse> {
        let group = match self.validate(&request) {
            Ok(group) => group,
            Err(e) => {
                self.stats.write().requests_rejected += 1;
                warn!(code = %e.code(), error = %e, "Rejecting signing request");
                let outcome = SessionOutcome::Failed(SigningFailure::rejected(&request, &e));
                return Err(self.publisher.publish(&outcome).await);
            }
        };

        let fingerprint = request.fingerprint();
        let now = Instant::now();
        let deadline = now + self.config.session_timeout();
        let verify = self.config.verify_signatures;

        let admission = self.registry.admit(fingerprint, now, || {
            SigningSession::new(&request, &group, deadline, verify)
        });

        match admission {
            Admission::New(handle) => {
                self.stats.write().sessions_created += 1;
                info!(
                    fingerprint = %fingerprint,
                    threshold = group.threshold,
                    participants = group.participants.len(),
                    "Signing session created"
                );
                let ticket = SessionTicket::attach(&handle, &request, false);
                tokio::spawn(self.clone().drive(handle));
                Ok(ticket)
            }
            Admission::AlreadyInFlight(handle) => {
                self.stats.write().requests_deduplicated += 1;
                info!(fingerprint = %fingerprint, "Request already in flight, attaching");
                Ok(SessionTicket::attach(&handle, &request, true))
            }
            Admission::Replayed(response) => {
                self.stats.write().requests_replayed += 1;
                info!(
                    fingerprint = %fingerprint,
                    code = %response.error_code,
                    "Replaying recent outcome"
                );
                Ok(SessionTicket::replayed(fingerprint, response))
            }
        }
    }

    /// Submit and wait for the terminal response
    pub async fn sign(&self, request: SigningRequest) -> SigningResponse {
        match self.submit(request).await {
            Ok(ticket) => ticket.wait().await,
            Err(response) => response,
        }
    }

    /// Route a signer party's contribution to its session
    #[instrument(
        skip(self, contribution),
        fields(
            fingerprint = %contribution.fingerprint,
            party_id = %contribution.party_id,
            round = contribution.round
        )
    )]
    pub async fn on_contribution(&self, contribution: PartialContribution) -> StepOutcome {
        let Some(handle) = self.registry.get(&contribution.fingerprint) else {
            self.stats.write().contributions_discarded += 1;
            debug!("No live session for contribution");
            return StepOutcome::Discarded(DiscardReason::UnknownSession);
        };

        let step = {
            let mut session = handle.lock();
            session.handle(
                SessionEvent::ContributionArrived(contribution),
                Instant::now(),
            )
        };

        match &step {
            StepOutcome::Discarded(_) => {
                self.stats.write().contributions_discarded += 1;
            }
            StepOutcome::Finished(outcome) => self.finalize(&handle, outcome).await,
            _ => {}
        }
        step
    }

    /// Snapshot of the counters
    pub fn stats(&self) -> CoordinatorStats {
        self.stats.read().clone()
    }

    pub fn live_sessions(&self) -> usize {
        self.registry.live_count()
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Periodically drop expired entries from the recent-outcome window
    pub fn spawn_maintenance(&self, interval: Duration) -> JoinHandle<()> {
        let registry = Arc::clone(&self.registry);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                registry.purge_expired(Instant::now());
            }
        })
    }

    fn validate(&self, request: &SigningRequest) -> Result<SigningGroup> {
        request.validate()?;

        let group = self
            .directory
            .signing_group(&request.wallet_id)
            .ok_or_else(|| CoordinatorError::UnknownWallet(request.wallet_id.clone()))?;

        if group.key_type != request.key_type {
            return Err(CoordinatorError::KeyTypeMismatch {
                expected: group.key_type,
                actual: request.key_type,
            });
        }

        group.validate()?;
        Ok(group)
    }

    /// Dispatch, then wait for either an outcome or the deadline
    async fn drive(self, handle: Arc<SessionHandle>) {
        let deadline = handle.lock().deadline();

        if let Some(outcome) = self.dispatch(&handle).await {
            self.finalize(&handle, &outcome).await;
            return;
        }

        let mut resolved = handle.subscribe();
        let deadline_elapsed = tokio::select! {
            _ = tokio::time::sleep_until(deadline) => true,
            _ = resolved.wait_for(Option::is_some) => false,
        };
        if !deadline_elapsed {
            return;
        }

        let step = {
            let mut session = handle.lock();
            session.handle(SessionEvent::DeadlineElapsed, Instant::now())
        };
        if let StepOutcome::Finished(outcome) = step {
            self.finalize(&handle, &outcome).await;
        }
    }

    /// Send the current round, retrying under a new round on failure
    ///
    /// Returns an outcome only when dispatching itself ended the session.
    async fn dispatch(&self, handle: &SessionHandle) -> Option<SessionOutcome> {
        let retry = &self.config.dispatch_retry;
        let mut attempt = 0;
        let mut delay_ms = retry.initial_delay_ms;

        loop {
            attempt += 1;

            let (request, deadline) = {
                let session = handle.lock();
                if session.state().is_terminal() {
                    return None;
                }
                (session.dispatch_request(), session.deadline())
            };

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                // Deadline timer takes it from here
                return None;
            }

            let sent = self.transport.dispatch_with_timeout(&request, remaining);
            let err = match sent.await {
                Ok(()) => {
                    let mut session = handle.lock();
                    let step = session.handle(
                        SessionEvent::DispatchConfirmed {
                            round: request.round,
                        },
                        Instant::now(),
                    );
                    return step.into_finished();
                }
                Err(e) => e,
            };

            if attempt >= retry.attempts() {
                let mut session = handle.lock();
                let step = session.handle(
                    SessionEvent::DispatchFailed {
                        reason: format!("dispatch failed after {attempt} attempts: {err}"),
                    },
                    Instant::now(),
                );
                return step.into_finished();
            }

            warn!(
                fingerprint = %request.fingerprint,
                round = request.round,
                attempt,
                error = %err,
                "Dispatch failed, retrying"
            );

            let pause = Duration::from_millis(delay_ms).min(remaining);
            tokio::time::sleep(pause).await;
            delay_ms = retry.next_delay_ms(delay_ms);

            let step = handle
                .lock()
                .handle(SessionEvent::DispatchRetry, Instant::now());
            if let Some(outcome) = step.into_finished() {
                return Some(outcome);
            }
        }
    }

    /// Publish, retire the session, wake waiters
    async fn finalize(&self, handle: &SessionHandle, outcome: &SessionOutcome) {
        {
            let mut stats = self.stats.write();
            match outcome.state() {
                SessionState::Completed => stats.sessions_completed += 1,
                SessionState::TimedOut => stats.sessions_timed_out += 1,
                _ => stats.sessions_failed += 1,
            }
        }

        let response = self.publisher.publish(outcome).await;
        // Waiters must observe a registry that no longer lists the session
        self.registry
            .release(&handle.fingerprint(), &response, Instant::now());
        handle.resolve(response.clone());

        info!(
            fingerprint = %handle.fingerprint(),
            code = %response.error_code,
            "Signing session finalized"
        );
    }
}
