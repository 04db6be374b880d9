//! Signing session state machine
//!
//! One `SigningSession` per admitted request. All mutation goes through
//! [`SigningSession::handle`], which applies a typed event under the caller's
//! lock and reports what happened. The transition into a terminal state
//! happens once; every later event is discarded.

use chrono::{DateTime, Utc};
use mpc_signing_core::{
    ErrorCode, KeyType, PartialContribution, PartyId, SessionFingerprint, SignRoundRequest,
    SignatureShare, SigningRequest, SigningResponse, codec,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::collector::{CollectorOutcome, QuorumCollector};
use crate::{CoordinatorError, SigningGroup};

/// Lifecycle state of a signing session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Created, round not yet confirmed dispatched
    Pending,
    /// Round dispatched, gathering contributions
    Collecting,
    /// Threshold parties agree on a share
    QuorumReached,
    /// Assembling the final signature
    Composing,
    /// Signature produced
    Completed,
    /// Protocol or composition failure
    Failed,
    /// Deadline elapsed first
    TimedOut,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Failed | SessionState::TimedOut
        )
    }

    pub fn accepts_contributions(&self) -> bool {
        matches!(self, SessionState::Pending | SessionState::Collecting)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Pending => write!(f, "pending"),
            SessionState::Collecting => write!(f, "collecting"),
            SessionState::QuorumReached => write!(f, "quorum_reached"),
            SessionState::Composing => write!(f, "composing"),
            SessionState::Completed => write!(f, "completed"),
            SessionState::Failed => write!(f, "failed"),
            SessionState::TimedOut => write!(f, "timed_out"),
        }
    }
}

/// Input to the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The transport accepted the dispatch for `round`
    DispatchConfirmed { round: u32 },
    /// Dispatch failed and will be retried under a new round
    DispatchRetry,
    /// Dispatch retries are exhausted
    DispatchFailed { reason: String },
    ContributionArrived(PartialContribution),
    DeadlineElapsed,
}

/// Why an event had no effect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// Contribution carries another session's fingerprint
    WrongSession,
    /// Contribution or confirmation for a round other than the current one
    StaleRound,
    /// Sender is not a participant of the signing group
    UnknownParty,
    /// Session already finished or is past collection
    SessionClosed,
    /// No live session for the fingerprint
    UnknownSession,
}

impl fmt::Display for DiscardReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscardReason::WrongSession => write!(f, "wrong session"),
            DiscardReason::StaleRound => write!(f, "stale round"),
            DiscardReason::UnknownParty => write!(f, "unknown party"),
            DiscardReason::SessionClosed => write!(f, "session closed"),
            DiscardReason::UnknownSession => write!(f, "unknown session"),
        }
    }
}

/// A session that ended without a signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningFailure {
    pub wallet_id: String,
    pub tx_id: String,
    pub error_code: ErrorCode,
    pub error_reason: String,
    pub is_timeout: bool,
}

impl SigningFailure {
    pub fn new(
        wallet_id: impl Into<String>,
        tx_id: impl Into<String>,
        error_code: ErrorCode,
        error_reason: impl Into<String>,
    ) -> Self {
        Self {
            wallet_id: wallet_id.into(),
            tx_id: tx_id.into(),
            error_code,
            error_reason: error_reason.into(),
            is_timeout: error_code == ErrorCode::Timeout,
        }
    }

    /// Failure for a request rejected before a session existed
    pub fn rejected(request: &SigningRequest, err: &CoordinatorError) -> Self {
        Self::new(
            &request.wallet_id,
            &request.tx_id,
            err.code(),
            err.to_string(),
        )
    }
}

/// Terminal result of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Completed {
        wallet_id: String,
        tx_id: String,
        signature: Vec<u8>,
    },
    Failed(SigningFailure),
}

impl SessionOutcome {
    pub fn wallet_id(&self) -> &str {
        match self {
            SessionOutcome::Completed { wallet_id, .. } => wallet_id,
            SessionOutcome::Failed(failure) => &failure.wallet_id,
        }
    }

    pub fn tx_id(&self) -> &str {
        match self {
            SessionOutcome::Completed { tx_id, .. } => tx_id,
            SessionOutcome::Failed(failure) => &failure.tx_id,
        }
    }

    pub fn error_code(&self) -> ErrorCode {
        match self {
            SessionOutcome::Completed { .. } => ErrorCode::None,
            SessionOutcome::Failed(failure) => failure.error_code,
        }
    }

    /// Terminal state this outcome corresponds to
    pub fn state(&self) -> SessionState {
        match self {
            SessionOutcome::Completed { .. } => SessionState::Completed,
            SessionOutcome::Failed(failure) if failure.is_timeout => SessionState::TimedOut,
            SessionOutcome::Failed(_) => SessionState::Failed,
        }
    }

    /// Wire response for this outcome
    pub fn to_response(&self) -> SigningResponse {
        match self {
            SessionOutcome::Completed {
                wallet_id,
                tx_id,
                signature,
            } => SigningResponse::success(wallet_id, tx_id, signature.clone()),
            SessionOutcome::Failed(failure) => SigningResponse {
                error_code: failure.error_code,
                error_reason: failure.error_reason.clone(),
                is_timeout: failure.is_timeout,
                wallet_id: failure.wallet_id.clone(),
                tx_id: failure.tx_id.clone(),
                signature: Vec::new(),
            },
        }
    }
}

/// What applying an event did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Contribution counted toward the quorum
    Accepted { collected: usize, threshold: usize },
    /// Identical resubmission, nothing changed
    DuplicateIgnored,
    Discarded(DiscardReason),
    /// Non-terminal transition (or confirmation of the current state)
    Advanced(SessionState),
    /// The session just became terminal; emitted exactly once
    Finished(SessionOutcome),
}

impl StepOutcome {
    pub fn is_finished(&self) -> bool {
        matches!(self, StepOutcome::Finished(_))
    }

    pub fn into_finished(self) -> Option<SessionOutcome> {
        match self {
            StepOutcome::Finished(outcome) => Some(outcome),
            _ => None,
        }
    }
}

/// State of one signing request
#[derive(Debug)]
pub struct SigningSession {
    fingerprint: SessionFingerprint,
    wallet_id: String,
    tx_id: String,
    key_type: KeyType,
    tx: Vec<u8>,
    participants: Vec<PartyId>,
    public_key: Vec<u8>,
    verify_signature: bool,
    round: u32,
    collector: QuorumCollector,
    state: SessionState,
    deadline: Instant,
    created_at: DateTime<Utc>,
}

impl SigningSession {
    pub fn new(
        request: &SigningRequest,
        group: &SigningGroup,
        deadline: Instant,
        verify_signature: bool,
    ) -> Self {
        Self {
            fingerprint: request.fingerprint(),
            wallet_id: request.wallet_id.clone(),
            tx_id: request.tx_id.clone(),
            key_type: request.key_type,
            tx: request.tx.clone(),
            participants: group.participants.clone(),
            public_key: group.public_key.clone(),
            verify_signature,
            round: 0,
            collector: QuorumCollector::new(group.threshold),
            state: SessionState::Pending,
            deadline,
            created_at: Utc::now(),
        }
    }

    pub fn fingerprint(&self) -> SessionFingerprint {
        self.fingerprint
    }

    pub fn wallet_id(&self) -> &str {
        &self.wallet_id
    }

    pub fn tx_id(&self) -> &str {
        &self.tx_id
    }

    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn threshold(&self) -> usize {
        self.collector.threshold()
    }

    /// Contributions counted in the current round
    pub fn collected(&self) -> usize {
        self.collector.contributed()
    }

    /// Dispatch instruction for the current round
    pub fn dispatch_request(&self) -> SignRoundRequest {
        SignRoundRequest {
            fingerprint: self.fingerprint,
            round: self.round,
            key_type: self.key_type,
            wallet_id: self.wallet_id.clone(),
            tx_id: self.tx_id.clone(),
            tx: self.tx.clone(),
            participants: self.participants.clone(),
            threshold: self.collector.threshold(),
        }
    }

    /// Apply one event
    ///
    /// `now` is compared against the fixed deadline; a contribution observed
    /// at or after it times the session out instead of being counted.
    pub fn handle(&mut self, event: SessionEvent, now: Instant) -> StepOutcome {
        if self.state.is_terminal() {
            debug!(
                fingerprint = %self.fingerprint,
                state = %self.state,
                "Ignoring event for finished session"
            );
            return StepOutcome::Discarded(DiscardReason::SessionClosed);
        }

        match event {
            SessionEvent::DispatchConfirmed { round } => self.on_dispatch_confirmed(round),
            SessionEvent::DispatchRetry => self.on_dispatch_retry(),
            SessionEvent::DispatchFailed { reason } => self.fail(ErrorCode::InternalError, reason),
            SessionEvent::ContributionArrived(contribution) => {
                self.on_contribution(contribution, now)
            }
            SessionEvent::DeadlineElapsed => self.time_out(),
        }
    }

    fn on_dispatch_confirmed(&mut self, round: u32) -> StepOutcome {
        if round != self.round {
            debug!(
                fingerprint = %self.fingerprint,
                round,
                current_round = self.round,
                "Ignoring confirmation for superseded round"
            );
            return StepOutcome::Discarded(DiscardReason::StaleRound);
        }

        if self.state == SessionState::Pending {
            self.state = SessionState::Collecting;
            info!(
                fingerprint = %self.fingerprint,
                round,
                "Collecting contributions"
            );
        }
        StepOutcome::Advanced(self.state)
    }

    fn on_dispatch_retry(&mut self) -> StepOutcome {
        self.round += 1;
        self.collector.reset();
        self.state = SessionState::Pending;
        warn!(
            fingerprint = %self.fingerprint,
            round = self.round,
            "Retrying dispatch under new round"
        );
        StepOutcome::Advanced(self.state)
    }

    fn on_contribution(&mut self, contribution: PartialContribution, now: Instant) -> StepOutcome {
        if contribution.fingerprint != self.fingerprint {
            warn!(
                fingerprint = %self.fingerprint,
                other = %contribution.fingerprint,
                party_id = %contribution.party_id,
                "Discarding contribution for another session"
            );
            return StepOutcome::Discarded(DiscardReason::WrongSession);
        }

        if !self.state.accepts_contributions() {
            return StepOutcome::Discarded(DiscardReason::SessionClosed);
        }

        if now >= self.deadline {
            return self.time_out();
        }

        if contribution.round != self.round {
            warn!(
                fingerprint = %self.fingerprint,
                party_id = %contribution.party_id,
                round = contribution.round,
                current_round = self.round,
                "Discarding stale contribution"
            );
            return StepOutcome::Discarded(DiscardReason::StaleRound);
        }

        if !self.participants.contains(&contribution.party_id) {
            warn!(
                fingerprint = %self.fingerprint,
                party_id = %contribution.party_id,
                "Discarding contribution from non-participant"
            );
            return StepOutcome::Discarded(DiscardReason::UnknownParty);
        }

        let party_id = contribution.party_id;
        match self.collector.accept(&party_id, contribution.share) {
            CollectorOutcome::Accepted { collected } => {
                let outstanding = self.participants.len() - self.collector.contributed();
                if !self.collector.quorum_reachable(outstanding) {
                    return self.fail(
                        ErrorCode::InsufficientQuorum,
                        format!(
                            "no share can reach {} agreeing parties in round {}",
                            self.collector.threshold(),
                            self.round
                        ),
                    );
                }

                debug!(
                    fingerprint = %self.fingerprint,
                    party_id = %party_id,
                    collected,
                    threshold = self.collector.threshold(),
                    "Contribution accepted"
                );
                StepOutcome::Accepted {
                    collected,
                    threshold: self.collector.threshold(),
                }
            }
            CollectorOutcome::DuplicateIgnored => {
                debug!(
                    fingerprint = %self.fingerprint,
                    party_id = %party_id,
                    "Duplicate contribution ignored"
                );
                StepOutcome::DuplicateIgnored
            }
            CollectorOutcome::Conflict { .. } => self.fail(
                ErrorCode::ConflictingContribution,
                format!(
                    "party {party_id} sent conflicting shares in round {}",
                    self.round
                ),
            ),
            CollectorOutcome::QuorumReached(share) => {
                self.state = SessionState::QuorumReached;
                info!(
                    fingerprint = %self.fingerprint,
                    round = self.round,
                    parties = ?self.collector.agreeing_parties(),
                    "Quorum reached"
                );
                self.compose(share)
            }
        }
    }

    fn compose(&mut self, share: SignatureShare) -> StepOutcome {
        self.state = SessionState::Composing;

        let signature = match codec::compose_signature(self.key_type, &share) {
            Ok(signature) => signature,
            Err(e) => return self.fail(ErrorCode::SignatureCompositionError, e.to_string()),
        };

        if self.verify_signature {
            if let Err(e) =
                codec::verify_signature(self.key_type, &self.public_key, &self.tx, &signature)
            {
                return self.fail(ErrorCode::SignatureVerificationFailed, e.to_string());
            }
        }

        self.state = SessionState::Completed;
        info!(
            fingerprint = %self.fingerprint,
            wallet_id = %self.wallet_id,
            tx_id = %self.tx_id,
            round = self.round,
            "Signing session completed"
        );

        StepOutcome::Finished(SessionOutcome::Completed {
            wallet_id: self.wallet_id.clone(),
            tx_id: self.tx_id.clone(),
            signature,
        })
    }

    fn fail(&mut self, error_code: ErrorCode, reason: impl Into<String>) -> StepOutcome {
        let reason = reason.into();
        self.state = SessionState::Failed;
        error!(
            fingerprint = %self.fingerprint,
            wallet_id = %self.wallet_id,
            tx_id = %self.tx_id,
            code = %error_code,
            reason = %reason,
            "Signing session failed"
        );

        StepOutcome::Finished(SessionOutcome::Failed(SigningFailure::new(
            &self.wallet_id,
            &self.tx_id,
            error_code,
            reason,
        )))
    }

    fn time_out(&mut self) -> StepOutcome {
        self.state = SessionState::TimedOut;
        let reason = format!(
            "deadline elapsed with {} of {} contributions in round {}",
            self.collector.contributed(),
            self.collector.threshold(),
            self.round
        );
        warn!(
            fingerprint = %self.fingerprint,
            wallet_id = %self.wallet_id,
            tx_id = %self.tx_id,
            reason = %reason,
            "Signing session timed out"
        );

        StepOutcome::Finished(SessionOutcome::Failed(SigningFailure::new(
            &self.wallet_id,
            &self.tx_id,
            ErrorCode::Timeout,
            reason,
        )))
    }
}
