//! Session registry
//!
//! Single-flight gate keyed by session fingerprint. A request whose
//! fingerprint is live attaches to the existing session instead of starting
//! another one; after a session ends its response stays available for the
//! retention window so late duplicates are answered without a new round.

use mpc_signing_core::{ErrorCode, SessionFingerprint, SigningRequest, SigningResponse};
use parking_lot::{Mutex, MutexGuard};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::debug;

use crate::session::SigningSession;

/// A live session plus its outcome channel
#[derive(Debug)]
pub struct SessionHandle {
    fingerprint: SessionFingerprint,
    session: Mutex<SigningSession>,
    outcome: watch::Sender<Option<SigningResponse>>,
}

impl SessionHandle {
    pub fn new(session: SigningSession) -> Self {
        let (outcome, _) = watch::channel(None);
        Self {
            fingerprint: session.fingerprint(),
            session: Mutex::new(session),
            outcome,
        }
    }

    pub fn fingerprint(&self) -> SessionFingerprint {
        self.fingerprint
    }

    /// Lock the session state; never hold across an await or a registry call
    pub fn lock(&self) -> MutexGuard<'_, SigningSession> {
        self.session.lock()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<SigningResponse>> {
        self.outcome.subscribe()
    }

    /// Record the terminal response; only the first call has an effect
    pub fn resolve(&self, response: SigningResponse) -> bool {
        self.outcome.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(response);
            true
        })
    }

    pub fn response(&self) -> Option<SigningResponse> {
        self.outcome.borrow().clone()
    }
}

#[derive(Debug)]
enum TicketOutcome {
    Waiting(watch::Receiver<Option<SigningResponse>>),
    Ready(SigningResponse),
}

/// A caller's claim on a session's eventual response
#[derive(Debug)]
pub struct SessionTicket {
    fingerprint: SessionFingerprint,
    wallet_id: String,
    tx_id: String,
    deduplicated: bool,
    outcome: TicketOutcome,
}

impl SessionTicket {
    pub(crate) fn attach(
        handle: &SessionHandle,
        request: &SigningRequest,
        deduplicated: bool,
    ) -> Self {
        Self {
            fingerprint: handle.fingerprint(),
            wallet_id: request.wallet_id.clone(),
            tx_id: request.tx_id.clone(),
            deduplicated,
            outcome: TicketOutcome::Waiting(handle.subscribe()),
        }
    }

    pub(crate) fn replayed(fingerprint: SessionFingerprint, response: SigningResponse) -> Self {
        Self {
            fingerprint,
            wallet_id: response.wallet_id.clone(),
            tx_id: response.tx_id.clone(),
            deduplicated: true,
            outcome: TicketOutcome::Ready(response),
        }
    }

    pub fn fingerprint(&self) -> SessionFingerprint {
        self.fingerprint
    }

    /// True when this request joined an existing or recent session
    pub fn is_deduplicated(&self) -> bool {
        self.deduplicated
    }

    /// True when the response came from the recent-outcome window
    pub fn is_replayed(&self) -> bool {
        matches!(self.outcome, TicketOutcome::Ready(_))
    }

    /// Wait for the session's terminal response
    pub async fn wait(self) -> SigningResponse {
        let mut rx = match self.outcome {
            TicketOutcome::Ready(response) => return response,
            TicketOutcome::Waiting(rx) => rx,
        };

        let response = match rx.wait_for(Option::is_some).await {
            Ok(slot) => (*slot).clone(),
            Err(_) => None,
        };

        response.unwrap_or_else(|| {
            SigningResponse::failure(
                self.wallet_id,
                self.tx_id,
                ErrorCode::InternalError,
                "session dropped without an outcome",
            )
        })
    }
}

/// Result of admitting a request
#[derive(Debug)]
pub enum Admission {
    /// A new session was created; the caller must drive it
    New(Arc<SessionHandle>),
    /// A session for this fingerprint is live
    AlreadyInFlight(Arc<SessionHandle>),
    /// A session for this fingerprint ended within the retention window
    Replayed(SigningResponse),
}

#[derive(Debug)]
struct RecentOutcome {
    response: SigningResponse,
    released_at: Instant,
}

#[derive(Debug, Default)]
struct RegistryInner {
    live: HashMap<SessionFingerprint, Arc<SessionHandle>>,
    recent: HashMap<SessionFingerprint, RecentOutcome>,
}

/// Table of live sessions and recent outcomes
#[derive(Debug)]
pub struct SessionRegistry {
    retention: Duration,
    inner: Mutex<RegistryInner>,
}

impl SessionRegistry {
    pub fn new(retention: Duration) -> Self {
        Self {
            retention,
            inner: Mutex::new(RegistryInner::default()),
        }
    }

    /// Admit a request by fingerprint
    ///
    /// `make_session` runs under the registry lock and only when a new
    /// session is needed.
    pub fn admit<F>(
        &self,
        fingerprint: SessionFingerprint,
        now: Instant,
        make_session: F,
    ) -> Admission
    where
        F: FnOnce() -> SigningSession,
    {
        let mut inner = self.inner.lock();

        if let Some(handle) = inner.live.get(&fingerprint) {
            return Admission::AlreadyInFlight(Arc::clone(handle));
        }

        if let Some(recent) = inner.recent.get(&fingerprint) {
            if now.saturating_duration_since(recent.released_at) < self.retention {
                return Admission::Replayed(recent.response.clone());
            }
            inner.recent.remove(&fingerprint);
        }

        let handle = Arc::new(SessionHandle::new(make_session()));
        inner.live.insert(fingerprint, Arc::clone(&handle));
        Admission::New(handle)
    }

    /// Live session for a fingerprint
    pub fn get(&self, fingerprint: &SessionFingerprint) -> Option<Arc<SessionHandle>> {
        self.inner.lock().live.get(fingerprint).cloned()
    }

    /// Retire a finished session
    ///
    /// Responses with a retryable error code are not retained, so a client
    /// resubmitting after a timeout gets a fresh session.
    pub fn release(
        &self,
        fingerprint: &SessionFingerprint,
        response: &SigningResponse,
        now: Instant,
    ) {
        let mut inner = self.inner.lock();
        inner.live.remove(fingerprint);

        if self.retention.is_zero() || response.error_code.is_retryable() {
            return;
        }
        inner.recent.insert(
            *fingerprint,
            RecentOutcome {
                response: response.clone(),
                released_at: now,
            },
        );
    }

    /// Drop recent outcomes older than the retention window
    pub fn purge_expired(&self, now: Instant) -> usize {
        let mut inner = self.inner.lock();
        let before = inner.recent.len();
        let retention = self.retention;
        inner
            .recent
            .retain(|_, recent| now.saturating_duration_since(recent.released_at) < retention);

        let purged = before - inner.recent.len();
        if purged > 0 {
            debug!(purged, "Purged expired session outcomes");
        }
        purged
    }

    pub fn live_count(&self) -> usize {
        self.inner.lock().live.len()
    }

    pub fn recent_count(&self) -> usize {
        self.inner.lock().recent.len()
    }
}
