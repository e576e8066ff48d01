//! Session state shared between the accept loop, connection tasks, and the
//! timeout guard.
//!
//! The rules live in [`fragment_core::SessionLedger`]; this module only makes
//! the ledger safe to share.  Every mutation happens under one mutex, and
//! every mutation that changes state wakes the timeout guard through a
//! [`Notify`] so it reacts immediately instead of on its next poll.  A
//! `watch` channel additionally broadcasts the running→stopped transition to
//! connections still waiting for their first request line.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use tokio::sync::{watch, Notify};
use uuid::Uuid;

use fragment_core::{FragmentMap, ParseError, SessionLedger, SessionOutcome, StopTrigger};

/// The session state machine plus a change signal.
///
/// Always used behind an `Arc`.
#[derive(Debug)]
pub struct SharedSession {
    id: Uuid,
    ledger: Mutex<SessionLedger>,
    changed: Notify,
    running: watch::Sender<bool>,
}

impl SharedSession {
    /// Creates a running session that times out at `deadline`.
    pub fn new(deadline: Instant) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            ledger: Mutex::new(SessionLedger::new(deadline)),
            changed: Notify::new(),
            running: watch::Sender::new(true),
        })
    }

    /// Identifier used in log output.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Marks the start of a connection exchange.
    ///
    /// The exchange stays "in progress" until the returned guard is dropped,
    /// whichever way the handler exits.
    pub fn begin_activity(self: &Arc<Self>) -> ActivityGuard {
        self.lock().begin_activity();
        self.changed.notify_one();
        ActivityGuard {
            session: Arc::clone(self),
        }
    }

    /// Records a POST's parse result.  See [`SessionLedger::record_post`].
    pub fn record_post(&self, parsed: Result<FragmentMap, ParseError>) -> Option<StopTrigger> {
        let trigger = self.lock().record_post(parsed);
        if trigger.is_some() {
            self.signal_stopped();
        }
        trigger
    }

    /// Fires the timeout if the deadline has passed while idle.
    ///
    /// Returns `true` if this call stopped the session.
    pub fn poll_deadline(&self) -> bool {
        let fired = self.lock().poll_deadline(Instant::now());
        if fired {
            self.signal_stopped();
        }
        fired
    }

    /// Cancels the session.  Returns `true` if this call stopped it.
    pub fn cancel(&self) -> bool {
        let stopped = self.lock().cancel();
        if stopped {
            self.signal_stopped();
        }
        stopped
    }

    /// `true` until the first stop trigger.
    pub fn is_running(&self) -> bool {
        self.lock().is_running()
    }

    /// `true` once the session has stopped and no exchange is in progress.
    pub fn is_finished(&self) -> bool {
        self.lock().is_finished()
    }

    /// Number of connections currently being handled.
    pub fn active_connections(&self) -> usize {
        self.lock().active_connections()
    }

    /// Snapshot of the current result.
    pub fn outcome(&self) -> SessionOutcome {
        let ledger = self.lock();
        SessionOutcome {
            fragments: ledger.captured().cloned(),
            status: ledger.status().clone(),
        }
    }

    /// Resolves after the next state change (or immediately if one happened
    /// since the last wait).
    pub async fn changed(&self) {
        self.changed.notified().await;
    }

    /// Resolves once the session has stopped (immediately if it already has).
    pub async fn stopped(&self) {
        let mut rx = self.running.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|running| !*running).await;
    }

    fn signal_stopped(&self) {
        self.running.send_replace(false);
        self.changed.notify_one();
    }

    fn end_activity(&self) {
        self.lock().end_activity();
        self.changed.notify_one();
    }

    // The ledger upholds its invariants in every method, so a panic in another
    // thread cannot leave it half-updated.
    fn lock(&self) -> MutexGuard<'_, SessionLedger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Keeps one exchange marked as in progress until dropped.
#[derive(Debug)]
pub struct ActivityGuard {
    session: Arc<SharedSession>,
}

impl Drop for ActivityGuard {
    fn drop(&mut self) {
        self.session.end_activity();
    }
}

/// Cloneable handle that cancels a running session.
///
/// Cancelling is like an early timeout: the listener stops accepting once any
/// exchange in progress has finished, and the outcome reports
/// [`fragment_core::SessionStatus::Cancelled`].
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    session: Arc<SharedSession>,
}

impl ShutdownHandle {
    pub(crate) fn new(session: Arc<SharedSession>) -> Self {
        Self { session }
    }

    /// Requests shutdown.  Returns `false` if the session had already stopped.
    pub fn cancel(&self) -> bool {
        self.session.cancel()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use fragment_core::SessionStatus;

    use super::*;

    fn running_session() -> Arc<SharedSession> {
        SharedSession::new(Instant::now() + Duration::from_secs(120))
    }

    #[test]
    fn test_activity_guard_releases_on_drop() {
        // Arrange
        let session = running_session();

        // Act
        let guard = session.begin_activity();
        let during = session.active_connections();
        drop(guard);

        // Assert
        assert_eq!(during, 1);
        assert_eq!(session.active_connections(), 0);
    }

    #[test]
    fn test_session_not_finished_while_guard_alive() {
        let session = running_session();
        let guard = session.begin_activity();
        session.record_post(Ok([("a", "1")].into_iter().collect()));
        assert!(!session.is_finished());
        drop(guard);
        assert!(session.is_finished());
    }

    #[test]
    fn test_deadline_in_past_fires_once() {
        let session = SharedSession::new(Instant::now());
        assert!(session.poll_deadline());
        assert!(!session.poll_deadline());
        assert_eq!(session.outcome().status, SessionStatus::TimedOut);
    }

    #[test]
    fn test_shutdown_handle_cancels_once() {
        let session = running_session();
        let handle = ShutdownHandle::new(Arc::clone(&session));
        let other = handle.clone();
        assert!(handle.cancel());
        assert!(!other.cancel());
        assert_eq!(session.outcome().status, SessionStatus::Cancelled);
    }

    #[test]
    fn test_outcome_snapshot_carries_capture() {
        let session = running_session();
        session.record_post(Ok([("access_token", "abc")].into_iter().collect()));
        let outcome = session.outcome();
        assert_eq!(
            outcome.fragments.as_ref().and_then(|m| m.get("access_token")),
            Some("abc")
        );
        assert_eq!(outcome.status, SessionStatus::Captured);
    }

    #[tokio::test]
    async fn test_stopped_resolves_after_cancel() {
        // Arrange
        let session = running_session();
        let waiter = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.stopped().await })
        };

        // Act
        session.cancel();

        // Assert
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("stopped() must resolve after cancel")
            .unwrap();
    }

    #[tokio::test]
    async fn test_stopped_resolves_immediately_when_already_stopped() {
        let session = SharedSession::new(Instant::now());
        session.poll_deadline();
        tokio::time::timeout(Duration::from_secs(1), session.stopped())
            .await
            .expect("stopped() must not block on a stopped session");
    }

    #[tokio::test]
    async fn test_changed_resolves_after_state_change() {
        let session = running_session();
        session.cancel();
        // The stored permit makes this resolve without blocking.
        tokio::time::timeout(Duration::from_secs(1), session.changed())
            .await
            .expect("change notification must be delivered");
    }
}
