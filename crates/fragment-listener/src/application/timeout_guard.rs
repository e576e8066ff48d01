//! Background task that fires the session deadline and decides when the
//! listener may close.
//!
//! The guard wakes on every state change and at least once per
//! `poll_interval`.  On each wake it gives the deadline a chance to fire
//! (the ledger only lets it fire while no exchange is in progress) and then
//! returns once the session is stopped *and* idle.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use super::session_state::SharedSession;

/// Watches one session until it is finished.
pub struct TimeoutGuard {
    session: Arc<SharedSession>,
    poll_interval: Duration,
}

impl TimeoutGuard {
    pub fn new(session: Arc<SharedSession>, poll_interval: Duration) -> Self {
        Self {
            session,
            poll_interval,
        }
    }

    /// Runs until the session has stopped and every exchange has completed.
    pub async fn run(self) {
        let id = self.session.id();
        loop {
            if self.session.poll_deadline() {
                info!("session {id}: deadline passed with no redirect; stopping");
            }
            if self.session.is_finished() {
                debug!("session {id}: stopped and idle; guard exiting");
                return;
            }
            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = self.session.changed() => {}
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
