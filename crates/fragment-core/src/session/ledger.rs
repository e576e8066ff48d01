//! State machine for one listener session.
//!
//! [`SessionLedger`] owns every piece of mutable session state and is the only
//! place that changes it.  The async listener wraps it in a mutex; this module
//! only encodes the rules:
//!
//! - The session stops exactly once (`running` goes `true → false` and never
//!   back).  The first trigger to arrive decides the status.
//! - Captured data is stored at most once, and only by the trigger that
//!   stopped the session.
//! - The deadline is fixed at construction and only fires while no exchange
//!   is in progress, so an in-flight response is never cut short.
//! - The session is *finished* (safe to close the socket) only when it has
//!   stopped and no exchange is in progress.

use std::time::Instant;

use crate::fragment::map::FragmentMap;
use crate::fragment::parser::ParseError;

use super::outcome::{SessionOutcome, SessionStatus};

/// What stopped the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopTrigger {
    /// A POST was parsed successfully.
    Captured,
    /// A POST arrived but could not be parsed.
    Malformed,
    /// The deadline passed while idle.
    DeadlineElapsed,
    /// The owner cancelled the session.
    Cancelled,
}

/// Mutable state of a single listener session.
///
/// # Example
///
/// ```rust
/// use std::time::{Duration, Instant};
/// use fragment_core::{parse_fragment, SessionLedger, SessionStatus};
///
/// let mut ledger = SessionLedger::new(Instant::now() + Duration::from_secs(120));
/// ledger.begin_activity();
/// ledger.record_post(parse_fragment("access_token=abc"));
/// assert!(!ledger.is_finished()); // the POST handler is still writing its response
/// ledger.end_activity();
/// assert!(ledger.is_finished());
///
/// let outcome = ledger.into_outcome();
/// assert_eq!(outcome.status, SessionStatus::Captured);
/// ```
#[derive(Debug)]
pub struct SessionLedger {
    deadline: Instant,
    running: bool,
    active: usize,
    captured: Option<FragmentMap>,
    status: SessionStatus,
}

impl SessionLedger {
    /// Creates a running session that times out at `deadline`.
    pub fn new(deadline: Instant) -> Self {
        Self {
            deadline,
            running: true,
            active: 0,
            captured: None,
            status: SessionStatus::Pending,
        }
    }

    /// The absolute deadline fixed at construction.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// `true` until the first stop trigger.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Number of connections currently being handled.
    pub fn active_connections(&self) -> usize {
        self.active
    }

    /// `true` when the session has stopped and no exchange is in progress.
    pub fn is_finished(&self) -> bool {
        !self.running && self.active == 0
    }

    /// Current status.
    pub fn status(&self) -> &SessionStatus {
        &self.status
    }

    /// The captured map, once a valid POST has stopped the session.
    pub fn captured(&self) -> Option<&FragmentMap> {
        self.captured.as_ref()
    }

    /// Marks the start of a connection exchange.
    pub fn begin_activity(&mut self) {
        self.active += 1;
    }

    /// Marks the end of a connection exchange.
    pub fn end_activity(&mut self) {
        self.active = self.active.saturating_sub(1);
    }

    /// Records the parse result of a POST.
    ///
    /// Returns the trigger when this POST stopped the session, or `None` if
    /// the session had already stopped (the result is then discarded).
    pub fn record_post(&mut self, parsed: Result<FragmentMap, ParseError>) -> Option<StopTrigger> {
        if !self.running {
            return None;
        }
        match parsed {
            Ok(map) => {
                self.captured = Some(map);
                self.stop(SessionStatus::Captured);
                Some(StopTrigger::Captured)
            }
            Err(err) => {
                self.stop(SessionStatus::Malformed(err));
                Some(StopTrigger::Malformed)
            }
        }
    }

    /// Fires the timeout if `now` is at or past the deadline, the session is
    /// still running, and no exchange is in progress.
    ///
    /// Returns `true` if this call stopped the session.
    pub fn poll_deadline(&mut self, now: Instant) -> bool {
        if self.running && self.active == 0 && now >= self.deadline {
            self.stop(SessionStatus::TimedOut);
            return true;
        }
        false
    }

    /// Stops the session with [`SessionStatus::Cancelled`].
    ///
    /// An exchange already in progress is still allowed to finish.  Returns
    /// `true` if this call stopped the session.
    pub fn cancel(&mut self) -> bool {
        if !self.running {
            return false;
        }
        self.stop(SessionStatus::Cancelled);
        true
    }

    /// Consumes the ledger and produces the caller-facing result.
    pub fn into_outcome(self) -> SessionOutcome {
        SessionOutcome {
            fragments: self.captured,
            status: self.status,
        }
    }

    fn stop(&mut self, status: SessionStatus) {
        debug_assert!(self.running, "session stopped twice");
        self.running = false;
        self.status = status;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
