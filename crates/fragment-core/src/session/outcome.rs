//! Terminal status and result of a listener session.

use std::fmt;

use serde::{Serialize, Serializer};

use crate::fragment::map::FragmentMap;
use crate::fragment::parser::ParseError;

/// Status text after a POST produced a valid fragment map.
pub const CAPTURED_MESSAGE: &str = "Successfully obtained url fragments";

/// Status text after a POST whose payload could not be parsed.
pub const MALFORMED_MESSAGE: &str = "Something went wrong when retrieving the url fragments";

/// Status text after the deadline passed with nothing captured.
pub const TIMED_OUT_MESSAGE: &str = "Took too long to be redirected to the localhost page.";

/// Status text after the session was cancelled through its shutdown handle.
pub const CANCELLED_MESSAGE: &str = "Listener was cancelled before a redirect arrived.";

/// Status text while the session is still waiting.
pub const PENDING_MESSAGE: &str = "Waiting for the redirect to reach the localhost page.";

/// Where a session stands.
///
/// Every variant except [`SessionStatus::Pending`] is terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    /// Still listening; nothing has stopped the session yet.
    Pending,
    /// A POST delivered a valid fragment map.
    Captured,
    /// A POST arrived but its payload was rejected.
    Malformed(ParseError),
    /// The deadline passed while no exchange was in progress.
    TimedOut,
    /// The session was cancelled by its owner.
    Cancelled,
}

impl SessionStatus {
    /// The fixed human-readable message for this status.
    pub fn message(&self) -> &'static str {
        match self {
            Self::Pending => PENDING_MESSAGE,
            Self::Captured => CAPTURED_MESSAGE,
            Self::Malformed(_) => MALFORMED_MESSAGE,
            Self::TimedOut => TIMED_OUT_MESSAGE,
            Self::Cancelled => CANCELLED_MESSAGE,
        }
    }

    /// Returns `true` for every status other than [`SessionStatus::Pending`].
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl Serialize for SessionStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.message())
    }
}

/// The single result value produced when a session ends.
///
/// `fragments` is `Some` only when `status` is [`SessionStatus::Captured`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionOutcome {
    /// The captured fragment parameters, if a valid POST arrived.
    pub fragments: Option<FragmentMap>,
    /// How the session ended.
    pub status: SessionStatus,
}

impl SessionOutcome {
    /// Shorthand for `self.status.message()`.
    pub fn message(&self) -> &'static str {
        self.status.message()
    }

    /// Returns `true` if fragment data was captured.
    pub fn is_captured(&self) -> bool {
        self.fragments.is_some()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
