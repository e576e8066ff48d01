//! Listener configuration types.
//!
//! [`ListenerConfig`] is the single source of truth for all runtime settings
//! of one listener session.  It is a plain struct: the binary fills it from
//! CLI arguments and an optional TOML file, tests build it directly.

use std::time::Duration;

/// Host name the listener binds to.
///
/// The OAuth provider redirects to a pre-registered `http://localhost:<port>`
/// URL, so no other host is ever used.
pub const LISTEN_HOST: &str = "localhost";

/// All runtime configuration for a listener session.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use fragment_listener::domain::ListenerConfig;
///
/// let cfg = ListenerConfig::default();
/// assert_eq!(cfg.timeout, Duration::from_secs(120));
///
/// // Port 0 asks the OS for any free port (useful in tests).
/// let cfg = ListenerConfig::new(0, Duration::from_secs(1));
/// assert_eq!(cfg.port, 0);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerConfig {
    /// TCP port on `localhost`.
    ///
    /// Must match the redirect URL registered with the OAuth provider.  It is
    /// never substituted: if it cannot be bound, the session fails to start.
    pub port: u16,

    /// How long the session waits for the redirect before giving up.
    ///
    /// The deadline is measured from the moment the socket is bound.  An
    /// exchange still in progress at the deadline is allowed to finish.
    pub timeout: Duration,

    /// How often the timeout guard re-checks the deadline.
    ///
    /// The guard is also woken immediately on every session state change, so
    /// this only bounds how late a timeout can be detected.
    pub poll_interval: Duration,

    /// Maximum time one connection may take to deliver its request.
    ///
    /// A client that stalls longer is dropped without a response.
    pub exchange_timeout: Duration,

    /// Upper bound on the bytes read after the POST request line.
    ///
    /// A full redirect URL comfortably fits in the default.
    pub max_request_bytes: usize,
}

impl ListenerConfig {
    /// Builds a config with the given port and timeout and defaults for the rest.
    pub fn new(port: u16, timeout: Duration) -> Self {
        Self {
            port,
            timeout,
            ..Self::default()
        }
    }
}

impl Default for ListenerConfig {
    /// | Field             | Default     |
    /// |-------------------|-------------|
    /// | port              | `1000`      |
    /// | timeout           | 120 seconds |
    /// | poll_interval     | 1 second    |
    /// | exchange_timeout  | 10 seconds  |
    /// | max_request_bytes | 4096        |
    fn default() -> Self {
        Self {
            port: 1000,
            timeout: Duration::from_secs(120),
            poll_interval: Duration::from_secs(1),
            exchange_timeout: Duration::from_secs(10),
            max_request_bytes: 4096,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
