//! The listening socket and the session run loop.
//!
//! [`ListenerSession::bind`] claims the port and starts the deadline clock.
//! [`ListenerSession::run`] then drives two things concurrently until the
//! session is finished:
//!
//! ```text
//! ┌──────────────┐ begin_activity ┌───────────────────┐
//! │ accept loop  │───────────────>│ connection task   │──┐
//! └──────────────┘   (per conn)   │ ConnectionHandler │  │ record_post
//!                                 └───────────────────┘  ▼
//! ┌──────────────┐   poll / notify   ┌──────────────────────┐
//! │ TimeoutGuard │<─────────────────>│ SharedSession ledger │
//! └──────────────┘                   └──────────────────────┘
//! ```
//!
//! `localhost` is bound on every address it resolves to (normally both
//! `127.0.0.1` and `::1`) on one port, so no other process can answer the
//! redirect on the family we left open.
//!
//! When the guard returns, the accept loop is dropped with it and the sockets
//! are closed before the outcome is handed back.

use std::future::poll_fn;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::task::Poll;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::net::{lookup_host, TcpListener, TcpStream};
use tracing::{debug, error, info, info_span, warn, Instrument};

use fragment_core::SessionOutcome;

use crate::application::connection::ConnectionHandler;
use crate::application::page_payload::PagePayloadProvider;
use crate::application::session_state::{SharedSession, ShutdownHandle};
use crate::application::timeout_guard::TimeoutGuard;
use crate::domain::config::{ListenerConfig, LISTEN_HOST};

use super::page::BootstrapPage;

/// Pause after a failed `accept` so a persistent error cannot spin the loop.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// Errors that prevent a session from starting.  Nothing else is fatal.
#[derive(Debug, Error)]
pub enum StartupError {
    /// The port is taken or not permitted on one of the `localhost`
    /// addresses.  No other port is tried.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// The socket bound but its address could not be read back.
    #[error("failed to read the bound address: {0}")]
    LocalAddr(#[source] io::Error),

    /// The blocking entry point could not build its runtime.
    #[error("failed to build the async runtime: {0}")]
    Runtime(#[source] io::Error),
}

/// A bound, not yet running, single-use listener.
pub struct ListenerSession {
    listeners: Vec<TcpListener>,
    local_addrs: Vec<SocketAddr>,
    config: ListenerConfig,
    session: Arc<SharedSession>,
    page: Arc<dyn PagePayloadProvider>,
}

impl ListenerSession {
    /// Binds `localhost:<config.port>` and serves the default [`BootstrapPage`].
    ///
    /// # Errors
    ///
    /// Returns [`StartupError::Bind`] if the port cannot be bound.
    pub async fn bind(config: ListenerConfig) -> Result<Self, StartupError> {
        Self::bind_with_page(config, Arc::new(BootstrapPage)).await
    }

    /// Binds `localhost:<config.port>` and serves `page` on GET.
    ///
    /// The session deadline is `now + config.timeout`, fixed here.
    ///
    /// # Errors
    ///
    /// Returns [`StartupError::Bind`] if the port cannot be bound, or
    /// [`StartupError::LocalAddr`] if the bound address cannot be read.
    pub async fn bind_with_page(
        config: ListenerConfig,
        page: Arc<dyn PagePayloadProvider>,
    ) -> Result<Self, StartupError> {
        let listeners = bind_localhost(config.port).await?;
        let local_addrs = listeners
            .iter()
            .map(TcpListener::local_addr)
            .collect::<io::Result<Vec<_>>>()
            .map_err(StartupError::LocalAddr)?;
        let session = SharedSession::new(Instant::now() + config.timeout);

        info!(
            "session {}: listening on {local_addrs:?}, timeout {:?}",
            session.id(),
            config.timeout
        );

        Ok(Self {
            listeners,
            local_addrs,
            config,
            session,
            page,
        })
    }

    /// The first address bound, in resolver order.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addrs[0]
    }

    /// Every address bound.  All share one port.
    pub fn local_addrs(&self) -> &[SocketAddr] {
        &self.local_addrs
    }

    /// The port actually bound (differs from the configured one only for `0`).
    pub fn port(&self) -> u16 {
        self.local_addr().port()
    }

    /// The URL the browser should be redirected to.
    pub fn url(&self) -> String {
        format!("http://{LISTEN_HOST}:{}/", self.port())
    }

    /// A handle that can cancel this session from another task or thread.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle::new(Arc::clone(&self.session))
    }

    /// Serves connections until the session is finished, then closes the
    /// socket and returns the result.
    ///
    /// Never fails: every terminal state is encoded in the outcome.
    pub async fn run(self) -> SessionOutcome {
        let span = info_span!("fragment_session", id = %self.session.id());
        self.serve().instrument(span).await
    }

    async fn serve(self) -> SessionOutcome {
        let port = self.port();
        let Self {
            listeners,
            local_addrs,
            config,
            session,
            page,
        } = self;

        let handler = Arc::new(ConnectionHandler::new(Arc::clone(&session), page, port, &config));
        let guard = TimeoutGuard::new(Arc::clone(&session), config.poll_interval);

        tokio::select! {
            () = guard.run() => {}
            () = accept_loop(&listeners, &session, &handler) => {}
        }
        drop(listeners);

        let outcome = session.outcome();
        info!("listener on {local_addrs:?} closed: {}", outcome.status);
        outcome
    }
}

/// Binds `port` on every address `localhost` resolves to.
///
/// With port `0` the first address picks the port and the rest follow it; an
/// address that cannot take that port is then skipped, since the caller never
/// asked for it.  An address family the host does not support is always
/// skipped.  Any other failure is fatal.
async fn bind_localhost(port: u16) -> Result<Vec<TcpListener>, StartupError> {
    let bind_error = |source: io::Error| StartupError::Bind {
        addr: format!("{LISTEN_HOST}:{port}"),
        source,
    };

    let mut addrs: Vec<SocketAddr> = Vec::new();
    for addr in lookup_host((LISTEN_HOST, port)).await.map_err(bind_error)? {
        if !addrs.contains(&addr) {
            addrs.push(addr);
        }
    }

    let mut listeners: Vec<TcpListener> = Vec::new();
    let mut bound_port = port;
    let mut skipped = None;
    for mut addr in addrs {
        addr.set_port(bound_port);
        match TcpListener::bind(addr).await {
            Ok(listener) => {
                if listeners.is_empty() {
                    bound_port = listener.local_addr().map_err(StartupError::LocalAddr)?.port();
                }
                listeners.push(listener);
            }
            Err(e) if e.kind() == io::ErrorKind::AddrNotAvailable => {
                debug!("{addr} is not available on this host; skipping");
                skipped = Some(e);
            }
            Err(e) if port == 0 && !listeners.is_empty() && e.kind() == io::ErrorKind::AddrInUse => {
                debug!("{addr} is taken; serving the other localhost addresses only");
            }
            Err(e) => return Err(bind_error(e)),
        }
    }

    if listeners.is_empty() {
        let source = skipped.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::AddrNotAvailable, "localhost did not resolve")
        });
        return Err(bind_error(source));
    }
    Ok(listeners)
}

/// Waits for a connection on any of `listeners`.
async fn accept_any(listeners: &[TcpListener]) -> io::Result<(TcpStream, SocketAddr)> {
    poll_fn(|cx| {
        for listener in listeners {
            if let Poll::Ready(accepted) = listener.poll_accept(cx) {
                return Poll::Ready(accepted);
            }
        }
        Poll::Pending
    })
    .await
}

async fn accept_loop(
    listeners: &[TcpListener],
    session: &Arc<SharedSession>,
    handler: &Arc<ConnectionHandler>,
) {
    loop {
        match accept_any(listeners).await {
            Ok((stream, peer)) => {
                // Counted before the task is spawned so the guard never sees
                // an accepted connection as idle time.
                let activity = session.begin_activity();
                let handler = Arc::clone(handler);
                tokio::spawn(
                    async move {
                        let _activity = activity;
                        match handler.handle(stream).await {
                            Ok(outcome) => debug!("{peer}: {outcome:?}"),
                            Err(e) => warn!("{peer}: connection failed: {e:#}"),
                        }
                    }
                    .in_current_span(),
                );
            }
            Err(e) => {
                error!("accept error: {e}");
                tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
            }
        }
    }
}

/// Runs one session to completion on a private runtime.
///
/// Binds `localhost:<port>`, waits up to `timeout_secs` for the redirect
/// (longer only while an exchange is in progress), and returns the outcome.
/// Must not be called from inside an async runtime.
///
/// # Errors
///
/// Returns [`StartupError`] if the runtime cannot be built or the port
/// cannot be bound.  Timeouts and bad redirects are reported in the outcome.
pub fn start(timeout_secs: u64, port: u16) -> Result<SessionOutcome, StartupError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(StartupError::Runtime)?;
    let config = ListenerConfig::new(port, Duration::from_secs(timeout_secs));
    runtime.block_on(async {
        let listener = ListenerSession::bind(config).await?;
        Ok::<_, StartupError>(listener.run().await)
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
