//! One accepted connection, one exchange.
//!
//! [`ConnectionHandler::handle`] reads a single request and answers it:
//!
//! ```text
//! GET   → bootstrap page, close
//! POST  → read body, parse fragment, record result, confirmation text, close
//! other → close without a response
//! ```
//!
//! Each exchange has `exchange_timeout` to arrive.  A client that has not
//! finished its request line by then is dropped silently; a POST that is
//! still short of its declared body is parsed as it stands and answered.
//!
//! The handler is generic over the stream so tests can drive it with
//! `tokio_test::io::Builder` instead of real sockets.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use fragment_core::{extract_request_body, parse_request_body, StopTrigger};

use crate::domain::config::ListenerConfig;
use crate::domain::http::{
    classify_request_line, html_response, is_blank_line, request_is_complete, RequestKind,
    CAPTURED_BODY, REJECTED_BODY,
};

use super::page_payload::PagePayloadProvider;
use super::session_state::SharedSession;

/// Longest request line we are willing to buffer.
const MAX_REQUEST_LINE_BYTES: usize = 8 * 1024;

/// Upper bound on the GET header block we drain before answering.
const MAX_GET_HEADER_BYTES: usize = 64 * 1024;

const READ_CHUNK_BYTES: usize = 1024;

/// How one exchange ended, from the listener's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeOutcome {
    /// A GET was answered with the bootstrap page.
    PageServed,
    /// A POST parsed and stopped the session with a capture.
    Captured,
    /// A POST failed to parse and stopped the session.
    Rejected,
    /// A POST arrived after the session had already stopped.  The browser
    /// still got an answer; the session result did not change.
    Late,
    /// Anything else: unknown method, EOF, stalled client.  Nothing was sent.
    Noise,
}

/// What the read phase produced.
enum Request {
    Get,
    /// The whole raw POST, request line included.
    Post(Vec<u8>),
    Noise,
}

/// Serves exchanges for one session.  Cheap to share across connection tasks.
pub struct ConnectionHandler {
    session: Arc<SharedSession>,
    page: Arc<dyn PagePayloadProvider>,
    port: u16,
    exchange_timeout: Duration,
    max_request_bytes: usize,
}

impl ConnectionHandler {
    /// Creates a handler for a listener bound to `port`.
    pub fn new(
        session: Arc<SharedSession>,
        page: Arc<dyn PagePayloadProvider>,
        port: u16,
        config: &ListenerConfig,
    ) -> Self {
        Self {
            session,
            page,
            port,
            exchange_timeout: config.exchange_timeout,
            max_request_bytes: config.max_request_bytes,
        }
    }

    /// Handles exactly one request on `stream` and closes the write side.
    ///
    /// The caller is expected to hold an activity guard for the duration of
    /// this call.
    ///
    /// # Errors
    ///
    /// Returns an error only for I/O failures while reading the request or
    /// writing the response.  Protocol noise is `Ok(ExchangeOutcome::Noise)`.
    pub async fn handle<S>(&self, stream: S) -> anyhow::Result<ExchangeOutcome>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut stream = BufReader::new(stream);
        let deadline = Instant::now() + self.exchange_timeout;

        let request = self
            .read_request(&mut stream, deadline)
            .await
            .context("failed to read request")?;

        match request {
            Request::Noise => Ok(ExchangeOutcome::Noise),
            Request::Get => {
                let page = self.page.page(self.port);
                send_and_close(&mut stream, &html_response(&page))
                    .await
                    .context("failed to send bootstrap page")?;
                debug!("session {}: bootstrap page served", self.session.id());
                Ok(ExchangeOutcome::PageServed)
            }
            Request::Post(raw) => {
                let (outcome, body) = self.record_post(&raw);
                send_and_close(&mut stream, &html_response(body))
                    .await
                    .context("failed to send confirmation")?;
                Ok(outcome)
            }
        }
    }

    /// Parses a raw POST and hands the result to the session.
    ///
    /// The session is updated before any response bytes go out, so the
    /// result is fixed even if the browser disconnects mid-response.  The
    /// returned body reflects this POST's own parse, even when it was late.
    fn record_post(&self, raw: &[u8]) -> (ExchangeOutcome, &'static [u8]) {
        let id = self.session.id();
        let parsed = parse_request_body(extract_request_body(raw));

        let body = if parsed.is_ok() { CAPTURED_BODY } else { REJECTED_BODY };
        match &parsed {
            // Values are credentials; only key names are logged.
            Ok(map) => info!(
                "session {id}: received {} fragment parameter(s): {}",
                map.len(),
                map.keys().collect::<Vec<_>>().join(", ")
            ),
            Err(e) => warn!("session {id}: could not parse redirect fragment: {e}"),
        }

        let outcome = match self.session.record_post(parsed) {
            Some(StopTrigger::Captured) => ExchangeOutcome::Captured,
            Some(_) => ExchangeOutcome::Rejected,
            None => {
                debug!("session {id}: POST arrived after the session stopped; result ignored");
                ExchangeOutcome::Late
            }
        };
        (outcome, body)
    }

    async fn read_request<R>(&self, reader: &mut R, deadline: Instant) -> io::Result<Request>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut line = Vec::new();
        // A connection that has not said anything by the time the session
        // stops is not an exchange in progress.
        let request_line = read_line_bounded(reader, &mut line, MAX_REQUEST_LINE_BYTES);
        let n = tokio::select! {
            biased;
            read = timeout_at(deadline, request_line) => match read {
                Ok(read) => read?,
                Err(_) => {
                    self.log_stalled("request line");
                    return Ok(Request::Noise);
                }
            },
            () = self.session.stopped() => return Ok(Request::Noise),
        };
        if n == 0 {
            return Ok(Request::Noise);
        }

        let kind = classify_request_line(&String::from_utf8_lossy(&line));
        match kind {
            RequestKind::Get => match timeout_at(deadline, drain_headers(reader)).await {
                Ok(drained) => {
                    drained?;
                    Ok(Request::Get)
                }
                Err(_) => {
                    self.log_stalled("GET headers");
                    Ok(Request::Noise)
                }
            },
            RequestKind::Post => Ok(Request::Post(self.read_post(reader, line, deadline).await?)),
            RequestKind::Other => {
                debug!("session {}: ignoring non-GET/POST request", self.session.id());
                Ok(Request::Noise)
            }
        }
    }

    /// Reads the rest of a POST after its request line.
    ///
    /// Stops at the end of the declared body, at EOF, at `deadline`, or once
    /// `max_request_bytes` have been read past the request line.  Whatever
    /// arrived is returned; a POST is never dropped for being incomplete.
    async fn read_post<R>(
        &self,
        reader: &mut R,
        request_line: Vec<u8>,
        deadline: Instant,
    ) -> io::Result<Vec<u8>>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut raw = request_line;
        let start = raw.len();
        let mut chunk = [0u8; READ_CHUNK_BYTES];

        while !request_is_complete(&raw) {
            let room = self.max_request_bytes.saturating_sub(raw.len() - start);
            if room == 0 {
                debug!(
                    "session {}: POST exceeded {} bytes; parsing what arrived",
                    self.session.id(),
                    self.max_request_bytes
                );
                break;
            }
            let read = timeout_at(deadline, reader.read(&mut chunk[..room.min(READ_CHUNK_BYTES)]));
            let n = match read.await {
                Ok(read) => read?,
                Err(_) => {
                    debug!(
                        "session {}: POST incomplete after {:?}; parsing what arrived",
                        self.session.id(),
                        self.exchange_timeout
                    );
                    break;
                }
            };
            if n == 0 {
                break;
            }
            raw.extend_from_slice(&chunk[..n]);
        }
        Ok(raw)
    }

    fn log_stalled(&self, what: &str) {
        debug!(
            "session {}: no {what} within {:?}; dropping connection",
            self.session.id(),
            self.exchange_timeout
        );
    }
}

/// `read_until(b'\n')` that gives up after `limit` bytes.
async fn read_line_bounded<R>(reader: &mut R, buf: &mut Vec<u8>, limit: usize) -> io::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    (&mut *reader).take(limit as u64).read_until(b'\n', buf).await
}

async fn drain_headers<R>(reader: &mut R) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut remaining = MAX_GET_HEADER_BYTES;
    let mut line = Vec::new();
    while remaining > 0 {
        line.clear();
        let n = read_line_bounded(reader, &mut line, remaining).await?;
        if n == 0 || is_blank_line(&line) {
            break;
        }
        remaining -= n;
    }
    Ok(())
}

async fn send_and_close<W>(writer: &mut W, response: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(response).await?;
    writer.flush().await?;
    writer.shutdown().await
}

// ── Tests ─────────────────────────────────────────────────────────────────────
