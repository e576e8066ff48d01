//! Integration tests for a full listener session over real loopback sockets.
//!
//! # Purpose
//!
//! These tests drive `ListenerSession` the way a browser would: a GET for the
//! bootstrap page, then a POST carrying the full redirect URL.  They verify
//! the three ways a session ends (capture, timeout, cancellation), that noise
//! and slow clients are handled, and that the port is released afterwards.
//!
//! Every test binds port 0 so the OS picks a free port, and uses a short poll
//! interval so deadlines are noticed quickly.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use fragment_listener::domain::http::{CAPTURED_BODY, REJECTED_BODY};
use fragment_listener::{
    ListenerConfig, ListenerSession, ParseError, SessionOutcome, SessionStatus, StartupError,
    StaticPage,
};

// ── Helpers ───────────────────────────────────────────────────────────────────

const PAGE: &[u8] = b"<html><body><p id=\"msg\">Retrieving token.</p></body></html>";

fn fast_config(timeout: Duration) -> ListenerConfig {
    ListenerConfig {
        port: 0,
        timeout,
        poll_interval: Duration::from_millis(20),
        exchange_timeout: Duration::from_secs(5),
        max_request_bytes: 4096,
    }
}

async fn bind(config: ListenerConfig) -> ListenerSession {
    ListenerSession::bind_with_page(config, Arc::new(StaticPage(PAGE.to_vec())))
        .await
        .expect("bind on an ephemeral port")
}

fn post_request(url: &str) -> Vec<u8> {
    format!(
        "POST / HTTP/1.1\r\nHost: localhost\r\nContent-Type: text/plain;charset=UTF-8\r\nContent-Length: {}\r\n\r\n{url}",
        url.len()
    )
    .into_bytes()
}

/// Sends `request` and returns everything the server wrote before closing.
async fn exchange(addr: SocketAddr, request: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.expect("connect");
    stream.write_all(request).await.expect("write request");
    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.expect("read response");
    response
}

/// Splits a response into its header block and body.
fn split_response(response: &[u8]) -> (String, Vec<u8>) {
    let pos = response
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("response has a header terminator");
    (
        String::from_utf8_lossy(&response[..pos]).into_owned(),
        response[pos + 4..].to_vec(),
    )
}

async fn finish(run: tokio::task::JoinHandle<SessionOutcome>) -> SessionOutcome {
    tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("session must finish")
        .expect("session task must not panic")
}

// ── Shutdown conditions ───────────────────────────────────────────────────────

/// With nobody connecting, the blocking entry point returns after about the
/// configured timeout with no data and the timeout message.
#[test]
fn test_timeout_without_connection_returns_timeout_status() {
    // Arrange
    let started = Instant::now();

    // Act
    let outcome = fragment_listener::start(1, 0).expect("start on an ephemeral port");

    // Assert
    let elapsed = started.elapsed();
    assert!(outcome.fragments.is_none());
    assert_eq!(outcome.status, SessionStatus::TimedOut);
    assert_eq!(
        outcome.message(),
        "Took too long to be redirected to the localhost page."
    );
    assert!(elapsed >= Duration::from_secs(1), "finished early: {elapsed:?}");
    assert!(elapsed < Duration::from_secs(4), "finished late: {elapsed:?}");
}

/// The browser flow: GET serves the page unmodified, POST captures the
/// decoded fragment, and the session ends with the success status.
#[tokio::test]
async fn test_end_to_end_capture() {
    // Arrange
    let session = bind(fast_config(Duration::from_secs(30))).await;
    let addr = session.local_addr();
    let port = session.port();
    let run = tokio::spawn(session.run());

    // Act: GET
    let get_response = exchange(addr, b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n").await;

    // Assert: the page is served byte for byte
    let (head, body) = split_response(&get_response);
    assert!(head.starts_with("HTTP/1.1 200 OK"));
    assert!(head.contains("Content-Type: text/html"));
    assert_eq!(body, PAGE);

    // Act: POST
    let url = format!("http://localhost:{port}/#access_token=abc&scope=chat%3Aread");
    let post_response = exchange(addr, &post_request(&url)).await;
    let outcome = finish(run).await;

    // Assert
    let (_, body) = split_response(&post_response);
    assert_eq!(body, CAPTURED_BODY);
    assert_eq!(outcome.status, SessionStatus::Captured);
    assert_eq!(outcome.message(), "Successfully obtained url fragments");
    let fragments = outcome.fragments.expect("fragments captured");
    assert_eq!(fragments.len(), 2);
    assert_eq!(fragments.get("access_token"), Some("abc"));
    assert_eq!(fragments.get("scope"), Some("chat:read"));
}

/// A POST whose fragment cannot be parsed still ends the session, with the
/// failure message and no data.
#[tokio::test]
async fn test_malformed_post_ends_session_with_failure() {
    // Arrange
    let session = bind(fast_config(Duration::from_secs(30))).await;
    let addr = session.local_addr();
    let run = tokio::spawn(session.run());

    // Act
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(&post_request("http://localhost/#access_token"))
        .await
        .unwrap();
    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    let outcome = finish(run).await;

    // Assert
    let (_, body) = split_response(&response);
    assert_eq!(body, REJECTED_BODY);
    assert!(outcome.fragments.is_none());
    assert_eq!(
        outcome.status,
        SessionStatus::Malformed(ParseError::MissingSeparator { index: 0 })
    );
    assert_eq!(
        outcome.message(),
        "Something went wrong when retrieving the url fragments"
    );
}

/// Cancelling through the handle ends an idle session long before its
/// deadline.
#[tokio::test]
async fn test_shutdown_handle_cancels_running_session() {
    // Arrange
    let session = bind(fast_config(Duration::from_secs(120))).await;
    let handle = session.shutdown_handle();
    let run = tokio::spawn(session.run());

    // Act
    tokio::time::sleep(Duration::from_millis(100)).await;
    let cancelled = handle.cancel();
    let outcome = finish(run).await;

    // Assert
    assert!(cancelled);
    assert!(outcome.fragments.is_none());
    assert_eq!(outcome.status, SessionStatus::Cancelled);
}

// ── Activity and noise ────────────────────────────────────────────────────────

/// A POST that is still arriving when the deadline passes is completed, and
/// its capture wins over the timeout.
#[tokio::test]
async fn test_in_flight_post_outlives_deadline() {
    // Arrange: the deadline is shorter than the client's pause.
    let session = bind(fast_config(Duration::from_millis(300))).await;
    let addr = session.local_addr();
    let run = tokio::spawn(session.run());
    let url = "http://localhost/#access_token=late";
    let head = format!("POST / HTTP/1.1\r\nContent-Length: {}\r\n\r\n", url.len());

    // Act
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(head.as_bytes()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(800)).await;
    stream.write_all(url.as_bytes()).await.unwrap();
    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    let outcome = finish(run).await;

    // Assert
    let (_, body) = split_response(&response);
    assert_eq!(body, CAPTURED_BODY);
    assert_eq!(outcome.status, SessionStatus::Captured);
    assert_eq!(
        outcome.fragments.unwrap().get("access_token"),
        Some("late")
    );
}

/// A client that connects and never finishes its request cannot keep the
/// session open past its deadline plus the per-exchange timeout.
#[tokio::test]
async fn test_stalled_client_cannot_pin_session_open() {
    // Arrange
    let config = ListenerConfig {
        exchange_timeout: Duration::from_millis(300),
        ..fast_config(Duration::from_millis(200))
    };
    let session = bind(config).await;
    let addr = session.local_addr();
    let started = Instant::now();
    let run = tokio::spawn(session.run());

    // Act: send half a request line and go quiet.
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(b"POST / HT").await.unwrap();
    let outcome = finish(run).await;

    // Assert
    assert_eq!(outcome.status, SessionStatus::TimedOut);
    assert!(started.elapsed() < Duration::from_secs(3));
    drop(stream);
}

/// A client that ends its header lines with a bare LF is still answered and
/// its fragment captured.
#[tokio::test]
async fn test_bare_lf_post_captures() {
    // Arrange
    let session = bind(fast_config(Duration::from_secs(30))).await;
    let addr = session.local_addr();
    let run = tokio::spawn(session.run());

    // Act
    let response = exchange(
        addr,
        b"POST / HTTP/1.1\nContent-Length: 21\n\nhttp://localhost/#a=1",
    )
    .await;
    let outcome = finish(run).await;

    // Assert
    let (_, body) = split_response(&response);
    assert_eq!(body, CAPTURED_BODY);
    assert_eq!(outcome.status, SessionStatus::Captured);
    assert_eq!(outcome.fragments.unwrap().get("a"), Some("1"));
}

/// A POST that never delivers its declared `Content-Length` is parsed as it
/// stands once the exchange timeout passes, answered, and ends the session.
#[tokio::test]
async fn test_short_post_body_answered_after_exchange_timeout() {
    // Arrange
    let config = ListenerConfig {
        exchange_timeout: Duration::from_millis(300),
        ..fast_config(Duration::from_secs(30))
    };
    let session = bind(config).await;
    let addr = session.local_addr();
    let run = tokio::spawn(session.run());

    // Act: keep the connection open so only the timeout can end the read.
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"POST / HTTP/1.1\r\nContent-Length: 500\r\n\r\nhttp://localhost/#a=1")
        .await
        .unwrap();
    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    let outcome = finish(run).await;

    // Assert
    let (_, body) = split_response(&response);
    assert_eq!(body, CAPTURED_BODY);
    assert_eq!(outcome.status, SessionStatus::Captured);
    assert_eq!(outcome.fragments.unwrap().get("a"), Some("1"));
}

/// Unknown methods and empty connections get no response and do not end
/// the session; the real POST that follows still captures.
#[tokio::test]
async fn test_noise_connections_are_ignored() {
    // Arrange
    let session = bind(fast_config(Duration::from_secs(30))).await;
    let addr = session.local_addr();
    let run = tokio::spawn(session.run());

    // Act: unknown method
    let put_response = exchange(addr, b"PUT / HTTP/1.1\r\nContent-Length: 0\r\n\r\n").await;

    // Act: connect and hang up without sending anything
    drop(TcpStream::connect(addr).await.unwrap());

    // Act: the real POST
    let post_response = exchange(addr, &post_request("http://localhost/#a=1")).await;
    let outcome = finish(run).await;

    // Assert
    assert!(put_response.is_empty());
    let (_, body) = split_response(&post_response);
    assert_eq!(body, CAPTURED_BODY);
    assert_eq!(outcome.status, SessionStatus::Captured);
}

// ── Socket lifecycle ──────────────────────────────────────────────────────────

/// After the session finishes, the port no longer accepts connections.
#[tokio::test]
async fn test_socket_closed_after_session() {
    // Arrange
    let session = bind(fast_config(Duration::from_millis(100))).await;
    let addr = session.local_addr();

    // Act
    let outcome = finish(tokio::spawn(session.run())).await;

    // Assert
    assert_eq!(outcome.status, SessionStatus::TimedOut);
    assert!(TcpStream::connect(addr).await.is_err());
}

/// Binding a port that is already in use fails immediately with a startup
/// error instead of falling back to another port.
#[tokio::test]
async fn test_bind_conflict_is_startup_error() {
    // Arrange: occupy the port on every address `localhost` resolves to.
    let (port, _held) = occupy_localhost_port();

    // Act
    let result = ListenerSession::bind(ListenerConfig::new(port, Duration::from_secs(1))).await;

    // Assert
    match result {
        Err(StartupError::Bind { addr, .. }) => assert_eq!(addr, format!("localhost:{port}")),
        Err(other) => panic!("expected a bind error, got {other}"),
        Ok(_) => panic!("bind must fail on an occupied port"),
    }
}

/// A port held on just one of the `localhost` addresses still fails the
/// bind, so the redirect cannot reach another process on that family.
#[tokio::test]
async fn test_port_held_on_other_loopback_family_is_startup_error() {
    // Arrange: keep every address except the first one resolved.
    let (port, mut held) = occupy_localhost_port();
    if held.len() < 2 {
        // `localhost` resolves to a single address here.
        return;
    }
    drop(held.remove(0));

    // Act
    let result = ListenerSession::bind(ListenerConfig::new(port, Duration::from_secs(1))).await;

    // Assert
    assert!(matches!(result, Err(StartupError::Bind { .. })));
}

fn occupy_localhost_port() -> (u16, Vec<std::net::TcpListener>) {
    use std::net::ToSocketAddrs;

    let first = std::net::TcpListener::bind(("localhost", 0)).expect("bind ephemeral port");
    let port = first.local_addr().unwrap().port();
    let mut held = vec![first];
    for addr in ("localhost", port).to_socket_addrs().unwrap() {
        // The address already bound above fails here; that is fine.
        if let Ok(listener) = std::net::TcpListener::bind(addr) {
            held.push(listener);
        }
    }
    (port, held)
}
