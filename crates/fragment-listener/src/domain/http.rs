//! The minimal HTTP surface of the listener.
//!
//! Only two request shapes are understood:
//!
//! ```text
//! GET  <anything>   → 200, text/html, bootstrap page
//! POST <anything>   → 200, text/html, one of two fixed confirmation texts
//! ```
//!
//! Everything else is noise and gets no response at all.  Headers are never
//! interpreted beyond finding where they end and reading `Content-Length`.

/// Body sent to the browser after a POST that parsed.
pub const CAPTURED_BODY: &[u8] = b"Information has been retrieved. You can now close this page.";

/// Body sent to the browser after a POST that did not parse.
pub const REJECTED_BODY: &[u8] =
    b"Something went wrong. See application for detail\nYou can now close this page.";

/// Blank line separating the header block from the body.
pub const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// The same blank line from a client that ends lines with a bare LF.
pub const BARE_LF_HEADER_TERMINATOR: &[u8] = b"\n\n";

/// Which of the understood shapes a request line belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// The browser's first navigation to the redirect URL.
    Get,
    /// The bootstrap page reporting the captured URL.
    Post,
    /// Any other method, or garbage.
    Other,
}

/// Classifies a request line by its method token.
///
/// Path, query, and protocol version are ignored.
pub fn classify_request_line(line: &str) -> RequestKind {
    match line.split_whitespace().next() {
        Some("GET") => RequestKind::Get,
        Some("POST") => RequestKind::Post,
        _ => RequestKind::Other,
    }
}

/// Builds a complete `200 OK` HTML response carrying `body`.
pub fn html_response(body: &[u8]) -> Vec<u8> {
    let head = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );
    let mut response = Vec::with_capacity(head.len() + body.len());
    response.extend_from_slice(head.as_bytes());
    response.extend_from_slice(body);
    response
}

/// Returns `true` once `raw` (the request from its first line on) holds the
/// whole header block and, if a `Content-Length` was given, that many body
/// bytes.
pub fn request_is_complete(raw: &[u8]) -> bool {
    let Some((pos, terminator_len)) = header_end(raw) else {
        return false;
    };
    let body_len = raw.len() - pos - terminator_len;
    match content_length(&raw[..pos]) {
        Some(expected) => body_len >= expected,
        None => true,
    }
}

/// Finds the first blank line in `raw`, ended by CRLF or bare LF.
///
/// Returns its offset and length.
pub fn header_end(raw: &[u8]) -> Option<(usize, usize)> {
    [HEADER_TERMINATOR, BARE_LF_HEADER_TERMINATOR]
        .into_iter()
        .filter_map(|terminator| find(raw, terminator).map(|pos| (pos, terminator.len())))
        .min_by_key(|&(pos, _)| pos)
}

/// Extracts the `Content-Length` value from a header block, if present and
/// numeric.  Header names are matched case-insensitively.
pub fn content_length(headers: &[u8]) -> Option<usize> {
    let text = std::str::from_utf8(headers).ok()?;
    text.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        if name.trim().eq_ignore_ascii_case("content-length") {
            value.trim().parse().ok()
        } else {
            None
        }
    })
}

/// Returns `true` if `line` is the empty line ending a header block.
pub fn is_blank_line(line: &[u8]) -> bool {
    line == b"\r\n" || line == b"\n"
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
