//! Parser for the URL POSTed back by the bootstrap page.
//!
//! Input is the raw HTTP request body (or the whole buffered request); output
//! is a [`FragmentMap`] or a [`ParseError`] saying why the payload was
//! rejected.
//!
//! Parsing steps:
//! ```text
//! POST body:  http://localhost:1000/#access_token=abc&scope=chat%3Aread
//! fragment:   access_token=abc&scope=chat%3Aread        (text after the first '#')
//! segments:   ["access_token=abc", "scope=chat%3Aread"] (split on '&')
//! pairs:      split each segment on its first '=' and percent-decode both sides
//! ```
//!
//! Every function here is pure: no I/O, no allocation beyond the result.

use thiserror::Error;

use super::map::FragmentMap;

/// Separator between the HTTP header block and the body.
const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Reasons a POSTed URL could not be turned into a [`FragmentMap`].
///
/// Segment positions are zero-based.  Errors carry indices rather than segment
/// text so that a rejected payload never leaks a token into logs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The body is not valid UTF-8 text.
    #[error("request body is not valid UTF-8")]
    BodyNotUtf8,

    /// The URL has no `#`, or nothing follows it.
    #[error("URL has no fragment")]
    EmptyFragment,

    /// A segment has no `=` between key and value (e.g. a bare `token123`).
    #[error("fragment segment {index} is not a key=value pair")]
    MissingSeparator { index: usize },

    /// A `%` is not followed by two hexadecimal digits.
    #[error("fragment segment {index} contains a malformed percent-escape")]
    MalformedEscape { index: usize },

    /// Percent-decoding produced bytes that are not valid UTF-8.
    #[error("fragment segment {index} decodes to invalid UTF-8")]
    InvalidUtf8 { index: usize },
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Returns the body of a buffered HTTP request.
///
/// The buffer is split on the blank line that ends the header block and the
/// final piece is returned.  A buffer without any blank line is returned
/// unchanged, which is what a bare body (no headers) looks like.
pub fn extract_request_body(raw: &[u8]) -> &[u8] {
    match find_last(raw, HEADER_TERMINATOR) {
        Some(pos) => &raw[pos + HEADER_TERMINATOR.len()..],
        None => raw,
    }
}

/// Parses a full URL (as bytes) into its decoded fragment parameters.
///
/// Trailing whitespace (such as a stray CRLF after the body) is ignored.
///
/// # Errors
///
/// Returns [`ParseError::BodyNotUtf8`] if `body` is not UTF-8, and otherwise
/// whatever [`parse_fragment`] reports for the text after the first `#`.
///
/// # Example
///
/// ```rust
/// use fragment_core::parse_request_body;
///
/// let map = parse_request_body(b"http://localhost:1000/#access_token=abc&scope=chat%3Aread")
///     .unwrap();
/// assert_eq!(map.get("access_token"), Some("abc"));
/// assert_eq!(map.get("scope"), Some("chat:read"));
/// ```
pub fn parse_request_body(body: &[u8]) -> Result<FragmentMap, ParseError> {
    let text = std::str::from_utf8(body).map_err(|_| ParseError::BodyNotUtf8)?;
    let url = text.trim_end();

    // No '#' means the fragment is empty, which `parse_fragment` rejects.
    let fragment = url.split_once('#').map(|(_, f)| f).unwrap_or("");
    parse_fragment(fragment)
}

/// Parses fragment text (without the leading `#`) into a [`FragmentMap`].
///
/// Segments are separated by `&`; each must contain a `=`, and only the first
/// `=` splits key from value.  Keys and values are percent-decoded.  When a key
/// repeats, the last value wins.
///
/// # Errors
///
/// - [`ParseError::EmptyFragment`] for an empty string.
/// - [`ParseError::MissingSeparator`] for any segment without `=`, including
///   the empty segment left by a trailing `&`.
/// - [`ParseError::MalformedEscape`] / [`ParseError::InvalidUtf8`] when a key
///   or value cannot be percent-decoded.
pub fn parse_fragment(fragment: &str) -> Result<FragmentMap, ParseError> {
    if fragment.is_empty() {
        return Err(ParseError::EmptyFragment);
    }

    let mut map = FragmentMap::new();
    for (index, segment) in fragment.split('&').enumerate() {
        let (raw_key, raw_value) = segment
            .split_once('=')
            .ok_or(ParseError::MissingSeparator { index })?;
        let key = percent_decode(raw_key, index)?;
        let value = percent_decode(raw_value, index)?;
        map.insert(key, value);
    }
    Ok(map)
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Strictly percent-decodes one key or value.
///
/// `urlencoding::decode` passes malformed escapes through verbatim, so they
/// are rejected here first.  `+` is left as-is: fragments are not form data.
fn percent_decode(component: &str, index: usize) -> Result<String, ParseError> {
    let bytes = component.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let well_formed = bytes.len() > i + 2
                && bytes[i + 1].is_ascii_hexdigit()
                && bytes[i + 2].is_ascii_hexdigit();
            if !well_formed {
                return Err(ParseError::MalformedEscape { index });
            }
            i += 3;
        } else {
            i += 1;
        }
    }

    urlencoding::decode(component)
        .map(|decoded| decoded.into_owned())
        .map_err(|_| ParseError::InvalidUtf8 { index })
}

/// Position of the last occurrence of `needle` in `haystack`.
fn find_last(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).rposition(|w| w == needle)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
