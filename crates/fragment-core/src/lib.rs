//! # fragment-core
//!
//! Shared library for the localhost fragment listener containing the URL
//! fragment parser and the bookkeeping model for a single listener session.
//!
//! This crate has zero dependencies on sockets, async runtimes, or OS APIs.
//!
//! # Architecture overview (for beginners)
//!
//! Some OAuth providers (the "implicit grant" flow) hand the access token back
//! in the *fragment* of the redirect URL:
//!
//! ```text
//! http://localhost:1000/#access_token=abc&scope=chat%3Aread
//!                       └──────── fragment ──────────────┘
//! ```
//!
//! Browsers never send the fragment to a server, so a tiny page served on
//! `localhost` reads its own address and POSTs it back.  This crate contains
//! the pieces of that flow that need no I/O:
//!
//! - **`fragment`** – Turns the POSTed URL into an ordered key→value map
//!   ([`FragmentMap`]), or a typed [`ParseError`].
//!
//! - **`session`** – The state machine for one listener run.  It decides when
//!   the session stops, records the captured map at most once, and produces
//!   the immutable [`SessionOutcome`] handed to the caller.

pub mod fragment;
pub mod session;

// Re-export the most-used types at the crate root so callers can write
// `fragment_core::FragmentMap` instead of `fragment_core::fragment::map::FragmentMap`.
pub use fragment::map::FragmentMap;
pub use fragment::parser::{extract_request_body, parse_fragment, parse_request_body, ParseError};
pub use session::ledger::{SessionLedger, StopTrigger};
pub use session::outcome::{SessionOutcome, SessionStatus};
