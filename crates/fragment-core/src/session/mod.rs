//! Bookkeeping for a single listener session.
//!
//! A session starts listening, serves the bootstrap page, waits for the page
//! to POST the captured URL back, and then stops.  The rules for *when* it
//! stops live here as a plain state machine so they can be tested without a
//! network or an async runtime.
//!
//! # Lifecycle
//!
//! ```text
//!             begin_activity / end_activity (any number of times)
//!                      ↓
//! Running ──record_post / poll_deadline / cancel──→ Stopping ──last end_activity──→ Finished
//!    │                                                                               ↑
//!    └───────────── poll_deadline or cancel while idle ──────────────────────────────┘
//! ```
//!
//! - [`ledger`]: the mutable state machine ([`SessionLedger`]).
//! - [`outcome`]: the immutable result handed to the caller ([`SessionOutcome`]).

pub mod ledger;
pub mod outcome;

pub use ledger::{SessionLedger, StopTrigger};
pub use outcome::{SessionOutcome, SessionStatus};
