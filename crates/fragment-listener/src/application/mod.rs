//! Application layer for fragment-listener.
//!
//! Knows *what* happens during a session and delegates *how* bytes reach the
//! network to the infrastructure layer.
//!
//! # Responsibilities
//!
//! - Sharing the session state machine between concurrent tasks
//!   ([`SharedSession`])
//! - Handling one connection's GET or POST exchange ([`ConnectionHandler`])
//! - Enforcing the inactivity-aware deadline ([`TimeoutGuard`])
//! - Defining the seam for the bootstrap page ([`PagePayloadProvider`])
//!
//! # What does NOT belong here?
//!
//! - Binding or accepting on sockets (that is infrastructure)
//! - The contents of the bootstrap page

pub mod connection;
pub mod page_payload;
pub mod session_state;
pub mod timeout_guard;

pub use connection::{ConnectionHandler, ExchangeOutcome};
pub use page_payload::PagePayloadProvider;
pub use session_state::{ActivityGuard, SharedSession, ShutdownHandle};
pub use timeout_guard::TimeoutGuard;
