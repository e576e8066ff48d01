//! Domain layer for fragment-listener.
//!
//! Pure types with no dependencies on I/O, sockets, or the async runtime.
//!
//! # What belongs in the domain layer?
//!
//! - Listener configuration
//! - The two HTTP request shapes the listener understands and the fixed
//!   responses it sends back
//!
//! # What does NOT belong here?
//!
//! - Any `tokio`, `TcpStream`, or `TcpListener` types
//! - File I/O or environment variable reading

pub mod config;
pub mod http;

pub use config::ListenerConfig;
pub use http::{classify_request_line, RequestKind};
