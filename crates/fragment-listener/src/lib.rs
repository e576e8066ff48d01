//! fragment-listener library crate.
//!
//! A single-use `localhost` HTTP listener that captures the fragment of an
//! OAuth implicit-grant redirect and hands it back to the calling program.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Browser
//!   │ GET /            → bootstrap page
//!   │ POST <full URL>  → confirmation text
//!   ▼
//! [fragment-listener]
//!   ├── domain/           ListenerConfig, the fixed HTTP shapes
//!   ├── application/      SharedSession, ConnectionHandler, TimeoutGuard
//!   └── infrastructure/
//!         ├── listener/   TcpListener, accept loop, blocking `start`
//!         ├── page/       Default bootstrap page
//!         └── config_file/ Optional TOML config for the binary
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O and no async.
//! - `application` depends on `domain` and `fragment-core`, and is generic
//!   over the byte stream so it can be tested without sockets.
//! - `infrastructure` depends on all other layers plus `tokio::net`.
//!
//! # Example
//!
//! ```no_run
//! let outcome = fragment_listener::start(120, 1000)?;
//! match outcome.fragments {
//!     Some(map) => println!("token: {:?}", map.get("access_token")),
//!     None => eprintln!("{}", outcome.status),
//! }
//! # Ok::<(), fragment_listener::StartupError>(())
//! ```

/// Domain layer: configuration and HTTP constants (no I/O).
pub mod domain;

/// Application layer: session state, per-connection handling, timeout guard.
pub mod application;

/// Infrastructure layer: sockets, default page, config file.
pub mod infrastructure;

pub use application::{PagePayloadProvider, ShutdownHandle};
pub use domain::ListenerConfig;
pub use fragment_core::{FragmentMap, ParseError, SessionOutcome, SessionStatus};
pub use infrastructure::{start, BootstrapPage, ListenerSession, StartupError, StaticPage};
