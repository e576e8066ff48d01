//! Infrastructure layer for fragment-listener.
//!
//! Contains the OS-facing pieces: the TCP listener and its run loop, the
//! default bootstrap page, and the optional TOML config file.
//!
//! **Dependency rule**: this layer may depend on `application` and `domain`,
//! but MUST NOT be imported by either of them.

pub mod config_file;
pub mod listener;
pub mod page;

pub use config_file::{ConfigError, FileConfig};
pub use listener::{start, ListenerSession, StartupError};
pub use page::{BootstrapPage, StaticPage};
