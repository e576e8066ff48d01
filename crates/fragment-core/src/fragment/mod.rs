//! URL fragment handling.
//!
//! - [`map`]: the ordered key→value collection produced by a successful parse.
//! - [`parser`]: pure functions turning a POSTed request body into a
//!   [`map::FragmentMap`].

pub mod map;
pub mod parser;

pub use map::FragmentMap;
pub use parser::{extract_request_body, parse_fragment, parse_request_body, ParseError};
