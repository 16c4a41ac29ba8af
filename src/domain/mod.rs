//! Domain module - pure request handling logic
//!
//! Target parsing, shell quoting and output truncation. Nothing here
//! touches the network.

pub mod shell;
pub mod target;
pub mod truncate;

pub use target::{Target, parse_target};
pub use truncate::{floor_char_boundary, truncate_utf8};
