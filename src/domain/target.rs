//! Request target parsing.
//!
//! Grammar: `hosts` (any case) or `<host>:<path>`. Only the first `:`
//! separates; the path may contain more.

use serde::Serialize;

use crate::error::ParseError;

/// What a request addresses
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Target {
    pub host: Option<String>,
    pub path: String,
    pub is_list_hosts: bool,
}

impl Target {
    fn list_hosts() -> Self {
        Self {
            host: None,
            path: String::new(),
            is_list_hosts: true,
        }
    }
}

/// Parse a raw target string.
///
/// # Errors
///
/// Returns a [`ParseError`] naming the missing piece.
///
/// # Examples
///
/// ```
/// use mcp_ssh_inspector::domain::parse_target;
///
/// let t = parse_target("db1:/var/log").unwrap();
/// assert_eq!(t.host.as_deref(), Some("db1"));
/// assert_eq!(t.path, "/var/log");
///
/// assert!(parse_target("HOSTS").unwrap().is_list_hosts);
/// ```
pub fn parse_target(raw: &str) -> Result<Target, ParseError> {
    let raw = raw.trim();

    if raw.is_empty() {
        return Err(ParseError::EmptyTarget);
    }

    if raw.eq_ignore_ascii_case("hosts") {
        return Ok(Target::list_hosts());
    }

    let (host, path) = raw.split_once(':').ok_or(ParseError::MissingSeparator)?;
    let host = host.trim();
    let path = path.trim();

    if host.is_empty() {
        return Err(ParseError::EmptyHost);
    }
    if path.is_empty() {
        return Err(ParseError::EmptyPath);
    }

    Ok(Target {
        host: Some(host.to_string()),
        path: path.to_string(),
        is_list_hosts: false,
    })
}
