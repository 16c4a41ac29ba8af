//! Input validation for paths, commands and host names.
//!
//! The executor only accepts [`ValidatedPath`] and [`ValidatedCommand`],
//! which can only be built here.

use std::fmt;

use crate::error::ValidationError;

/// Maximum number of tokens in a command
pub const MAX_COMMAND_TOKENS: usize = 256;

/// Maximum command length in bytes
pub const MAX_COMMAND_BYTES: usize = 8192;

/// Maximum host name length in characters
pub const MAX_HOST_NAME_LEN: usize = 253;

const HOST_NAME_FORBIDDEN: &[char] = &[
    '/', '\\', ';', '&', '|', '$', '`', '<', '>', '(', ')', '{', '}', '[', ']', '*', '?', '!',
    '\'', '"', '~', '#', '^', ',', ':',
];

/// A path that passed [`validate_path`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ValidatedPath(String);

impl ValidatedPath {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ValidatedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ValidatedPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A tokenized command that passed [`validate_command`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedCommand(Vec<String>);

impl ValidatedCommand {
    #[must_use]
    pub fn tokens(&self) -> &[String] {
        &self.0
    }

    /// Program name (first token)
    #[must_use]
    pub fn program(&self) -> &str {
        // Never empty: validate_command rejects empty token lists
        self.0.first().map_or("", String::as_str)
    }

    /// Tokens joined by single spaces. For display and policy matching only,
    /// never for execution.
    #[must_use]
    pub fn display_line(&self) -> String {
        self.0.join(" ")
    }
}

/// Validate and normalize a remote path.
///
/// `..` is rejected as a component anywhere. Other paths are normalized
/// POSIX-style; paths starting with `~` pass through unchanged so the remote
/// side can expand them. Only `~`, `~/…` and `~user/…` with a portable user
/// name are expanded there (see [`quote_path`](crate::domain::shell::quote_path));
/// any other `~` prefix is a literal name.
///
/// # Errors
///
/// Returns a [`ValidationError`] for empty paths, NUL bytes or traversal.
///
/// # Examples
///
/// ```
/// use mcp_ssh_inspector::security::validate_path;
///
/// assert_eq!(validate_path("/var//log/./").unwrap().as_str(), "/var/log");
/// assert!(validate_path("/var/../etc").is_err());
/// ```
pub fn validate_path(raw: &str) -> Result<ValidatedPath, ValidationError> {
    if raw.is_empty() {
        return Err(ValidationError::EmptyPath);
    }
    if raw.contains('\0') {
        return Err(ValidationError::NullByte);
    }
    if raw.split('/').any(|component| component == "..") {
        return Err(traversal(raw));
    }

    if raw.starts_with('~') {
        return Ok(ValidatedPath(raw.to_string()));
    }

    let normalized = normalize(raw);
    if normalized == ".." || normalized.starts_with("../") {
        return Err(traversal(raw));
    }

    Ok(ValidatedPath(normalized))
}

fn traversal(raw: &str) -> ValidationError {
    ValidationError::PathTraversal {
        path: raw.to_string(),
    }
}

/// Collapse separators, drop `.` components and trailing separators
fn normalize(path: &str) -> String {
    let absolute = path.starts_with('/');
    let components: Vec<&str> = path
        .split('/')
        .filter(|c| !c.is_empty() && *c != ".")
        .collect();
    let joined = components.join("/");

    match (absolute, joined.is_empty()) {
        (true, _) => format!("/{joined}"),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// Tokenize and bound a command string.
///
/// Quotes and escapes follow shell word-splitting rules. The result is not
/// safe to concatenate as-is; the executor quotes every token.
///
/// # Errors
///
/// Returns a [`ValidationError`] for empty, oversized or malformed input.
pub fn validate_command(raw: &str) -> Result<ValidatedCommand, ValidationError> {
    if raw.len() > MAX_COMMAND_BYTES {
        return Err(ValidationError::CommandTooLong {
            len: raw.len(),
            max: MAX_COMMAND_BYTES,
        });
    }
    if raw.contains('\0') {
        return Err(ValidationError::NullByte);
    }

    let tokens = shell_words::split(raw).map_err(|e| ValidationError::MalformedCommand {
        reason: e.to_string(),
    })?;

    if tokens.is_empty() {
        return Err(ValidationError::EmptyCommand);
    }
    if tokens.len() > MAX_COMMAND_TOKENS {
        return Err(ValidationError::TooManyTokens {
            count: tokens.len(),
            max: MAX_COMMAND_TOKENS,
        });
    }

    Ok(ValidatedCommand(tokens))
}

/// Validate a host name before registry lookup.
///
/// # Errors
///
/// Returns a [`ValidationError`] for empty, overlong or unsafe names.
pub fn validate_host_name(raw: &str) -> Result<&str, ValidationError> {
    if raw.is_empty() {
        return Err(ValidationError::EmptyHostName);
    }

    let len = raw.chars().count();
    if len > MAX_HOST_NAME_LEN {
        return Err(ValidationError::HostNameTooLong {
            len,
            max: MAX_HOST_NAME_LEN,
        });
    }

    if let Some(ch) = raw
        .chars()
        .find(|c| c.is_whitespace() || c.is_control() || HOST_NAME_FORBIDDEN.contains(c))
    {
        return Err(ValidationError::InvalidHostName { ch });
    }

    Ok(raw)
}
