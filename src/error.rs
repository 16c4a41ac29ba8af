use thiserror::Error;

/// Why a target string could not be parsed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty target")]
    EmptyTarget,

    #[error("missing separator")]
    MissingSeparator,

    #[error("empty host")]
    EmptyHost,

    #[error("empty path")]
    EmptyPath,
}

/// Why a path, command or host name was rejected before reaching a shell
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("path cannot be empty")]
    EmptyPath,

    #[error("input contains a null byte")]
    NullByte,

    #[error("path traversal not allowed: {path}")]
    PathTraversal { path: String },

    #[error("command cannot be empty")]
    EmptyCommand,

    #[error("malformed command: {reason}")]
    MalformedCommand { reason: String },

    #[error("command has too many tokens ({count}, max {max})")]
    TooManyTokens { count: usize, max: usize },

    #[error("command is too long ({len} bytes, max {max})")]
    CommandTooLong { len: usize, max: usize },

    #[error("host name cannot be empty")]
    EmptyHostName,

    #[error("host name is too long ({len} chars, max {max})")]
    HostNameTooLong { len: usize, max: usize },

    #[error("host name contains forbidden character {ch:?}")]
    InvalidHostName { ch: char },

    #[error("command denied: {reason}")]
    PolicyDenied { reason: String },
}

#[derive(Error, Debug)]
pub enum InspectError {
    // Request errors
    #[error("invalid target: {0}")]
    Parse(#[from] ParseError),

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("unknown host: {host}")]
    UnknownHost { host: String },

    // Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    #[error("configuration file not found: {path}")]
    ConfigNotFound { path: String },

    #[error("invalid configuration: {field} - {reason}")]
    ConfigInvalid { field: String, reason: String },

    // SSH errors
    #[error("connection to {host} failed: {cause}")]
    ConnectFailed { host: String, cause: String },

    #[error("connection to {host} lost: {reason}")]
    ConnectionLost { host: String, reason: String },

    #[error("host key mismatch for {host}: expected {expected}, got {actual}")]
    HostKeyMismatch {
        host: String,
        expected: String,
        actual: String,
    },

    #[error("host key unknown for {host} (fingerprint: {fingerprint})")]
    HostKeyUnknown { host: String, fingerprint: String },

    #[error("authentication failed for {user}@{host}")]
    Auth { user: String, host: String },

    #[error("remote operation failed: {reason}")]
    Exec { reason: String },

    #[error("connection pool exhausted (max {max})")]
    PoolExhausted { max: usize },

    #[error("connection pool is shut down")]
    PoolClosed,

    // IO and serialization errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_saphyr::Error),
}

impl InspectError {
    /// Whether the failure means the pooled connection is unusable.
    ///
    /// Only these failures are worth a remove-and-retry; everything else is
    /// either terminal (bad input) or a completed remote operation.
    #[must_use]
    pub const fn is_connection_failure(&self) -> bool {
        matches!(
            self,
            Self::ConnectFailed { .. } | Self::ConnectionLost { .. }
        )
    }

    /// Text safe to hand back to the calling agent.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Io(_) => "local I/O error".to_string(),
            Self::Json(_) => "malformed request".to_string(),
            Self::Yaml(_) => "configuration could not be parsed".to_string(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, InspectError>;
