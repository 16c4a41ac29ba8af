use serde::{Deserialize, Serialize};

/// Process-wide settings.
///
/// Loaded once from an optional YAML file, then patched by environment
/// overrides (see [`super::apply_env_overrides`]).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    /// ssh_config-style file supplying the host records
    #[serde(default = "default_hosts_file")]
    pub hosts_file: String,

    #[serde(default)]
    pub limits: LimitsConfig,

    #[serde(default)]
    pub pool: PoolSettings,

    #[serde(default)]
    pub host_keys: HostKeyConfig,

    #[serde(default)]
    pub policy: PolicyConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            hosts_file: default_hosts_file(),
            limits: LimitsConfig::default(),
            pool: PoolSettings::default(),
            host_keys: HostKeyConfig::default(),
            policy: PolicyConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

/// A named remote endpoint.
///
/// Supplied by the host registry and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostRecord {
    pub name: String,
    pub address: String,
    pub port: u16,
    pub user: String,
    /// Private key path; `None` means authenticate through the SSH agent
    pub identity_file: Option<String>,
}

impl HostRecord {
    /// Record with default port and user, agent authentication
    #[must_use]
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            port: DEFAULT_PORT,
            user: DEFAULT_USER.to_string(),
            identity_file: None,
        }
    }

    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    #[must_use]
    pub fn with_identity_file(mut self, path: impl Into<String>) -> Self {
        self.identity_file = Some(path.into());
        self
    }
}

pub const DEFAULT_PORT: u16 = 22;
pub const DEFAULT_USER: &str = "root";

/// Host key verification mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HostKeyVerification {
    /// Reject unknown hosts and mismatched keys
    #[default]
    Strict,
    /// Trust on first use: record unknown hosts, reject mismatched keys
    AcceptNew,
    /// Accept any key. Logged on every connection.
    Off,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct HostKeyConfig {
    #[serde(default)]
    pub verification: HostKeyVerification,

    /// Alternative `known_hosts` file (default: `~/.ssh/known_hosts`)
    #[serde(default)]
    pub known_hosts_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LimitsConfig {
    #[serde(default = "default_command_timeout")]
    pub command_timeout_seconds: u64,

    /// Maximum bytes returned when reading a file
    #[serde(default = "default_max_file_size")]
    pub max_file_size: usize,

    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_seconds: u64,

    #[serde(default = "default_keepalive")]
    pub keepalive_interval_seconds: u64,

    /// Total budget for a `hosts` reachability report
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    #[serde(default = "default_tree_max_depth")]
    pub tree_max_depth: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            command_timeout_seconds: default_command_timeout(),
            max_file_size: default_max_file_size(),
            connection_timeout_seconds: default_connection_timeout(),
            keepalive_interval_seconds: default_keepalive(),
            probe_timeout_ms: default_probe_timeout_ms(),
            tree_max_depth: default_tree_max_depth(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PoolSettings {
    /// Maximum number of pooled connections across all hosts
    #[serde(default = "default_pool_max_size")]
    pub max_size: usize,

    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u64,

    #[serde(default = "default_eviction_interval")]
    pub eviction_interval_seconds: u64,

    /// Upper bound on waiting for connections to close at shutdown
    #[serde(default = "default_close_timeout")]
    pub close_timeout_seconds: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_size: default_pool_max_size(),
            idle_timeout_seconds: default_idle_timeout(),
            eviction_interval_seconds: default_eviction_interval(),
            close_timeout_seconds: default_close_timeout(),
        }
    }
}

impl PoolSettings {
    /// Build the pool configuration, taking the connect timeout from `limits`
    #[must_use]
    pub fn pool_config(&self, limits: &LimitsConfig) -> crate::ssh::PoolConfig {
        crate::ssh::PoolConfig {
            max_size: self.max_size,
            idle_timeout_seconds: self.idle_timeout_seconds,
            eviction_interval_seconds: self.eviction_interval_seconds,
            connect_timeout_seconds: limits.connection_timeout_seconds,
            close_timeout_seconds: self.close_timeout_seconds,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyMode {
    /// Only the deny-list applies
    #[default]
    Permissive,
    /// Deny-list, then the command must match the allow-list
    Strict,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PolicyConfig {
    #[serde(default)]
    pub mode: PolicyMode,

    #[serde(default)]
    pub allow: Vec<String>,

    #[serde(default = "default_deny")]
    pub deny: Vec<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            mode: PolicyMode::default(),
            allow: Vec::new(),
            deny: default_deny(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_server_port")]
    pub port: u16,

    /// Requests handled at once per client stream
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_server_port(),
            max_concurrent_requests: default_max_concurrent_requests(),
        }
    }
}

fn default_hosts_file() -> String {
    "~/.ssh/config".to_string()
}

const fn default_command_timeout() -> u64 {
    30
}

const fn default_max_file_size() -> usize {
    1_000_000
}

const fn default_connection_timeout() -> u64 {
    10
}

const fn default_keepalive() -> u64 {
    30
}

const fn default_probe_timeout_ms() -> u64 {
    2000
}

const fn default_tree_max_depth() -> u32 {
    3
}

const fn default_pool_max_size() -> usize {
    10
}

const fn default_idle_timeout() -> u64 {
    300 // 5 minutes
}

const fn default_eviction_interval() -> u64 {
    60
}

const fn default_close_timeout() -> u64 {
    5
}

fn default_deny() -> Vec<String> {
    vec![
        r"^rm\s+(-[a-zA-Z]*[rf][a-zA-Z]*\s+)+/\s*$".to_string(),
        r"^mkfs(\.|\s)".to_string(),
        r"^dd\s+.*of=/dev/".to_string(),
        r"^(shutdown|reboot|halt|poweroff)\b".to_string(),
    ]
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

const fn default_server_port() -> u16 {
    8022
}

const fn default_max_concurrent_requests() -> usize {
    8
}
