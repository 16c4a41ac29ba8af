//! Request orchestration.
//!
//! A request goes through target parsing, host lookup and validation, then
//! a pooled connection runs the operation. Connection-level failures get one
//! remove-and-retry; everything else is final.

use std::fmt::Write as _;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{HostRecord, HostRegistry, LimitsConfig, Settings};
use crate::domain::floor_char_boundary;
use crate::domain::parse_target;
use crate::error::{InspectError, Result};
use crate::ports::SshConnector;
use crate::security::{
    CommandPolicy, ValidatedCommand, ValidatedPath, validate_command, validate_host_name,
    validate_path,
};
use crate::ssh::{
    CommandResult, ConnectionPool, PathKind, list_directory, probe_many, read_file,
    render_listing, run_command, stat_path, tree_directory,
};

/// One tool call
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ToolRequest {
    /// `hosts` or `<host>:<path>`
    pub target: String,

    /// Command to run with `path` as working directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    /// Render directories as a tree instead of a listing
    #[serde(default)]
    pub tree: bool,
}

impl ToolRequest {
    #[must_use]
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    #[must_use]
    pub const fn with_tree(mut self, tree: bool) -> Self {
        self.tree = tree;
        self
    }
}

/// Rendered answer to a tool call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResponse {
    pub text: String,
    pub is_error: bool,
}

impl ToolResponse {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    #[must_use]
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
        }
    }
}

/// Ties the registry, policy and pool together behind [`Inspector::handle`]
pub struct Inspector<C: SshConnector> {
    registry: HostRegistry,
    pool: Arc<ConnectionPool<C>>,
    policy: CommandPolicy,
    limits: LimitsConfig,
}

impl<C: SshConnector> Inspector<C> {
    #[must_use]
    pub const fn new(
        registry: HostRegistry,
        pool: Arc<ConnectionPool<C>>,
        policy: CommandPolicy,
        limits: LimitsConfig,
    ) -> Self {
        Self {
            registry,
            pool,
            policy,
            limits,
        }
    }

    /// Build everything from loaded settings. The eviction task is not
    /// started; call `pool().start_eviction()` inside a runtime.
    #[must_use]
    pub fn from_settings(settings: &Settings, connector: C) -> Self {
        let pool = ConnectionPool::new(connector, settings.pool.pool_config(&settings.limits));
        Self::new(
            HostRegistry::from_file(&settings.hosts_file),
            Arc::new(pool),
            CommandPolicy::new(&settings.policy),
            settings.limits.clone(),
        )
    }

    #[must_use]
    pub const fn pool(&self) -> &Arc<ConnectionPool<C>> {
        &self.pool
    }

    #[must_use]
    pub const fn registry(&self) -> &HostRegistry {
        &self.registry
    }

    /// Answer a tool call. Never fails: errors become `is_error` text with
    /// no credential material, the detail goes to the log.
    pub async fn handle(&self, request: &ToolRequest) -> ToolResponse {
        match self.dispatch(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(request_target = %request.target, error = %e, "Request failed");
                ToolResponse::error(e.user_message())
            }
        }
    }

    async fn dispatch(&self, request: &ToolRequest) -> Result<ToolResponse> {
        let target = parse_target(&request.target)?;
        self.registry.load().await;
        if target.is_list_hosts {
            return Ok(ToolResponse::text(self.host_report().await));
        }

        let host_name = validate_host_name(target.host.as_deref().unwrap_or_default())?;
        let host = self
            .registry
            .get(host_name)
            .ok_or_else(|| InspectError::UnknownHost {
                host: host_name.to_string(),
            })?;
        let path = validate_path(&target.path)?;

        match &request.command {
            Some(raw) => {
                let command = validate_command(raw)?;
                self.policy.check(&command)?;
                self.execute(host, &path, &command).await
            }
            None => self.inspect_path(host, &path, request.tree).await,
        }
    }

    /// Run `op` on a pooled connection. A connection-level failure removes
    /// the pooled entry and runs the whole acquire-and-operate once more.
    async fn with_retry<T, F, Fut>(&self, host: &HostRecord, op: F) -> Result<T>
    where
        F: Fn(Arc<C::Session>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let first = match self.pool.acquire(host).await {
            Ok(conn) => op(conn).await,
            Err(e) => Err(e),
        };

        match first {
            Err(e) if e.is_connection_failure() => {
                warn!(host = %host.name, error = %e, "Connection failure, retrying once");
                self.pool.remove(&host.name).await;
                let conn = self.pool.acquire(host).await?;
                op(conn).await
            }
            other => other,
        }
    }

    async fn execute(
        &self,
        host: &HostRecord,
        path: &ValidatedPath,
        command: &ValidatedCommand,
    ) -> Result<ToolResponse> {
        let timeout_secs = self.limits.command_timeout_seconds;
        info!(host = %host.name, program = %command.program(), cwd = %path, "Executing command");

        let result = self
            .with_retry(host, |conn| async move {
                run_command(conn.as_ref(), path, command, timeout_secs).await
            })
            .await?;

        Ok(render_command(&result, timeout_secs, self.limits.max_file_size))
    }

    async fn inspect_path(
        &self,
        host: &HostRecord,
        path: &ValidatedPath,
        tree: bool,
    ) -> Result<ToolResponse> {
        let max_bytes = self.limits.max_file_size;
        let depth = self.limits.tree_max_depth;

        self.with_retry(host, |conn| async move {
            let conn = conn.as_ref();
            let response = match stat_path(conn, path).await? {
                PathKind::File => {
                    let file = read_file(conn, path, max_bytes).await?;
                    let mut text = file.content;
                    if file.was_truncated {
                        let _ = write!(text, "\n[truncated at {max_bytes} bytes]");
                    }
                    ToolResponse::text(text)
                }
                PathKind::Directory if tree => {
                    ToolResponse::text(tree_directory(conn, path, depth).await?)
                }
                PathKind::Directory => {
                    let entries = list_directory(conn, path).await?;
                    ToolResponse::text(render_listing(path, &entries))
                }
                PathKind::Absent => ToolResponse::error(format!("path not found: {path}")),
            };
            Ok(response)
        })
        .await
    }

    /// Every configured host with its TCP reachability
    pub async fn host_report(&self) -> String {
        self.registry.load().await;
        let hosts = self.registry.all();
        if hosts.is_empty() {
            return "no hosts configured".to_string();
        }

        let budget = Duration::from_millis(self.limits.probe_timeout_ms);
        let reachable = probe_many(hosts.iter().copied(), budget).await;

        let name_width = hosts.iter().map(|h| h.name.len()).max().unwrap_or(0);
        let mut out = format!("{} hosts configured", hosts.len());
        for host in hosts {
            let endpoint = format!("{}@{}:{}", host.user, host.address, host.port);
            let status = if reachable.get(&host.name).copied().unwrap_or(false) {
                "reachable"
            } else {
                "unreachable"
            };
            let _ = write!(out, "\n{:<name_width$}  {endpoint}  {status}", host.name);
        }
        out
    }

    /// Close every pooled connection
    pub async fn shutdown(&self) {
        self.pool.close_all().await;
    }
}

fn clip(s: &str, max: usize) -> (&str, bool) {
    if s.len() <= max {
        (s, false)
    } else {
        (&s[..floor_char_boundary(s, max)], true)
    }
}

fn render_command(result: &CommandResult, timeout_secs: u64, max_output: usize) -> ToolResponse {
    let mut text = if result.timed_out {
        format!(
            "exit code: {} (timed out after {timeout_secs}s)",
            result.exit_code
        )
    } else {
        format!("exit code: {} ({} ms)", result.exit_code, result.duration_ms)
    };

    for (label, stream) in [("stdout", &result.stdout), ("stderr", &result.stderr)] {
        if stream.is_empty() {
            continue;
        }
        let (shown, clipped) = clip(stream, max_output);
        let _ = write!(text, "\n--- {label} ---\n{}", shown.trim_end_matches('\n'));
        if clipped {
            let _ = write!(text, "\n[{label} truncated at {max_output} bytes]");
        }
    }

    if result.timed_out {
        ToolResponse::error(text)
    } else {
        ToolResponse::text(text)
    }
}
