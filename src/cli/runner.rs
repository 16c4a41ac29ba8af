//! CLI runner functions
//!
//! Each command builds an [`Inspector`] over the real SSH connector and
//! closes the pool before returning.

use std::fmt::Write as FmtWrite;
use std::sync::Arc;

use tokio::io::BufReader;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::{HostRegistry, Settings};
use crate::error::Result;
use crate::inspector::{Inspector, ToolRequest};
use crate::server::{serve_lines, serve_tcp};
use crate::ssh::RealSshConnector;

fn create_inspector(settings: &Settings) -> Inspector<RealSshConnector> {
    Inspector::from_settings(settings, RealSshConnector::from_settings(settings))
}

/// Serve tool calls until the input ends or the process is interrupted
///
/// # Errors
///
/// Returns an error if:
/// - The TCP listener cannot be bound
/// - Reading the request stream fails
pub async fn run_serve(settings: &Settings, listen: bool) -> Result<()> {
    let inspector = Arc::new(create_inspector(settings));
    inspector.pool().start_eviction();
    let max_concurrent = settings.server.max_concurrent_requests;

    let served = if listen {
        let address = format!("{}:{}", settings.server.bind_address, settings.server.port);
        let listener = TcpListener::bind(&address).await?;
        tokio::select! {
            result = serve_tcp(Arc::clone(&inspector), listener, max_concurrent) => result,
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                Ok(())
            }
        }
    } else {
        info!("Serving tool calls on stdin/stdout");
        let reader = BufReader::new(tokio::io::stdin());
        tokio::select! {
            result = serve_lines(Arc::clone(&inspector), reader, tokio::io::stdout(), max_concurrent) => {
                info!("Input closed, shutting down");
                result
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                Ok(())
            }
        }
    };

    inspector.shutdown().await;
    Ok(served?)
}

/// Answer one request and print the result.
///
/// Returns whether the response was an error so the caller can pick the
/// exit status.
///
/// # Errors
///
/// This function is infallible in practice but returns `Result` for
/// consistency with other CLI commands.
pub async fn run_inspect(settings: &Settings, request: &ToolRequest) -> Result<bool> {
    let inspector = create_inspector(settings);
    let response = inspector.handle(request).await;
    inspector.shutdown().await;

    if response.is_error {
        eprintln!("{}", response.text);
    } else {
        println!("{}", response.text);
    }
    Ok(response.is_error)
}

/// Print every configured host with its reachability
///
/// # Errors
///
/// This function is infallible in practice but returns `Result` for
/// consistency with other CLI commands.
pub async fn run_hosts(settings: &Settings) -> Result<()> {
    let inspector = create_inspector(settings);
    println!("{}", inspector.host_report().await);
    Ok(())
}

/// Print the effective settings
///
/// # Errors
///
/// This function is infallible in practice but returns `Result` for
/// consistency with other CLI commands.
pub async fn run_status(settings: &Settings) -> Result<()> {
    let registry = HostRegistry::from_file(&settings.hosts_file);
    registry.load().await;
    print!("{}", status_report(settings, &registry));
    Ok(())
}

fn status_report(settings: &Settings, registry: &HostRegistry) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "MCP SSH Inspector Status");
    let _ = writeln!(out, "========================\n");

    let _ = writeln!(out, "Hosts file: {}", settings.hosts_file);
    let _ = writeln!(out, "Configured Hosts ({}):", registry.len());
    if registry.is_empty() {
        let _ = writeln!(out, "  (no hosts configured)");
    }
    for host in registry.all() {
        let auth = host
            .identity_file
            .as_deref()
            .map_or_else(|| "SSH Agent".to_string(), |path| format!("Key {path}"));
        let _ = writeln!(
            out,
            "  {}: {}@{}:{} ({auth})",
            host.name, host.user, host.address, host.port
        );
    }

    let limits = &settings.limits;
    let _ = writeln!(out, "\nLimits:");
    let _ = writeln!(out, "  Command timeout: {}s", limits.command_timeout_seconds);
    let _ = writeln!(out, "  Connection timeout: {}s", limits.connection_timeout_seconds);
    let _ = writeln!(out, "  Max file size: {} bytes", limits.max_file_size);
    let _ = writeln!(out, "  Tree depth: {}", limits.tree_max_depth);

    let pool = &settings.pool;
    let _ = writeln!(out, "\nPool:");
    let _ = writeln!(out, "  Max size: {}", pool.max_size);
    let _ = writeln!(out, "  Idle timeout: {}s", pool.idle_timeout_seconds);
    let _ = writeln!(out, "  Eviction interval: {}s", pool.eviction_interval_seconds);

    let _ = writeln!(out, "\nHost keys: {:?}", settings.host_keys.verification);
    if let Some(path) = &settings.host_keys.known_hosts_path {
        let _ = writeln!(out, "  known_hosts: {path}");
    }

    let policy = &settings.policy;
    let _ = writeln!(out, "\nPolicy: {:?}", policy.mode);
    for pattern in &policy.allow {
        let _ = writeln!(out, "  allow: {pattern}");
    }
    for pattern in &policy.deny {
        let _ = writeln!(out, "  deny: {pattern}");
    }

    let _ = writeln!(
        out,
        "\nServer: {}:{}",
        settings.server.bind_address, settings.server.port
    );
    out
}
