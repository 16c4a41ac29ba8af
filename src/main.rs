use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use mcp_ssh_inspector::ToolRequest;
use mcp_ssh_inspector::cli::{Cli, Commands, run_hosts, run_inspect, run_serve, run_status};
use mcp_ssh_inspector::config::load_settings;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Serving uses stdout for responses, so logs always go to stderr
    let is_serve_mode = matches!(cli.command, None | Some(Commands::Serve { .. }));
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(!is_serve_mode)
        .init();

    let mut settings = load_settings(cli.config.as_deref()).with_context(|| {
        cli.config.as_ref().map_or_else(
            || "Failed to load default settings".to_string(),
            |path| format!("Failed to load settings from {}", path.display()),
        )
    })?;
    if let Some(hosts_file) = cli.hosts_file {
        settings.hosts_file = hosts_file;
    }

    info!(
        hosts_file = %settings.hosts_file,
        host_keys = ?settings.host_keys.verification,
        pool_max = settings.pool.max_size,
        "Settings loaded"
    );

    match cli.command {
        None => run_serve(&settings, false).await?,
        Some(Commands::Serve { listen }) => run_serve(&settings, listen).await?,
        Some(Commands::Inspect {
            target,
            command,
            tree,
        }) => {
            let mut request = ToolRequest::new(target).with_tree(tree);
            request.command = command;
            if run_inspect(&settings, &request).await? {
                std::process::exit(1);
            }
        }
        Some(Commands::Hosts) => run_hosts(&settings).await?,
        Some(Commands::Status) => run_status(&settings).await?,
    }

    Ok(())
}
