//! CLI module for direct command-line usage
//!
//! `serve` runs the JSON-lines tool-call surface; the other commands answer
//! a single request and exit.

mod runner;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use runner::{run_hosts, run_inspect, run_serve, run_status};

/// MCP SSH Inspector - pooled SSH file inspection and command execution
#[derive(Parser)]
#[command(name = "mcp-ssh-inspector")]
#[command(about = "Inspect files and run commands on SSH hosts for tool-calling agents")]
#[command(version)]
#[command(after_help = "EXAMPLES:
    # Serve tool calls as JSON lines on stdin/stdout (default)
    mcp-ssh-inspector

    # Serve over TCP on the configured bind address and port
    mcp-ssh-inspector serve --listen

    # Read a file
    mcp-ssh-inspector inspect db1:/etc/hosts

    # Run a command in a directory
    mcp-ssh-inspector inspect web:/var/www -c \"git status\"

    # List hosts with reachability
    mcp-ssh-inspector hosts")]
pub struct Cli {
    /// Path to settings file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Hosts file in ssh_config format (overrides the settings file)
    #[arg(long, global = true)]
    pub hosts_file: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Serve tool calls as JSON lines - same as running without arguments
    Serve {
        /// Listen on TCP instead of stdin/stdout
        #[arg(long)]
        listen: bool,
    },

    /// Answer a single request
    Inspect {
        /// `hosts` or `<host>:<path>`
        target: String,

        /// Command to run with the path as working directory
        #[arg(short = 'c', long)]
        command: Option<String>,

        /// Show directories as a tree
        #[arg(long)]
        tree: bool,
    },

    /// List configured hosts with TCP reachability
    Hosts,

    /// Show effective settings
    Status,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_inspect_with_command() {
        let cli = Cli::parse_from([
            "mcp-ssh-inspector",
            "inspect",
            "web:/var/www",
            "-c",
            "git status",
        ]);
        match cli.command {
            Some(Commands::Inspect {
                target,
                command,
                tree,
            }) => {
                assert_eq!(target, "web:/var/www");
                assert_eq!(command.as_deref(), Some("git status"));
                assert!(!tree);
            }
            _ => panic!("expected inspect"),
        }
    }

    #[test]
    fn test_parse_serve_listen_with_global_config() {
        let cli = Cli::parse_from([
            "mcp-ssh-inspector",
            "serve",
            "--listen",
            "--config",
            "/tmp/x.yaml",
        ]);
        assert!(matches!(cli.command, Some(Commands::Serve { listen: true })));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/x.yaml")));
    }

    #[test]
    fn test_no_subcommand_defaults_to_none() {
        let cli = Cli::parse_from(["mcp-ssh-inspector"]);
        assert!(cli.command.is_none());
    }
}
