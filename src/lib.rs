// Use mimalloc allocator when the feature is enabled (recommended for musl builds)
#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod inspector;
pub mod ports;
pub mod security;
pub mod server;
pub mod ssh;

pub use config::{HostRecord, HostRegistry, Settings};
pub use error::{InspectError, ParseError, Result, ValidationError};
pub use inspector::{Inspector, ToolRequest, ToolResponse};
pub use ports::{ExecOutput, RemoteSession, SshConnector};
pub use ssh::{ConnectionPool, PoolConfig, RealSshConnector};

// Re-exports for fuzzing and benches
#[doc(hidden)]
pub use config::ssh_config::parse_ssh_config_content;
#[doc(hidden)]
pub use domain::parse_target;
#[doc(hidden)]
pub use domain::shell::{quote, quote_path};
#[doc(hidden)]
pub use security::{validate_command, validate_host_name, validate_path};
