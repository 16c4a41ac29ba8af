mod client;
mod connector;
pub mod executor;
pub mod known_hosts;
mod pool;
pub mod probe;

pub use client::{ClientSettings, SshClient};
pub use connector::RealSshConnector;
pub use executor::{
    CommandResult, DirEntry, FileContent, PathKind, list_directory, read_file, render_listing,
    run_command, stat_path, tree_directory,
};
pub use known_hosts::{HostKeyPolicy, VerifyResult};
pub use pool::{ConnectionPool, HostUsage, PoolConfig, PoolStats};
pub use probe::probe_many;
