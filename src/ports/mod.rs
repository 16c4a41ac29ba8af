//! Ports module - Trait definitions for hexagonal architecture
//!
//! The SSH transport sits behind these traits so the pool and executor
//! never depend on `russh` directly.

mod connector;

pub use connector::{ExecOutput, RemoteSession, SshConnector};

#[cfg(test)]
pub use connector::mock;
