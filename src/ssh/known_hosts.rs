//! SSH `known_hosts` verification wrapper around russh's built-in support

use std::path::{Path, PathBuf};

use russh::keys::known_hosts::{
    check_known_hosts, check_known_hosts_path, learn_known_hosts, learn_known_hosts_path,
};
use russh::keys::{Error as KeyError, HashAlg, PublicKey};
use tracing::{debug, warn};

#[cfg(unix)]
use std::os::unix::fs::MetadataExt;

use crate::config::{HostKeyConfig, HostKeyVerification};
use crate::error::{InspectError, Result};

/// Result of looking a host key up in `known_hosts`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyResult {
    Match,
    /// Recorded key differs (line of the recorded entry)
    Mismatch { line: usize },
    Unknown,
}

/// Host key checking as configured: a mode plus an optional
/// `known_hosts` file (default `~/.ssh/known_hosts`).
#[derive(Debug, Clone, Default)]
pub struct HostKeyPolicy {
    mode: HostKeyVerification,
    path: Option<PathBuf>,
}

impl HostKeyPolicy {
    #[must_use]
    pub fn new(mode: HostKeyVerification, path: Option<PathBuf>) -> Self {
        Self { mode, path }
    }

    #[must_use]
    pub fn from_config(config: &HostKeyConfig) -> Self {
        let path = config
            .known_hosts_path
            .as_deref()
            .map(|p| PathBuf::from(shellexpand::tilde(p).as_ref()));
        Self::new(config.verification, path)
    }

    #[must_use]
    pub const fn mode(&self) -> HostKeyVerification {
        self.mode
    }

    /// Look a key up without changing anything
    ///
    /// # Errors
    ///
    /// Returns an error if the `known_hosts` file cannot be parsed.
    pub fn lookup(&self, hostname: &str, port: u16, key: &PublicKey) -> Result<VerifyResult> {
        let checked = match &self.path {
            Some(path) => check_known_hosts_path(hostname, port, key, path),
            None => check_known_hosts(hostname, port, key),
        };

        match checked {
            Ok(true) => {
                debug!(hostname = %hostname, port = %port, "Host key verified");
                Ok(VerifyResult::Match)
            }
            Ok(false) => {
                debug!(hostname = %hostname, port = %port, "Host key not in known_hosts");
                Ok(VerifyResult::Unknown)
            }
            Err(KeyError::KeyChanged { line }) => {
                warn!(
                    hostname = %hostname,
                    port = %port,
                    line = %line,
                    "Host key mismatch detected"
                );
                Ok(VerifyResult::Mismatch { line })
            }
            Err(e) => Err(InspectError::Config(format!(
                "Failed to check known_hosts: {e}"
            ))),
        }
    }

    fn learn(&self, hostname: &str, port: u16, key: &PublicKey) -> Result<()> {
        let learned = match &self.path {
            Some(path) => learn_known_hosts_path(hostname, port, key, path),
            None => learn_known_hosts(hostname, port, key),
        };
        learned.map_err(|e| {
            InspectError::Config(format!("Failed to add host key to known_hosts: {e}"))
        })?;

        debug!(hostname = %hostname, port = %port, "Added host key to known_hosts");
        Ok(())
    }

    /// Verify a server key according to the mode.
    ///
    /// `Off` accepts anything and logs a warning every time.
    ///
    /// # Errors
    ///
    /// Returns `HostKeyMismatch` for a changed key, `HostKeyUnknown` for a
    /// new host in strict mode, or a config error when the file is unusable.
    pub fn verify(&self, hostname: &str, port: u16, key: &PublicKey) -> Result<()> {
        if self.mode == HostKeyVerification::Off {
            warn!(
                hostname = %hostname,
                "Host key verification is disabled for this connection. \
                 This is vulnerable to MITM attacks."
            );
            return Ok(());
        }

        check_permissions(self.path.as_deref());

        match self.lookup(hostname, port, key)? {
            VerifyResult::Match => Ok(()),
            VerifyResult::Mismatch { line } => Err(InspectError::HostKeyMismatch {
                host: hostname.to_string(),
                expected: format!("key from known_hosts line {line}"),
                actual: fingerprint(key),
            }),
            VerifyResult::Unknown if self.mode == HostKeyVerification::AcceptNew => {
                warn!(hostname = %hostname, fingerprint = %fingerprint(key), "Adding new host key to known_hosts");
                self.learn(hostname, port, key)
            }
            VerifyResult::Unknown => Err(InspectError::HostKeyUnknown {
                host: hostname.to_string(),
                fingerprint: fingerprint(key),
            }),
        }
    }
}

/// SHA-256 fingerprint of a public key
#[must_use]
pub fn fingerprint(key: &PublicKey) -> String {
    key.fingerprint(HashAlg::Sha256).to_string()
}

/// Warn when `known_hosts` is writable or readable by others (Unix only)
#[cfg(unix)]
fn check_permissions(path: Option<&Path>) {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => match dirs::home_dir() {
            Some(home) => home.join(".ssh").join("known_hosts"),
            None => return,
        },
    };
    if let Ok(metadata) = std::fs::metadata(&path) {
        let mode = metadata.mode() & 0o777;
        if mode & 0o077 != 0 && mode != 0o644 {
            warn!(
                path = %path.display(),
                mode = format!("{mode:o}"),
                "known_hosts file has overly permissive permissions"
            );
        }
    }
}

#[cfg(not(unix))]
fn check_permissions(_path: Option<&Path>) {}
