//! Read-only host registry
//!
//! The hosts file is parsed on first lookup and cached for the lifetime of
//! the registry. Async callers use [`HostRegistry::load`] first so the read
//! happens on the blocking pool.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing::{info, warn};

use super::ssh_config;
use super::types::HostRecord;

enum Source {
    File(PathBuf),
    Records(Vec<HostRecord>),
}

pub struct HostRegistry {
    source: Source,
    hosts: OnceLock<HashMap<String, HostRecord>>,
}

impl HostRegistry {
    /// Registry backed by an ssh_config-style file. `~` is expanded.
    #[must_use]
    pub fn from_file(path: &str) -> Self {
        let expanded = shellexpand::tilde(path);
        Self {
            source: Source::File(PathBuf::from(expanded.as_ref())),
            hosts: OnceLock::new(),
        }
    }

    /// Registry over a fixed set of records
    #[must_use]
    pub fn from_records(records: impl IntoIterator<Item = HostRecord>) -> Self {
        Self {
            source: Source::Records(records.into_iter().collect()),
            hosts: OnceLock::new(),
        }
    }

    /// Read the hosts file on the blocking pool. No-op once loaded.
    pub async fn load(&self) {
        if self.hosts.get().is_some() {
            return;
        }
        let Source::File(path) = &self.source else {
            return;
        };

        let path = path.clone();
        let read = tokio::task::spawn_blocking(move || {
            let result = ssh_config::parse_ssh_config(&path);
            loaded(&path, result)
        })
        .await;

        match read {
            Ok(hosts) => {
                // A concurrent load may have won; both read the same file
                let _ = self.hosts.set(hosts);
            }
            Err(e) => warn!(error = %e, "Hosts file load task failed"),
        }
    }

    fn hosts(&self) -> &HashMap<String, HostRecord> {
        self.hosts.get_or_init(|| match &self.source {
            Source::File(path) => loaded(path, ssh_config::parse_ssh_config(path)),
            Source::Records(records) => records
                .iter()
                .map(|r| (r.name.clone(), r.clone()))
                .collect(),
        })
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&HostRecord> {
        self.hosts().get(name)
    }

    /// All records, sorted by name
    #[must_use]
    pub fn all(&self) -> Vec<&HostRecord> {
        let mut records: Vec<_> = self.hosts().values().collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.hosts().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hosts().is_empty()
    }
}

fn loaded(
    path: &Path,
    result: std::io::Result<HashMap<String, HostRecord>>,
) -> HashMap<String, HostRecord> {
    match result {
        Ok(hosts) => {
            info!(path = %path.display(), count = hosts.len(), "Loaded host records");
            hosts
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Cannot read hosts file, no hosts available");
            HashMap::new()
        }
    }
}
