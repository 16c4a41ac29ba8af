//! SSH Connector Adapter
//!
//! Concrete implementation of the `SshConnector` and `RemoteSession` ports
//! using the russh SSH client.

use async_trait::async_trait;

use crate::config::{HostRecord, Settings};
use crate::error::Result;
use crate::ports::{ExecOutput, RemoteSession, SshConnector};
use crate::ssh::client::{ClientSettings, SshClient};
use crate::ssh::known_hosts::HostKeyPolicy;

/// Real SSH connector using russh
#[derive(Debug, Clone)]
pub struct RealSshConnector {
    settings: ClientSettings,
}

impl RealSshConnector {
    #[must_use]
    pub const fn new(settings: ClientSettings) -> Self {
        Self { settings }
    }

    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(ClientSettings {
            host_keys: HostKeyPolicy::from_config(&settings.host_keys),
            keepalive_interval_seconds: settings.limits.keepalive_interval_seconds,
        })
    }
}

#[async_trait]
impl SshConnector for RealSshConnector {
    type Session = SshClient;

    async fn connect(&self, host: &HostRecord) -> Result<SshClient> {
        SshClient::connect(host, &self.settings).await
    }
}

#[async_trait]
impl RemoteSession for SshClient {
    async fn exec(&self, command: &str) -> Result<ExecOutput> {
        Self::exec(self, command).await
    }

    fn is_closed(&self) -> bool {
        Self::is_closed(self)
    }

    fn host_name(&self) -> &str {
        Self::host_name(self)
    }

    async fn close(&self) -> Result<()> {
        Self::close(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HostKeyVerification;

    #[test]
    fn test_from_settings_carries_host_key_mode() {
        let mut settings = Settings::default();
        settings.host_keys.verification = HostKeyVerification::AcceptNew;
        settings.limits.keepalive_interval_seconds = 7;

        let connector = RealSshConnector::from_settings(&settings);
        assert_eq!(
            connector.settings.host_keys.mode(),
            HostKeyVerification::AcceptNew
        );
        assert_eq!(connector.settings.keepalive_interval_seconds, 7);
    }

    #[tokio::test]
    async fn test_connect_refused_is_connect_failed() {
        // Bind then drop to get a port nothing listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let connector = RealSshConnector::from_settings(&Settings::default());
        let host = HostRecord::new("nowhere", "127.0.0.1").with_port(port);

        let result = connector.connect(&host).await;
        assert!(matches!(
            result,
            Err(crate::error::InspectError::ConnectFailed { .. })
        ));
    }
}
