use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use russh::ChannelMsg;
use russh::client::{self, Config, Handle, Handler};
use russh::keys::key::PrivateKeyWithHashAlg;
use russh::keys::{PublicKey, load_secret_key};
use tokio::time::timeout;

use crate::config::HostRecord;
use crate::domain::truncate::cap;
use crate::error::{InspectError, Result};
use crate::ports::ExecOutput;
use crate::ssh::known_hosts::HostKeyPolicy;

/// Sanitize SSH error messages to prevent credential leakage.
/// Masks authentication method names and caps the length.
pub(crate) fn sanitize_ssh_error(error: &impl std::fmt::Display) -> String {
    let mut msg = error.to_string();
    for method in &["publickey", "keyboard-interactive", "gssapi-with-mic", "password"] {
        msg = msg.replace(method, "***");
    }
    cap(&msg, 500)
}

/// Slot the handler uses to hand a host key failure back to `connect`
type KeyFailure = Arc<Mutex<Option<InspectError>>>;

/// SSH client handler for russh with host key verification
struct ClientHandler {
    hostname: String,
    port: u16,
    policy: HostKeyPolicy,
    failure: KeyFailure,
}

impl Handler for ClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        match self
            .policy
            .verify(&self.hostname, self.port, server_public_key)
        {
            Ok(()) => Ok(true),
            Err(e) => {
                tracing::error!(hostname = %self.hostname, error = %e, "Host key verification failed");
                *self
                    .failure
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = Some(e);
                Ok(false)
            }
        }
    }
}

/// Transport settings shared by every connection
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub host_keys: HostKeyPolicy,
    pub keepalive_interval_seconds: u64,
}

/// SSH client wrapper
pub struct SshClient {
    handle: Handle<ClientHandler>,
    host_name: String,
}

impl SshClient {
    /// Connect and authenticate.
    ///
    /// No overall timeout is applied here; the pool bounds the whole call.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The TCP or SSH handshake fails
    /// - Host key verification fails
    /// - Authentication fails (key file or agent)
    #[must_use = "the SSH client must be used or closed"]
    pub async fn connect(host: &HostRecord, settings: &ClientSettings) -> Result<Self> {
        let handle = Self::establish_connection(host, settings).await?;
        match &host.identity_file {
            Some(path) => Self::auth_with_key(handle, host, path).await,
            None => Self::auth_with_agent(handle, host).await,
        }
    }

    async fn establish_connection(
        host: &HostRecord,
        settings: &ClientSettings,
    ) -> Result<Handle<ClientHandler>> {
        let keepalive = Duration::from_secs(settings.keepalive_interval_seconds);
        let config = Arc::new(Config {
            inactivity_timeout: Some(keepalive * 4),
            keepalive_interval: Some(keepalive),
            keepalive_max: 3,
            ..Default::default()
        });

        let failure = KeyFailure::default();
        let handler = ClientHandler {
            hostname: host.address.clone(),
            port: host.port,
            policy: settings.host_keys.clone(),
            failure: Arc::clone(&failure),
        };

        let addr = (host.address.as_str(), host.port);
        client::connect(config, addr, handler).await.map_err(|e| {
            // A rejected host key is more useful than the generic handshake error
            if let Some(key_error) = failure.lock().unwrap_or_else(PoisonError::into_inner).take() {
                return key_error;
            }
            tracing::error!(host = %host.name, address = %host.address, port = host.port, error = %e, "SSH connection failed");
            InspectError::ConnectFailed {
                host: host.name.clone(),
                cause: sanitize_ssh_error(&e),
            }
        })
    }

    /// Authenticate using an SSH key file
    async fn auth_with_key(
        mut handle: Handle<ClientHandler>,
        host: &HostRecord,
        path: &str,
    ) -> Result<Self> {
        let expanded = shellexpand::tilde(path);
        let key_path = Path::new(expanded.as_ref());

        let key_pair = load_secret_key(key_path, None).map_err(|e| {
            tracing::error!(host = %host.name, path = %path, error = %sanitize_ssh_error(&e), "Cannot load identity file");
            InspectError::Auth {
                user: host.user.clone(),
                host: host.name.clone(),
            }
        })?;

        let hash_alg = handle
            .best_supported_rsa_hash()
            .await
            .ok()
            .flatten()
            .flatten();

        let key_with_hash = PrivateKeyWithHashAlg::new(Arc::new(key_pair), hash_alg);

        let auth_result = handle
            .authenticate_publickey(&host.user, key_with_hash)
            .await
            .map_err(|e| {
                tracing::error!(host = %host.name, user = %host.user, error = %sanitize_ssh_error(&e), method = "key", "SSH key authentication error");
                InspectError::Auth {
                    user: host.user.clone(),
                    host: host.name.clone(),
                }
            })?;

        if !auth_result.success() {
            tracing::error!(host = %host.name, user = %host.user, method = "key", "SSH key authentication failed");
            return Err(InspectError::Auth {
                user: host.user.clone(),
                host: host.name.clone(),
            });
        }

        Ok(Self {
            handle,
            host_name: host.name.clone(),
        })
    }

    /// Authenticate using an SSH agent
    #[cfg(unix)]
    async fn auth_with_agent(mut handle: Handle<ClientHandler>, host: &HostRecord) -> Result<Self> {
        use russh::keys::agent::client::AgentClient;

        let auth_error = || InspectError::Auth {
            user: host.user.clone(),
            host: host.name.clone(),
        };

        let mut agent = AgentClient::connect_env().await.map_err(|e| {
            tracing::error!(host = %host.name, error = %sanitize_ssh_error(&e), "SSH agent connection failed");
            auth_error()
        })?;

        let identities = agent.request_identities().await.map_err(|e| {
            tracing::error!(host = %host.name, error = %sanitize_ssh_error(&e), "Failed to get agent identities");
            auth_error()
        })?;

        if identities.is_empty() {
            tracing::error!(host = %host.name, user = %host.user, "No identities available in SSH agent");
            return Err(auth_error());
        }

        let mut last_error: Option<String> = None;
        for public_key in &identities {
            let hash_alg = handle
                .best_supported_rsa_hash()
                .await
                .ok()
                .flatten()
                .flatten();

            match handle
                .authenticate_publickey_with(&host.user, public_key.clone(), hash_alg, &mut agent)
                .await
            {
                Ok(result) if result.success() => {
                    return Ok(Self {
                        handle,
                        host_name: host.name.clone(),
                    });
                }
                Ok(_) => last_error = Some("key rejected by server".to_string()),
                Err(e) => last_error = Some(sanitize_ssh_error(&e)),
            }
        }

        tracing::error!(
            host = %host.name,
            user = %host.user,
            identity_count = identities.len(),
            last_error = %last_error.unwrap_or_else(|| "unknown".to_string()),
            method = "agent",
            "SSH agent authentication failed - no identity accepted"
        );
        Err(auth_error())
    }

    /// Authenticate using an SSH agent (unsupported platforms)
    #[cfg(not(unix))]
    async fn auth_with_agent(_handle: Handle<ClientHandler>, host: &HostRecord) -> Result<Self> {
        tracing::error!(host = %host.name, "SSH agent authentication is not supported on this platform");
        Err(InspectError::Auth {
            user: host.user.clone(),
            host: host.name.clone(),
        })
    }

    /// Run one command on a fresh channel and collect its output.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionLost` if the channel cannot be opened or the
    /// command cannot be started.
    pub async fn exec(&self, command: &str) -> Result<ExecOutput> {
        let lost = |e: russh::Error| InspectError::ConnectionLost {
            host: self.host_name.clone(),
            reason: sanitize_ssh_error(&e),
        };

        let mut channel = self.handle.channel_open_session().await.map_err(lost)?;
        channel.exec(true, command).await.map_err(lost)?;

        let mut output = ExecOutput::default();
        loop {
            match channel.wait().await {
                Some(ChannelMsg::Data { data }) => output.stdout.extend_from_slice(&data),
                Some(ChannelMsg::ExtendedData { data, ext }) if ext == 1 => {
                    output.stderr.extend_from_slice(&data);
                }
                Some(ChannelMsg::ExitStatus { exit_status }) => {
                    output.exit_code = Some(exit_status);
                }
                None => break,
                // ExitStatus may arrive before or after Eof; keep reading
                // until the channel is fully closed.
                Some(_) => {}
            }
        }

        Ok(output)
    }

    /// Whether the transport has already shut down. No I/O.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }

    #[must_use]
    pub fn host_name(&self) -> &str {
        &self.host_name
    }

    /// Disconnect (with 5s timeout to avoid blocking)
    ///
    /// # Errors
    ///
    /// Returns an error if the disconnect message cannot be sent.
    pub async fn close(&self) -> Result<()> {
        if self.is_closed() {
            return Ok(());
        }
        match timeout(
            Duration::from_secs(5),
            self.handle
                .disconnect(russh::Disconnect::ByApplication, "", "en"),
        )
        .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(InspectError::ConnectionLost {
                host: self.host_name.clone(),
                reason: sanitize_ssh_error(&e),
            }),
            Err(_) => {
                tracing::warn!(host = %self.host_name, "Timeout closing SSH connection, forcing drop");
                Ok(())
            }
        }
    }
}
