//! SSH Connector Port
//!
//! Traits for opening sessions and running commands on them, so the pool,
//! executor and inspector can be exercised without a real SSH server.

use async_trait::async_trait;

use crate::config::HostRecord;
use crate::error::Result;

/// Raw output of one remote command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// `None` when the channel closed without reporting a status
    pub exit_code: Option<u32>,
}

impl ExecOutput {
    /// Successful output with the given stdout
    #[must_use]
    pub fn ok(stdout: impl Into<Vec<u8>>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: Vec::new(),
            exit_code: Some(0),
        }
    }

    #[must_use]
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    #[must_use]
    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Opens authenticated sessions to hosts
#[async_trait]
pub trait SshConnector: Send + Sync + 'static {
    type Session: RemoteSession;

    /// Connect and authenticate. No timeout is applied here; callers bound it.
    async fn connect(&self, host: &HostRecord) -> Result<Self::Session>;
}

/// An established session that can run commands.
///
/// Shared between concurrent callers, so every method takes `&self`.
#[async_trait]
pub trait RemoteSession: Send + Sync + 'static {
    /// Run one command on a fresh channel.
    ///
    /// Transport failures surface as `ConnectionLost`; a non-zero exit code
    /// is a normal result.
    async fn exec(&self, command: &str) -> Result<ExecOutput>;

    /// Whether the transport already reports the session as closed. Must not
    /// perform I/O.
    fn is_closed(&self) -> bool;

    fn host_name(&self) -> &str;

    /// Disconnect. Closing twice is not an error.
    async fn close(&self) -> Result<()>;
}

#[cfg(test)]
pub mod mock {
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::*;
    use crate::error::InspectError;

    /// Observable state of one mock session
    #[derive(Default)]
    pub struct MockSessionState {
        pub closed: AtomicBool,
        pub close_calls: AtomicUsize,
        pub exec_calls: Mutex<Vec<String>>,
    }

    impl MockSessionState {
        pub fn exec_calls(&self) -> Vec<String> {
            self.exec_calls.lock().unwrap().clone()
        }

        pub fn is_closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }
    }

    #[derive(Default)]
    struct Script {
        /// (substring, output) pairs, first match wins
        responses: Vec<(String, ExecOutput)>,
        connect_latency: Option<Duration>,
        exec_delay: Option<Duration>,
        close_delay: Arc<Mutex<Option<Duration>>>,
        unreachable: HashSet<String>,
    }

    /// Scriptable connector recording every connect
    #[derive(Default)]
    pub struct MockConnector {
        script: Mutex<Script>,
        connect_calls: Mutex<Vec<String>>,
        sessions: Mutex<HashMap<String, Vec<Arc<MockSessionState>>>>,
        /// Remaining exec calls that fail with `ConnectionLost`
        exec_failures: Arc<AtomicUsize>,
    }

    impl MockConnector {
        pub fn new() -> Self {
            Self::default()
        }

        /// Reply with `output` to commands containing `pattern`
        pub fn respond(&self, pattern: &str, output: ExecOutput) {
            self.script
                .lock()
                .unwrap()
                .responses
                .push((pattern.to_string(), output));
        }

        pub fn set_connect_latency(&self, latency: Duration) {
            self.script.lock().unwrap().connect_latency = Some(latency);
        }

        pub fn set_exec_delay(&self, delay: Duration) {
            self.script.lock().unwrap().exec_delay = Some(delay);
        }

        /// Delay every later `close`, including on sessions already open
        pub fn set_close_delay(&self, delay: Duration) {
            *self.script.lock().unwrap().close_delay.lock().unwrap() = Some(delay);
        }

        pub fn set_unreachable(&self, host: &str) {
            self.script
                .lock()
                .unwrap()
                .unreachable
                .insert(host.to_string());
        }

        /// Make the next `n` exec calls, on any session, fail at transport level
        pub fn fail_next_execs(&self, n: usize) {
            self.exec_failures.store(n, Ordering::SeqCst);
        }

        pub fn connect_count(&self) -> usize {
            self.connect_calls.lock().unwrap().len()
        }

        pub fn connect_calls(&self) -> Vec<String> {
            self.connect_calls.lock().unwrap().clone()
        }

        /// Sessions opened for `host`, oldest first
        pub fn sessions(&self, host: &str) -> Vec<Arc<MockSessionState>> {
            self.sessions
                .lock()
                .unwrap()
                .get(host)
                .cloned()
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl SshConnector for MockConnector {
        type Session = MockSession;

        async fn connect(&self, host: &HostRecord) -> Result<MockSession> {
            self.connect_calls.lock().unwrap().push(host.name.clone());

            let (latency, unreachable, responses, exec_delay, close_delay) = {
                let script = self.script.lock().unwrap();
                (
                    script.connect_latency,
                    script.unreachable.contains(&host.name),
                    script.responses.clone(),
                    script.exec_delay,
                    Arc::clone(&script.close_delay),
                )
            };

            if let Some(latency) = latency {
                tokio::time::sleep(latency).await;
            }

            if unreachable {
                return Err(InspectError::ConnectFailed {
                    host: host.name.clone(),
                    cause: "connection refused".to_string(),
                });
            }

            let state = Arc::new(MockSessionState::default());
            self.sessions
                .lock()
                .unwrap()
                .entry(host.name.clone())
                .or_default()
                .push(Arc::clone(&state));

            Ok(MockSession {
                host_name: host.name.clone(),
                responses,
                exec_delay,
                close_delay,
                exec_failures: Arc::clone(&self.exec_failures),
                state,
            })
        }
    }

    pub struct MockSession {
        host_name: String,
        responses: Vec<(String, ExecOutput)>,
        exec_delay: Option<Duration>,
        close_delay: Arc<Mutex<Option<Duration>>>,
        exec_failures: Arc<AtomicUsize>,
        pub state: Arc<MockSessionState>,
    }

    #[async_trait]
    impl RemoteSession for MockSession {
        async fn exec(&self, command: &str) -> Result<ExecOutput> {
            self.state
                .exec_calls
                .lock()
                .unwrap()
                .push(command.to_string());

            let failed = self
                .exec_failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failed {
                self.state.closed.store(true, Ordering::SeqCst);
                return Err(InspectError::ConnectionLost {
                    host: self.host_name.clone(),
                    reason: "channel open failed".to_string(),
                });
            }

            if let Some(delay) = self.exec_delay {
                tokio::time::sleep(delay).await;
            }

            Ok(self
                .responses
                .iter()
                .find(|(pattern, _)| command.contains(pattern.as_str()))
                .map(|(_, output)| output.clone())
                .unwrap_or_else(|| ExecOutput::ok("")))
        }

        fn is_closed(&self) -> bool {
            self.state.is_closed()
        }

        fn host_name(&self) -> &str {
            &self.host_name
        }

        async fn close(&self) -> Result<()> {
            self.state.close_calls.fetch_add(1, Ordering::SeqCst);
            let delay = *self.close_delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            self.state.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn host(name: &str) -> HostRecord {
            HostRecord::new(name, "10.0.0.1")
        }

        #[tokio::test]
        async fn test_mock_connector_records_calls() {
            let connector = MockConnector::new();
            let _ = connector.connect(&host("a")).await.unwrap();
            let _ = connector.connect(&host("b")).await.unwrap();
            assert_eq!(connector.connect_calls(), vec!["a", "b"]);
            assert_eq!(connector.sessions("a").len(), 1);
        }

        #[tokio::test]
        async fn test_mock_connector_unreachable() {
            let connector = MockConnector::new();
            connector.set_unreachable("dead");
            let result = connector.connect(&host("dead")).await;
            assert!(matches!(result, Err(InspectError::ConnectFailed { .. })));
        }

        #[tokio::test]
        async fn test_mock_session_responses() {
            let connector = MockConnector::new();
            connector.respond("whoami", ExecOutput::ok("root\n"));
            let session = connector.connect(&host("a")).await.unwrap();

            let out = session.exec("whoami").await.unwrap();
            assert_eq!(out.stdout_lossy(), "root\n");

            let out = session.exec("uptime").await.unwrap();
            assert_eq!(out.exit_code, Some(0));
            assert!(out.stdout.is_empty());
            assert_eq!(session.state.exec_calls(), vec!["whoami", "uptime"]);
        }

        #[tokio::test]
        async fn test_mock_session_exec_failure_closes() {
            let connector = MockConnector::new();
            connector.fail_next_execs(1);
            let session = connector.connect(&host("a")).await.unwrap();

            assert!(session.exec("ls").await.is_err());
            assert!(session.is_closed());
        }

        #[tokio::test]
        async fn test_mock_session_close() {
            let connector = MockConnector::new();
            let session = connector.connect(&host("a")).await.unwrap();
            assert!(!session.is_closed());
            session.close().await.unwrap();
            assert!(session.is_closed());
            assert_eq!(session.state.close_calls.load(Ordering::SeqCst), 1);
        }
    }
}
