//! Scripted SSH connector shared by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use mcp_ssh_inspector::config::{HostRecord, HostRegistry, LimitsConfig};
use mcp_ssh_inspector::security::CommandPolicy;
use mcp_ssh_inspector::ssh::{ConnectionPool, PoolConfig};
use mcp_ssh_inspector::{ExecOutput, InspectError, Inspector, RemoteSession, SshConnector};

/// Connector whose sessions answer commands from a substring table
#[derive(Default)]
pub struct ScriptedConnector {
    responses: Mutex<Vec<(String, ExecOutput)>>,
    latency: Mutex<Option<Duration>>,
    exec_delay: Mutex<Option<Duration>>,
    connects: Mutex<Vec<String>>,
    sessions: Mutex<Vec<Arc<ScriptedSession>>>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, pattern: &str, output: ExecOutput) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push((pattern.to_string(), output));
        self
    }

    pub fn with_latency(self, latency: Duration) -> Self {
        *self.latency.lock().unwrap() = Some(latency);
        self
    }

    pub fn with_exec_delay(self, delay: Duration) -> Self {
        *self.exec_delay.lock().unwrap() = Some(delay);
        self
    }

    pub fn connects(&self) -> Vec<String> {
        self.connects.lock().unwrap().clone()
    }

    /// Every session opened so far, oldest first
    pub fn sessions(&self) -> Vec<Arc<ScriptedSession>> {
        self.sessions.lock().unwrap().clone()
    }
}

pub struct ScriptedSession {
    host_name: String,
    responses: Vec<(String, ExecOutput)>,
    exec_delay: Option<Duration>,
    closed: AtomicBool,
    pub close_calls: AtomicUsize,
    pub commands: Mutex<Vec<String>>,
}

impl ScriptedSession {
    pub fn closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Shared handle so the test keeps observing what the pool holds
pub struct SharedSession(pub Arc<ScriptedSession>);

#[async_trait]
impl SshConnector for ScriptedConnector {
    type Session = SharedSession;

    async fn connect(&self, host: &HostRecord) -> Result<SharedSession, InspectError> {
        self.connects.lock().unwrap().push(host.name.clone());
        let latency = *self.latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let session = Arc::new(ScriptedSession {
            host_name: host.name.clone(),
            responses: self.responses.lock().unwrap().clone(),
            exec_delay: *self.exec_delay.lock().unwrap(),
            closed: AtomicBool::new(false),
            close_calls: AtomicUsize::new(0),
            commands: Mutex::new(Vec::new()),
        });
        self.sessions.lock().unwrap().push(Arc::clone(&session));
        Ok(SharedSession(session))
    }
}

#[async_trait]
impl RemoteSession for SharedSession {
    async fn exec(&self, command: &str) -> Result<ExecOutput, InspectError> {
        self.0.commands.lock().unwrap().push(command.to_string());
        if let Some(delay) = self.0.exec_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self
            .0
            .responses
            .iter()
            .find(|(pattern, _)| command.contains(pattern.as_str()))
            .map_or_else(|| ExecOutput::ok(""), |(_, output)| output.clone()))
    }

    fn is_closed(&self) -> bool {
        self.0.closed()
    }

    fn host_name(&self) -> &str {
        &self.0.host_name
    }

    async fn close(&self) -> Result<(), InspectError> {
        self.0.close_calls.fetch_add(1, Ordering::SeqCst);
        self.0.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

pub fn inspector(
    connector: ScriptedConnector,
    hosts: Vec<HostRecord>,
    pool: PoolConfig,
    limits: LimitsConfig,
) -> Inspector<ScriptedConnector> {
    Inspector::new(
        HostRegistry::from_records(hosts),
        Arc::new(ConnectionPool::new(connector, pool)),
        CommandPolicy::permit_all(),
        limits,
    )
}
