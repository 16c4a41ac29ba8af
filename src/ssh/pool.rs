//! Connection pool: at most one live session per host.
//!
//! Two lock tiers:
//! - the registry lock, a synchronous mutex over the LRU map, held only for
//!   map reads and writes and never across an `.await`;
//! - one async lock per host, held across the connect sequence so callers for
//!   the same host serialize while different hosts connect in parallel.
//!
//! Lock order is always host lock, then registry lock. Evicting the LRU entry
//! on insert does not take the victim's host lock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use lru::LruCache;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::HostRecord;
use crate::error::{InspectError, Result};
use crate::ports::{RemoteSession, SshConnector};

/// A pooled session with usage metadata
struct PooledConnection<S> {
    session: Arc<S>,
    last_used: Instant,
    use_count: u64,
}

impl<S: RemoteSession> PooledConnection<S> {
    fn new(session: Arc<S>) -> Self {
        Self {
            session,
            last_used: Instant::now(),
            use_count: 1,
        }
    }

    fn touch(&mut self) -> Arc<S> {
        self.last_used = Instant::now();
        self.use_count += 1;
        Arc::clone(&self.session)
    }

    fn idle_time(&self) -> Duration {
        self.last_used.elapsed()
    }

    fn is_evictable(&self, idle_timeout: Duration) -> bool {
        self.session.is_closed() || self.idle_time() >= idle_timeout
    }
}

/// Configuration for the connection pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Maximum number of pooled connections across all hosts
    pub max_size: usize,
    /// Idle time after which a connection is closed by eviction
    pub idle_timeout_seconds: u64,
    /// Period of the background eviction task
    pub eviction_interval_seconds: u64,
    /// Bound on one connect attempt
    pub connect_timeout_seconds: u64,
    /// Bound on waiting for connections to close at shutdown
    pub close_timeout_seconds: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 10,
            idle_timeout_seconds: 300,
            eviction_interval_seconds: 60,
            connect_timeout_seconds: 10,
            close_timeout_seconds: 5,
        }
    }
}

/// Usage of one pooled host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostUsage {
    pub host: String,
    pub use_count: u64,
    pub idle_seconds: u64,
}

/// Pool statistics
#[derive(Debug, Clone)]
pub struct PoolStats {
    pub size: usize,
    pub max_size: usize,
    /// Least recently used first
    pub hosts: Vec<HostUsage>,
}

/// SSH connection pool keyed by host name
pub struct ConnectionPool<C: SshConnector> {
    connector: C,
    config: PoolConfig,
    connections: Mutex<LruCache<String, PooledConnection<C::Session>>>,
    host_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    shutdown: CancellationToken,
    eviction_task: Mutex<Option<JoinHandle<()>>>,
}

impl<C: SshConnector> ConnectionPool<C> {
    #[must_use]
    pub fn new(connector: C, config: PoolConfig) -> Self {
        Self {
            connector,
            config,
            connections: Mutex::new(LruCache::unbounded()),
            host_locks: Mutex::new(HashMap::new()),
            shutdown: CancellationToken::new(),
            eviction_task: Mutex::new(None),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &PoolConfig {
        &self.config
    }

    #[must_use]
    pub const fn connector(&self) -> &C {
        &self.connector
    }

    fn registry(&self) -> MutexGuard<'_, LruCache<String, PooledConnection<C::Session>>> {
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Per-host lock, created on first use and kept for the pool's lifetime
    fn host_lock(&self, host_name: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .host_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(host_name.to_string()).or_default())
    }

    /// Live pooled session for `host_name`, marked as used. No I/O.
    fn reuse(&self, host_name: &str) -> Option<Arc<C::Session>> {
        let mut connections = self.registry();
        match connections.get_mut(host_name) {
            Some(entry) if !entry.session.is_closed() => Some(entry.touch()),
            _ => None,
        }
    }

    /// Get the session for `host`, connecting if needed.
    ///
    /// A pooled session that reports itself closed is closed, dropped and
    /// replaced. At capacity, the least recently used entry is closed first.
    ///
    /// # Errors
    ///
    /// Returns `ConnectFailed` on timeout, handshake, host key or
    /// authentication failure, `PoolExhausted` if the pool cannot hold any
    /// connection, and `PoolClosed` once [`close_all`](Self::close_all) has
    /// started.
    pub async fn acquire(&self, host: &HostRecord) -> Result<Arc<C::Session>> {
        if self.shutdown.is_cancelled() {
            return Err(InspectError::PoolClosed);
        }

        if let Some(session) = self.reuse(&host.name) {
            debug!(host = %host.name, "Reusing pooled connection");
            return Ok(session);
        }

        if self.config.max_size == 0 {
            return Err(InspectError::PoolExhausted { max: 0 });
        }

        let lock = self.host_lock(&host.name);
        let _guard = lock.lock().await;

        // Another caller may have connected while we waited
        if let Some(session) = self.reuse(&host.name) {
            debug!(host = %host.name, "Reusing connection opened by a concurrent caller");
            return Ok(session);
        }

        let stale = self.registry().pop(&host.name);
        if let Some(stale) = stale {
            info!(host = %host.name, uses = stale.use_count, "Replacing closed connection");
            self.close_session(&host.name, stale.session).await;
        }

        let session = Arc::new(self.connect(host).await?);

        // close_all cancels before draining, so checking under the registry
        // lock means the new session is either drained or never inserted
        let inserted = {
            let mut connections = self.registry();
            if self.shutdown.is_cancelled() {
                None
            } else {
                let evicted = if connections.len() >= self.config.max_size {
                    connections.pop_lru()
                } else {
                    None
                };
                connections.put(
                    host.name.clone(),
                    PooledConnection::new(Arc::clone(&session)),
                );
                Some(evicted)
            }
        };

        let Some(evicted) = inserted else {
            debug!(host = %host.name, "Pool shut down while connecting, closing new connection");
            self.close_session(&host.name, session).await;
            return Err(InspectError::PoolClosed);
        };

        if let Some((victim, entry)) = evicted {
            info!(host = %victim, uses = entry.use_count, "Pool full, evicting least recently used connection");
            self.close_session(&victim, entry.session).await;
        }

        Ok(session)
    }

    async fn connect(&self, host: &HostRecord) -> Result<C::Session> {
        let secs = self.config.connect_timeout_seconds;
        info!(host = %host.name, address = %host.address, port = host.port, "Opening SSH connection");

        match timeout(Duration::from_secs(secs), self.connector.connect(host)).await {
            Ok(Ok(session)) => Ok(session),
            Ok(Err(e @ InspectError::ConnectFailed { .. })) => {
                warn!(host = %host.name, error = %e, "Connection failed");
                Err(e)
            }
            Ok(Err(e)) => {
                warn!(host = %host.name, error = %e, "Connection failed");
                Err(InspectError::ConnectFailed {
                    host: host.name.clone(),
                    cause: e.to_string(),
                })
            }
            Err(_) => {
                warn!(host = %host.name, timeout_secs = secs, "Connection timed out");
                Err(InspectError::ConnectFailed {
                    host: host.name.clone(),
                    cause: format!("timed out after {secs}s"),
                })
            }
        }
    }

    async fn close_session(&self, host_name: &str, session: Arc<C::Session>) {
        let secs = self.config.close_timeout_seconds;
        match timeout(Duration::from_secs(secs), session.close()).await {
            Ok(Ok(())) => debug!(host = %host_name, "Connection closed"),
            Ok(Err(e)) => debug!(host = %host_name, error = %e, "Error while closing connection"),
            Err(_) => warn!(host = %host_name, "Timed out closing connection"),
        }
    }

    /// Close and forget the connection for `host_name`, if any.
    pub async fn remove(&self, host_name: &str) {
        let removed = self.registry().pop(host_name);
        if let Some(entry) = removed {
            debug!(host = %host_name, "Removing connection from pool");
            self.close_session(host_name, entry.session).await;
        }
    }

    /// Close connections idle past the timeout or already closed.
    ///
    /// Each candidate is re-checked under its host lock so an in-flight
    /// acquire for that host is never raced. Returns the number removed.
    pub async fn evict_idle(&self) -> usize {
        let idle_timeout = Duration::from_secs(self.config.idle_timeout_seconds);

        let candidates: Vec<String> = self
            .registry()
            .iter()
            .filter(|(_, entry)| entry.is_evictable(idle_timeout))
            .map(|(name, _)| name.clone())
            .collect();

        let mut evicted = 0;
        for host_name in candidates {
            let lock = self.host_lock(&host_name);
            let _guard = lock.lock().await;

            let entry = {
                let mut connections = self.registry();
                let still_evictable = connections
                    .peek(&host_name)
                    .is_some_and(|entry| entry.is_evictable(idle_timeout));
                if still_evictable {
                    connections.pop(&host_name)
                } else {
                    None
                }
            };

            if let Some(entry) = entry {
                debug!(host = %host_name, idle_secs = entry.idle_time().as_secs(), "Evicting idle connection");
                self.close_session(&host_name, entry.session).await;
                evicted += 1;
            }
        }

        if evicted > 0 {
            info!(evicted, "Idle connections evicted");
        }
        evicted
    }

    /// Start the periodic eviction task. Calling it again is a no-op.
    ///
    /// The task holds only a weak reference and stops when the pool is
    /// dropped or [`close_all`](Self::close_all) is called.
    pub fn start_eviction(self: &Arc<Self>) {
        let mut task = self
            .eviction_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if task.is_some() || self.shutdown.is_cancelled() {
            return;
        }

        let pool = Arc::downgrade(self);
        let token = self.shutdown.clone();
        let period = Duration::from_secs(self.config.eviction_interval_seconds.max(1));

        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(pool) = pool.upgrade() else { break };
                        tokio::select! {
                            () = token.cancelled() => break,
                            _ = pool.evict_idle() => {}
                        }
                    }
                }
            }
            debug!("Eviction task stopped");
        }));
    }

    /// Stop eviction and close every connection concurrently, waiting at
    /// most the configured close timeout.
    ///
    /// Afterwards `acquire` fails with `PoolClosed`, including calls that
    /// were already connecting.
    pub async fn close_all(&self) {
        self.shutdown.cancel();

        let task = self
            .eviction_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            // An eviction pass blocked on a slow close must not delay shutdown
            task.abort();
            let _ = task.await;
        }

        let drained: Vec<(String, Arc<C::Session>)> = {
            let mut connections = self.registry();
            let mut drained = Vec::with_capacity(connections.len());
            while let Some((name, entry)) = connections.pop_lru() {
                drained.push((name, entry.session));
            }
            drained
        };

        if drained.is_empty() {
            return;
        }

        let count = drained.len();
        let mut closes = JoinSet::new();
        for (name, session) in drained {
            closes.spawn(async move {
                if let Err(e) = session.close().await {
                    debug!(host = %name, error = %e, "Error while closing connection");
                }
            });
        }

        let secs = self.config.close_timeout_seconds;
        let all_closed = timeout(Duration::from_secs(secs), async {
            while closes.join_next().await.is_some() {}
        })
        .await;

        if all_closed.is_err() {
            warn!(remaining = closes.len(), timeout_secs = secs, "Gave up waiting for connections to close");
            closes.abort_all();
        }
        info!(count, "Connection pool closed");
    }

    /// Current pool contents, least recently used first
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let connections = self.registry();
        let hosts = connections
            .iter()
            .rev()
            .map(|(name, entry)| HostUsage {
                host: name.clone(),
                use_count: entry.use_count,
                idle_seconds: entry.idle_time().as_secs(),
            })
            .collect();

        PoolStats {
            size: connections.len(),
            max_size: self.config.max_size,
            hosts,
        }
    }

    /// Whether a connection for `host_name` is pooled
    #[must_use]
    pub fn contains(&self, host_name: &str) -> bool {
        self.registry().contains(host_name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.registry().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registry().is_empty()
    }
}

impl<C: SshConnector> Drop for ConnectionPool<C> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
