//! TCP reachability checks for the host report.
//!
//! Advisory only: a reachable port says nothing about SSH authentication.

use std::collections::HashMap;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::task::JoinSet;
use tokio::time::{Instant, timeout_at};
use tracing::debug;

use crate::config::HostRecord;

/// Probe every host concurrently.
///
/// All probes share one deadline, so the call returns within `timeout`
/// however many hosts there are. Errors and timeouts count as unreachable.
pub async fn probe_many<'a, I>(hosts: I, timeout: Duration) -> HashMap<String, bool>
where
    I: IntoIterator<Item = &'a HostRecord>,
{
    let deadline = Instant::now() + timeout;
    let mut results = HashMap::new();
    let mut probes = JoinSet::new();

    for host in hosts {
        results.insert(host.name.clone(), false);
        let name = host.name.clone();
        let address = host.address.clone();
        let port = host.port;
        probes.spawn(async move {
            let reachable = matches!(
                timeout_at(deadline, TcpStream::connect((address.as_str(), port))).await,
                Ok(Ok(_))
            );
            debug!(host = %name, address = %address, port, reachable, "Probed host");
            (name, reachable)
        });
    }

    let collected = timeout_at(deadline, async {
        while let Some(joined) = probes.join_next().await {
            if let Ok((name, reachable)) = joined {
                results.insert(name, reachable);
            }
        }
    })
    .await;

    if collected.is_err() {
        probes.abort_all();
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_probe_open_and_closed_ports() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let open = listener.local_addr().unwrap().port();
        let closed = {
            let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            l.local_addr().unwrap().port()
        };

        let hosts = [
            HostRecord::new("up", "127.0.0.1").with_port(open),
            HostRecord::new("down", "127.0.0.1").with_port(closed),
        ];
        let results = probe_many(&hosts, Duration::from_millis(500)).await;

        assert_eq!(results.len(), 2);
        assert!(results["up"]);
        assert!(!results["down"]);
    }

    #[tokio::test]
    async fn test_probe_empty() {
        let hosts: Vec<HostRecord> = Vec::new();
        let results = probe_many(&hosts, Duration::from_millis(50)).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_probe_unresolvable_is_false() {
        let hosts = [HostRecord::new("bad", "host.invalid")];
        let start = std::time::Instant::now();
        let results = probe_many(&hosts, Duration::from_millis(200)).await;
        assert!(!results["bad"]);
        assert!(start.elapsed() < Duration::from_secs(2));
    }
}
