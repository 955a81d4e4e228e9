//! Opt-in LAN sweep across private subnets.
//!
//! One subnet at a time; each host in the subnet gets its own probe task
//! with a hard 150ms-class timeout, all tasks for the batch are spawned into
//! a `JoinSet` and the batch is bounded by the subnet's host count (at most
//! 254). The first match wins; remaining in-flight probes are detached
//! rather than awaited.

use std::time::Duration;

use tokio::net::TcpStream;
use tokio::task::JoinSet;

use super::{DiscoveryEngine, Provider, ServiceDescriptor};

/// Private /24 bases swept, in order. Deliberately short; broad scanning is
/// gated behind the explicit LAN opt-in at the CLI.
const SUBNET_BASES: &[&str] = &["192.168.0", "192.168.1", "10.0.0"];

/// Hosts probed per subnet batch.
const HOSTS_PER_SUBNET: u8 = 254;

/// Sweep the known private subnets for any provider not in `skip`.
/// Returns the first match found, or `None`; never an error.
pub async fn sweep(engine: &DiscoveryEngine, skip: &[Provider]) -> Option<ServiceDescriptor> {
    let ports: Vec<(Provider, u16)> = Provider::ALL
        .iter()
        .copied()
        .filter(|p| !skip.contains(p))
        .filter_map(|p| p.candidate_ports().first().map(|port| (p, *port)))
        .collect();
    if ports.is_empty() {
        return None;
    }

    for base in SUBNET_BASES {
        tracing::debug!("Sweeping subnet {base}.0/24");
        let hosts: Vec<(String, Vec<(Provider, u16)>)> = (1..=HOSTS_PER_SUBNET)
            .map(|octet| (format!("{base}.{octet}"), ports.clone()))
            .collect();
        if let Some(hit) = sweep_batch(engine, hosts).await {
            return Some(hit);
        }
    }
    None
}

/// Probe one bounded batch: a task per host, joined as a set, first hit
/// wins. Each host entry carries the `(provider, port)` pairs to try on it.
pub async fn sweep_batch(
    engine: &DiscoveryEngine,
    hosts: Vec<(String, Vec<(Provider, u16)>)>,
) -> Option<ServiceDescriptor> {
    let timeout = engine.lan_timeout();
    let mut tasks = JoinSet::new();
    for (host, candidates) in hosts {
        tasks.spawn(async move { probe_lan_host(host, candidates, timeout).await });
    }

    while let Some(result) = tasks.join_next().await {
        if let Ok(Some((host, provider, port))) = result {
            // Confirm over HTTP and collect models; in-flight siblings are
            // left to finish on their own.
            tasks.detach_all();
            return engine
                .probe(provider, &host, port, timeout.max(Duration::from_millis(500)))
                .await;
        }
    }
    None
}

/// Cheap TCP connect check against each candidate port for one host. HTTP
/// confirmation happens only after a socket accepts.
async fn probe_lan_host(
    host: String,
    candidates: Vec<(Provider, u16)>,
    timeout: Duration,
) -> Option<(String, Provider, u16)> {
    for (provider, port) in candidates {
        let addr = format!("{host}:{port}");
        let connect = tokio::time::timeout(timeout, TcpStream::connect(&addr)).await;
        if matches!(connect, Ok(Ok(_))) {
            return Some((host, provider, port));
        }
    }
    None
}
