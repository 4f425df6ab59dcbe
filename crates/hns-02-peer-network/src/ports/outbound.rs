//! Outbound ports: where addresses come from.
//!
//! DNS-seed lookup and the DHT walker are external collaborators; the
//! directory only sees this trait. The static implementation covers the
//! embedded bootstrap list and tests.

use std::net::SocketAddr;

use async_trait::async_trait;

/// Anything that can produce candidate peer addresses.
#[async_trait]
pub trait SeedSource: Send + Sync {
    /// Look candidate addresses up. Failures surface as an empty list;
    /// seeding is best-effort by design of the caller.
    async fn lookup(&self) -> Vec<SocketAddr>;

    /// Identifier for log lines.
    fn source_id(&self) -> &str;
}

/// A fixed list of addresses.
pub struct StaticSeeds {
    addrs: Vec<SocketAddr>,
    id: String,
}

impl StaticSeeds {
    /// Wrap a fixed address list.
    pub fn new(addrs: Vec<SocketAddr>, id: impl Into<String>) -> Self {
        Self {
            addrs,
            id: id.into(),
        }
    }

    /// Parse a `"host:port"` string list, skipping entries that do not
    /// parse.
    pub fn parse(entries: &[&str], id: impl Into<String>) -> Self {
        let addrs = entries.iter().filter_map(|e| e.parse().ok()).collect();
        Self::new(addrs, id)
    }
}

#[async_trait]
impl SeedSource for StaticSeeds {
    async fn lookup(&self) -> Vec<SocketAddr> {
        self.addrs.clone()
    }

    fn source_id(&self) -> &str {
        &self.id
    }
}

/// DNS seeds: resolve well-known seed hostnames and point every address
/// at the network's P2P port.
pub struct DnsSeeds {
    hosts: Vec<String>,
    port: u16,
}

impl DnsSeeds {
    /// Seed from these hostnames, on the given P2P port.
    pub fn new(hosts: Vec<String>, port: u16) -> Self {
        Self { hosts, port }
    }
}

#[async_trait]
impl SeedSource for DnsSeeds {
    async fn lookup(&self) -> Vec<SocketAddr> {
        let mut out = Vec::new();
        for host in &self.hosts {
            match tokio::net::lookup_host((host.as_str(), self.port)).await {
                Ok(addrs) => out.extend(addrs),
                Err(e) => {
                    tracing::debug!("[hns-02] seed lookup {} failed: {}", host, e);
                }
            }
        }
        out.sort_unstable();
        out.dedup();
        out
    }

    fn source_id(&self) -> &str {
        "dns-seeds"
    }
}
