//! Resolver configuration.

use serde::{Deserialize, Serialize};

/// Knobs for the name query scheduler and the DNS pipeline.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Parallel `getproof` requests per batch.
    pub name_query_threads: usize,

    /// Fallback TTL in seconds when answers carry none.
    pub dns_cache_ttl_seconds: u64,

    /// Recursion cap for glue and CNAME chasing.
    pub max_recursion_depth: u32,

    /// Deadline for one UDP follow-up query, in milliseconds.
    pub udp_timeout_ms: u64,

    /// Entries in the verified-proof cache.
    pub proof_cache_size: usize,

    /// Entries in the DNS response cache.
    pub response_cache_size: usize,

    /// Port glue nameservers are queried on.
    pub glue_port: u16,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            name_query_threads: 4,
            dns_cache_ttl_seconds: 300,
            max_recursion_depth: 10,
            udp_timeout_ms: 3_000,
            proof_cache_size: 256,
            response_cache_size: 512,
            glue_port: 53,
        }
    }
}

impl ResolverConfig {
    /// Config for tests: short deadlines, tiny caches.
    pub fn for_testing() -> Self {
        Self {
            dns_cache_ttl_seconds: 1,
            udp_timeout_ms: 500,
            proof_cache_size: 8,
            response_cache_size: 8,
            ..Self::default()
        }
    }
}
