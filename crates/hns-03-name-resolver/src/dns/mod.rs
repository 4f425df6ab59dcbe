//! Minimal DNS wire handling and the response cache.

pub mod cache;
pub mod wire;

pub use cache::{CacheKey, ResponseCache};
pub use wire::{qclass, qtype, rcode, DnsMessage, DnsRecord, Question};
