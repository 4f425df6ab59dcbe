//! The recursive resolution pipeline.
//!
//! A question either names a TLD that lives in the blockchain (answered
//! from verified records: NS to AUTHORITY, glue to ADDITIONAL) or a
//! subdomain under one (answered by querying the TLD's glue nameservers
//! over UDP, IPv4 before IPv6). Proof verification failures are SERVFAIL
//! and never fall through to upstream; a TLD absent from the chain
//! returns the `NotHandshake` sentinel and upstream handling stays
//! outside the core.

use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lru::LruCache;
use rand::Rng;
use shared_types::{Hash, NameHash};
use tokio::net::UdpSocket;
use tokio::time::timeout;

use crate::config::ResolverConfig;
use crate::dns::wire::{name_rdata, qclass, qtype, rcode, DnsMessage, DnsRecord, Question};
use crate::dns::{CacheKey, ResponseCache};
use crate::domain::{name_hash, rtype, ResolveError, Resource};
use crate::ports::{ProofNetwork, TipSource};
use crate::query::{query_name, QueryResult};

/// Transaction id placeholder in responses we mint; the DoH/DoT server
/// rewrites it to the incoming query's id.
const PLACEHOLDER_ID: u16 = 0;

/// What `resolve` hands back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// A complete DNS response, wire bytes, placeholder transaction id.
    Answer(Vec<u8>),
    /// The TLD is not claimed by Handshake; the caller may go upstream.
    NotHandshake,
}

enum TldOutcome {
    Records(Vec<Resource>),
    NotFound,
    Failed,
}

/// The resolution pipeline.
pub struct RecursiveResolver {
    network: Arc<dyn ProofNetwork>,
    tip: Arc<dyn TipSource>,
    config: ResolverConfig,
    cache: Mutex<ResponseCache>,
    proof_cache: Mutex<LruCache<(NameHash, Hash), Vec<Resource>>>,
}

impl RecursiveResolver {
    /// Wire the pipeline up.
    pub fn new(
        network: Arc<dyn ProofNetwork>,
        tip: Arc<dyn TipSource>,
        config: ResolverConfig,
    ) -> Self {
        let proof_capacity =
            NonZeroUsize::new(config.proof_cache_size.max(1)).expect("max(1) is non-zero");
        Self {
            cache: Mutex::new(ResponseCache::new(config.response_cache_size)),
            proof_cache: Mutex::new(LruCache::new(proof_capacity)),
            network,
            tip,
            config,
        }
    }

    /// Resolve a question into wire bytes (or the upstream sentinel).
    pub async fn resolve(
        &self,
        qname: &str,
        qtype_: u16,
        qclass_: u16,
    ) -> Result<Resolution, ResolveError> {
        if qclass_ != qclass::IN {
            return Err(ResolveError::BadQuestion {
                reason: format!("class {} unsupported", qclass_),
            });
        }
        let name = qname.trim_end_matches('.').to_ascii_lowercase();
        if name.is_empty() {
            return Err(ResolveError::BadQuestion {
                reason: "empty name".to_string(),
            });
        }

        let key: CacheKey = (name.clone(), qtype_, qclass_);
        if let Some(bytes) = self.cache.lock().expect("cache lock").get(&key, PLACEHOLDER_ID) {
            tracing::debug!("[hns-03] cache hit for {} type {}", name, qtype_);
            return Ok(Resolution::Answer(bytes));
        }

        self.resolve_inner(&name, qtype_, 0).await
    }

    fn resolve_boxed<'a>(
        &'a self,
        name: &'a str,
        qtype_: u16,
        depth: u32,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Resolution, ResolveError>> + Send + 'a>,
    > {
        Box::pin(self.resolve_inner(name, qtype_, depth))
    }

    async fn resolve_inner(
        &self,
        name: &str,
        qtype_: u16,
        depth: u32,
    ) -> Result<Resolution, ResolveError> {
        if depth >= self.config.max_recursion_depth {
            tracing::warn!("[hns-03] recursion depth cap hit resolving {}", name);
            return Ok(Resolution::Answer(self.servfail(name, qtype_)));
        }

        let tld = name.rsplit('.').next().expect("non-empty name");
        let records = match self.query_tld(tld).await {
            TldOutcome::Records(records) => records,
            TldOutcome::NotFound => return Ok(Resolution::NotHandshake),
            TldOutcome::Failed => {
                let key: CacheKey = (name.to_string(), qtype_, qclass::IN);
                self.cache.lock().expect("cache lock").invalidate(&key);
                return Ok(Resolution::Answer(self.servfail(name, qtype_)));
            }
        };

        if name == tld {
            self.answer_tld(name, qtype_, &records, depth).await
        } else {
            self.answer_subdomain(name, qtype_, &records).await
        }
    }

    /// The question names the TLD itself: answers from the verified
    /// record set, NS into AUTHORITY with glue in ADDITIONAL.
    async fn answer_tld(
        &self,
        name: &str,
        qtype_: u16,
        records: &[Resource],
        depth: u32,
    ) -> Result<Resolution, ResolveError> {
        let ttl = self.config.dns_cache_ttl_seconds as u32;
        let mut response = DnsMessage::response(
            PLACEHOLDER_ID,
            Question {
                name: name.to_string(),
                qtype: qtype_,
                qclass: qclass::IN,
            },
            rcode::NOERROR,
        );

        for record in records {
            match record.rtype {
                rtype::A | rtype::AAAA | rtype::TLSA if record.rtype == qtype_ => {
                    response.answers.push(DnsRecord {
                        name: name.to_string(),
                        rtype: record.rtype,
                        class: qclass::IN,
                        ttl,
                        rdata: record.data.clone(),
                    });
                }
                rtype::NS => {
                    if let Some(ns) = record.ns_name() {
                        response.authority.push(DnsRecord {
                            name: name.to_string(),
                            rtype: qtype::NS,
                            class: qclass::IN,
                            ttl,
                            rdata: name_rdata(&ns),
                        });
                    }
                    if let Some((ns, ip)) = record.parse_glue() {
                        response.additional.push(glue_record(&ns, ip, ttl));
                    }
                }
                _ => {}
            }
        }

        // CNAME: answer it directly when asked for; otherwise follow it
        // when nothing else answered the question.
        if let Some(cname) = records
            .iter()
            .find(|r| r.rtype == rtype::CNAME)
            .and_then(|r| std::str::from_utf8(&r.data).ok())
            .map(str::to_string)
        {
            if qtype_ == rtype::CNAME || response.answers.is_empty() {
                response.answers.push(DnsRecord {
                    name: name.to_string(),
                    rtype: qtype::CNAME,
                    class: qclass::IN,
                    ttl,
                    rdata: name_rdata(&cname),
                });
                if qtype_ != rtype::CNAME {
                    if let Resolution::Answer(bytes) =
                        self.resolve_boxed(&cname, qtype_, depth + 1).await?
                    {
                        if let Ok(chased) = DnsMessage::decode(&bytes) {
                            if chased.rcode() == rcode::NOERROR {
                                response.answers.extend(chased.answers);
                            }
                        }
                    }
                }
            }
        }

        let bytes = response.encode();
        self.cache_response(name, qtype_, &response, &bytes);
        Ok(Resolution::Answer(bytes))
    }

    /// The question is below the TLD: chase the TLD's glue nameservers
    /// over UDP, IPv4 targets before IPv6.
    async fn answer_subdomain(
        &self,
        name: &str,
        qtype_: u16,
        records: &[Resource],
    ) -> Result<Resolution, ResolveError> {
        let mut targets: Vec<IpAddr> = records
            .iter()
            .filter_map(Resource::parse_glue)
            .map(|(_, ip)| ip)
            .chain(records.iter().filter_map(Resource::ip))
            .collect();
        targets.sort_by_key(|ip| match ip {
            IpAddr::V4(_) => 0,
            IpAddr::V6(_) => 1,
        });
        targets.dedup();

        if targets.is_empty() {
            tracing::warn!("[hns-03] {} delegated but no glue addresses", name);
            return Ok(Resolution::Answer(self.servfail(name, qtype_)));
        }

        for ip in targets {
            match self.udp_query(ip, name, qtype_).await {
                Ok(mut reply) if reply.rcode() == rcode::NOERROR && !reply.answers.is_empty() => {
                    reply.id = PLACEHOLDER_ID;
                    let bytes = reply.encode();
                    self.cache_response(name, qtype_, &reply, &bytes);
                    return Ok(Resolution::Answer(bytes));
                }
                Ok(mut reply) if reply.rcode() == rcode::NXDOMAIN => {
                    // authoritative denial from the zone's own server
                    reply.id = PLACEHOLDER_ID;
                    let bytes = reply.encode();
                    self.cache_response(name, qtype_, &reply, &bytes);
                    return Ok(Resolution::Answer(bytes));
                }
                Ok(_) => continue,
                Err(e) => {
                    tracing::debug!("[hns-03] glue {} failed for {}: {}", ip, name, e);
                    continue;
                }
            }
        }

        let key: CacheKey = (name.to_string(), qtype_, qclass::IN);
        self.cache.lock().expect("cache lock").invalidate(&key);
        Ok(Resolution::Answer(self.servfail(name, qtype_)))
    }

    async fn query_tld(&self, tld: &str) -> TldOutcome {
        let tip = self.tip.tip();
        let nh = name_hash(tld);
        let cache_key = (nh, tip.name_root);

        if let Some(records) = self
            .proof_cache
            .lock()
            .expect("proof cache lock")
            .get(&cache_key)
            .cloned()
        {
            return TldOutcome::Records(records);
        }

        match query_name(
            Arc::clone(&self.network),
            nh,
            tip.name_root,
            self.config.name_query_threads,
        )
        .await
        {
            QueryResult::Success { records, .. } => {
                self.proof_cache
                    .lock()
                    .expect("proof cache lock")
                    .put(cache_key, records.clone());
                TldOutcome::Records(records)
            }
            QueryResult::NotFound => TldOutcome::NotFound,
            QueryResult::Failed => TldOutcome::Failed,
        }
    }

    async fn udp_query(
        &self,
        ip: IpAddr,
        name: &str,
        qtype_: u16,
    ) -> Result<DnsMessage, ResolveError> {
        let id: u16 = rand::thread_rng().gen();
        let query = DnsMessage::query(id, name, qtype_).encode();

        let bind_addr: SocketAddr = match ip {
            IpAddr::V4(_) => "0.0.0.0:0".parse().expect("literal"),
            IpAddr::V6(_) => "[::]:0".parse().expect("literal"),
        };
        let socket = UdpSocket::bind(bind_addr).await?;
        let target = SocketAddr::new(ip, self.config.glue_port);
        socket.send_to(&query, target).await?;

        let deadline = Duration::from_millis(self.config.udp_timeout_ms);
        let mut buf = vec![0u8; 4096];
        let reply = timeout(deadline, async {
            loop {
                let (n, from) = socket.recv_from(&mut buf).await?;
                if from != target {
                    continue;
                }
                let message = match DnsMessage::decode(&buf[..n]) {
                    Ok(m) => m,
                    Err(_) => continue,
                };
                if message.id == id && message.is_response() {
                    return Ok::<_, ResolveError>(message);
                }
            }
        })
        .await
        .map_err(|_| ResolveError::Network {
            message: format!("udp query to {} timed out", target),
        })??;

        Ok(reply)
    }

    fn cache_response(&self, name: &str, qtype_: u16, message: &DnsMessage, bytes: &[u8]) {
        let ttl = message
            .min_answer_ttl()
            .map(u64::from)
            .unwrap_or(self.config.dns_cache_ttl_seconds)
            .min(self.config.dns_cache_ttl_seconds.max(1) * 24);
        let key: CacheKey = (name.to_string(), qtype_, qclass::IN);
        self.cache
            .lock()
            .expect("cache lock")
            .put(key, bytes.to_vec(), Duration::from_secs(ttl));
    }

    fn servfail(&self, name: &str, qtype_: u16) -> Vec<u8> {
        DnsMessage::response(
            PLACEHOLDER_ID,
            Question {
                name: name.to_string(),
                qtype: qtype_,
                qclass: qclass::IN,
            },
            rcode::SERVFAIL,
        )
        .encode()
    }
}

fn glue_record(ns: &str, ip: IpAddr, ttl: u32) -> DnsRecord {
    let (rtype_, rdata) = match ip {
        IpAddr::V4(v4) => (qtype::A, v4.octets().to_vec()),
        IpAddr::V6(v6) => (qtype::AAAA, v6.octets().to_vec()),
    };
    DnsRecord {
        name: ns.to_string(),
        rtype: rtype_,
        class: qclass::IN,
        ttl,
        rdata,
    }
}
