//! Handshake resource records.
//!
//! A record travels as `varint(type) || varint(len) || data`; the proof
//! leaf hashes exactly this encoding, so it is canonical. Glue uses the
//! Handshake-native `"<ns-name>\0<ip-ascii>"` form under the NS type and
//! splits into an NS plus a matching A/AAAA on conversion.

use std::net::IpAddr;

use sha2::{Digest, Sha256};
use shared_types::{read_varint, write_varint, NameHash};

use super::errors::ResolveError;

/// Record types the client handles.
pub mod rtype {
    /// IPv4 address.
    pub const A: u16 = 1;
    /// Nameserver delegation.
    pub const NS: u16 = 2;
    /// Canonical name.
    pub const CNAME: u16 = 5;
    /// IPv6 address.
    pub const AAAA: u16 = 28;
    /// TLS association.
    pub const TLSA: u16 = 52;
}

/// SHA-256 of the lowercased name without its trailing dot: the key into
/// the name tree.
pub fn name_hash(name: &str) -> NameHash {
    let normalized = name.trim_end_matches('.').to_ascii_lowercase();
    let digest = Sha256::digest(normalized.as_bytes());
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// One resource record from a name's tree entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resource {
    /// Record type.
    pub rtype: u16,
    /// Raw record data.
    pub data: Vec<u8>,
}

impl Resource {
    /// Canonical encoding, as hashed into the proof leaf.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + self.data.len());
        write_varint(&mut out, self.rtype as u64);
        write_varint(&mut out, self.data.len() as u64);
        out.extend_from_slice(&self.data);
        out
    }

    /// Decode one canonical record entry; the entry must be exactly
    /// consumed.
    pub fn decode(entry: &[u8]) -> Result<Self, ResolveError> {
        let (rtype, used_type) = read_varint(entry).map_err(|e| ResolveError::Format {
            reason: format!("record type: {}", e),
        })?;
        let rtype = u16::try_from(rtype).map_err(|_| ResolveError::Format {
            reason: format!("record type {} out of range", rtype),
        })?;
        let (len, used_len) = read_varint(&entry[used_type..]).map_err(|e| ResolveError::Format {
            reason: format!("record length: {}", e),
        })?;
        let start = used_type + used_len;
        let end = start + len as usize;
        if entry.len() != end {
            return Err(ResolveError::Format {
                reason: format!("record entry is {} bytes, encoding says {}", entry.len(), end),
            });
        }
        Ok(Self {
            rtype,
            data: entry[start..end].to_vec(),
        })
    }

    /// Split Handshake-native glue: `"<ns-name>\0<ip-ascii>"`. Returns
    /// the nameserver name and its address.
    pub fn parse_glue(&self) -> Option<(String, IpAddr)> {
        if self.rtype != rtype::NS {
            return None;
        }
        let sep = self.data.iter().position(|&b| b == 0)?;
        let ns = std::str::from_utf8(&self.data[..sep]).ok()?;
        let ip = std::str::from_utf8(&self.data[sep + 1..]).ok()?;
        let ip: IpAddr = ip.parse().ok()?;
        Some((ns.to_string(), ip))
    }

    /// The nameserver name for an NS record, glue or plain.
    pub fn ns_name(&self) -> Option<String> {
        if self.rtype != rtype::NS {
            return None;
        }
        match self.parse_glue() {
            Some((ns, _)) => Some(ns),
            None => std::str::from_utf8(&self.data).ok().map(str::to_string),
        }
    }

    /// The address carried by an A or AAAA record.
    pub fn ip(&self) -> Option<IpAddr> {
        match (self.rtype, self.data.len()) {
            (rtype::A, 4) => {
                let o: [u8; 4] = self.data.as_slice().try_into().ok()?;
                Some(IpAddr::from(o))
            }
            (rtype::AAAA, 16) => {
                let o: [u8; 16] = self.data.as_slice().try_into().ok()?;
                Some(IpAddr::from(o))
            }
            _ => None,
        }
    }
}

/// Decode every record entry of a proof envelope.
pub fn decode_records(entries: &[Vec<u8>]) -> Result<Vec<Resource>, ResolveError> {
    entries.iter().map(|e| Resource::decode(e)).collect()
}
