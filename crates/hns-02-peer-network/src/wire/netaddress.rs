//! The 88-byte network address record.
//!
//! `time(8) || services(8) || type(1) || ip(36) || port(2) || key(33)`,
//! little-endian integers. IPv4 maps into the first 16 ip bytes as
//! `::ffff:a.b.c.d`; the remaining 20 are zero. `key` stays zero for
//! address-only peers (no encrypted transport).

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use crate::domain::NetError;

/// Serialized size.
pub const NETADDRESS_SIZE: usize = 88;

const V4_MAPPED_PREFIX: [u8; 12] = [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0xff, 0xff];

/// A peer address as carried in `version` and `addr` messages.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetAddress {
    /// Last-seen time the sender claims, unix seconds.
    pub time: u64,
    /// Services bitfield the sender claims for this peer.
    pub services: u64,
    /// Host and port.
    pub addr: SocketAddr,
    /// Identity key; zero for address-only peers.
    pub key: [u8; 33],
}

impl NetAddress {
    /// An address-only record (zero key) for `addr`.
    pub fn plain(addr: SocketAddr, time: u64) -> Self {
        Self {
            time,
            services: 0,
            addr,
            key: [0u8; 33],
        }
    }

    /// Serialize to the fixed 88-byte layout.
    pub fn encode(&self) -> [u8; NETADDRESS_SIZE] {
        let mut out = [0u8; NETADDRESS_SIZE];
        out[0..8].copy_from_slice(&self.time.to_le_bytes());
        out[8..16].copy_from_slice(&self.services.to_le_bytes());
        out[16] = 0; // address type: raw ip
        let ip_bytes: [u8; 16] = match self.addr.ip() {
            IpAddr::V4(v4) => {
                let mut mapped = [0u8; 16];
                mapped[..12].copy_from_slice(&V4_MAPPED_PREFIX);
                mapped[12..].copy_from_slice(&v4.octets());
                mapped
            }
            IpAddr::V6(v6) => v6.octets(),
        };
        out[17..33].copy_from_slice(&ip_bytes);
        // bytes 33..53 stay zero (ip field is 36 bytes wide)
        out[53..55].copy_from_slice(&self.addr.port().to_le_bytes());
        out[55..88].copy_from_slice(&self.key);
        out
    }

    /// Decode from exactly 88 bytes.
    pub fn decode(buf: &[u8]) -> Result<Self, NetError> {
        if buf.len() != NETADDRESS_SIZE {
            return Err(NetError::Format {
                reason: format!("netaddress length {} != {}", buf.len(), NETADDRESS_SIZE),
            });
        }

        let time = u64::from_le_bytes(buf[0..8].try_into().expect("8 bytes"));
        let services = u64::from_le_bytes(buf[8..16].try_into().expect("8 bytes"));

        let mut ip_bytes = [0u8; 16];
        ip_bytes.copy_from_slice(&buf[17..33]);
        let ip = if ip_bytes[..12] == V4_MAPPED_PREFIX {
            IpAddr::V4(Ipv4Addr::new(
                ip_bytes[12],
                ip_bytes[13],
                ip_bytes[14],
                ip_bytes[15],
            ))
        } else {
            IpAddr::V6(Ipv6Addr::from(ip_bytes))
        };

        let port = u16::from_le_bytes(buf[53..55].try_into().expect("2 bytes"));
        let mut key = [0u8; 33];
        key.copy_from_slice(&buf[55..88]);

        Ok(Self {
            time,
            services,
            addr: SocketAddr::new(ip, port),
            key,
        })
    }
}
