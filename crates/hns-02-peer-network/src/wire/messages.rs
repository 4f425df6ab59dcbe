//! Message payload codecs.
//!
//! Every message the client speaks. Headers travel as raw 236-byte
//! entries; this layer frames and counts them, the chain crate owns their
//! meaning. Unknown command codes decode to `Message::Unknown` and are
//! ignored upstream.

use shared_types::network::MAX_HEADERS_PER_MESSAGE;
use shared_types::{read_varint, write_varint, Hash};

use super::netaddress::{NetAddress, NETADDRESS_SIZE};
use crate::domain::NetError;

/// Command codes.
pub mod cmd {
    /// `version`
    pub const VERSION: u8 = 0;
    /// `verack`
    pub const VERACK: u8 = 1;
    /// `ping`
    pub const PING: u8 = 2;
    /// `pong`
    pub const PONG: u8 = 3;
    /// `getaddr`
    pub const GETADDR: u8 = 4;
    /// `addr`
    pub const ADDR: u8 = 5;
    /// `getheaders`
    pub const GETHEADERS: u8 = 10;
    /// `headers`
    pub const HEADERS: u8 = 11;
    /// `sendheaders`
    pub const SENDHEADERS: u8 = 12;
    /// `getproof`
    pub const GETPROOF: u8 = 26;
    /// `proof`
    pub const PROOF: u8 = 27;
}

/// Serialized header size carried in `headers`.
const WIRE_HEADER_SIZE: usize = 236;

/// Cap on netaddresses per `addr` message.
const MAX_ADDRS_PER_MESSAGE: usize = 1000;

/// Cap on locator hashes in `getheaders`.
const MAX_LOCATOR_HASHES: usize = 64;

/// The `version` payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VersionPayload {
    /// Protocol version.
    pub version: u32,
    /// Services bitfield.
    pub services: u64,
    /// Sender's unix time.
    pub time: u64,
    /// How the sender sees us.
    pub remote: NetAddress,
    /// Connection nonce (self-connection detection).
    pub nonce: u64,
    /// User agent, at most 255 bytes.
    pub agent: String,
    /// Sender's chain height.
    pub height: u32,
    /// Sender does not want relayed transactions.
    pub no_relay: bool,
}

/// A decoded P2P message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Message {
    /// Handshake opener.
    Version(VersionPayload),
    /// Handshake acknowledgement.
    Verack,
    /// Liveness probe with a nonce.
    Ping(u64),
    /// Liveness reply echoing the nonce.
    Pong(u64),
    /// Request for known addresses.
    GetAddr,
    /// Gossiped addresses.
    Addr(Vec<NetAddress>),
    /// Header request: locator plus stop hash (zero = until tip).
    GetHeaders {
        /// Sparse locator, newest first.
        locator: Vec<Hash>,
        /// Last header wanted, all-zero for "your tip".
        stop_hash: Hash,
    },
    /// Raw 236-byte headers, at most 2,000.
    Headers(Vec<Vec<u8>>),
    /// Ask the peer to announce new tips as headers.
    SendHeaders,
    /// Name proof request.
    GetProof {
        /// Key into the name tree.
        name_hash: Hash,
        /// The root we will verify against.
        root: Hash,
    },
    /// Name proof response; the envelope stays opaque at this layer.
    Proof {
        /// Key the proof answers.
        name_hash: Hash,
        /// Root the peer claims to prove against.
        root: Hash,
        /// CBOR or length-prefixed binary proof envelope.
        envelope: Vec<u8>,
    },
    /// A command code we do not speak. Tolerated and ignored.
    Unknown(u8),
}

impl Message {
    /// The command code this message travels under.
    pub fn cmd(&self) -> u8 {
        match self {
            Message::Version(_) => cmd::VERSION,
            Message::Verack => cmd::VERACK,
            Message::Ping(_) => cmd::PING,
            Message::Pong(_) => cmd::PONG,
            Message::GetAddr => cmd::GETADDR,
            Message::Addr(_) => cmd::ADDR,
            Message::GetHeaders { .. } => cmd::GETHEADERS,
            Message::Headers(_) => cmd::HEADERS,
            Message::SendHeaders => cmd::SENDHEADERS,
            Message::GetProof { .. } => cmd::GETPROOF,
            Message::Proof { .. } => cmd::PROOF,
            Message::Unknown(code) => *code,
        }
    }

    /// Encode the payload (frame header excluded).
    pub fn encode_payload(&self) -> Vec<u8> {
        match self {
            Message::Version(v) => {
                let mut out = Vec::with_capacity(122 + v.agent.len());
                out.extend_from_slice(&v.version.to_le_bytes());
                out.extend_from_slice(&v.services.to_le_bytes());
                out.extend_from_slice(&v.time.to_le_bytes());
                out.extend_from_slice(&v.remote.encode());
                out.extend_from_slice(&v.nonce.to_le_bytes());
                let agent = v.agent.as_bytes();
                out.push(agent.len().min(255) as u8);
                out.extend_from_slice(&agent[..agent.len().min(255)]);
                out.extend_from_slice(&v.height.to_le_bytes());
                out.push(v.no_relay as u8);
                out
            }
            Message::Verack | Message::GetAddr | Message::SendHeaders => Vec::new(),
            Message::Ping(nonce) | Message::Pong(nonce) => nonce.to_le_bytes().to_vec(),
            Message::Addr(addrs) => {
                let mut out = Vec::new();
                write_varint(&mut out, addrs.len() as u64);
                for addr in addrs {
                    out.extend_from_slice(&addr.encode());
                }
                out
            }
            Message::GetHeaders { locator, stop_hash } => {
                let mut out = Vec::new();
                write_varint(&mut out, locator.len() as u64);
                for hash in locator {
                    out.extend_from_slice(hash);
                }
                out.extend_from_slice(stop_hash);
                out
            }
            Message::Headers(headers) => {
                let mut out = Vec::new();
                write_varint(&mut out, headers.len() as u64);
                for header in headers {
                    out.extend_from_slice(header);
                }
                out
            }
            Message::GetProof { name_hash, root } => {
                let mut out = Vec::with_capacity(64);
                out.extend_from_slice(name_hash);
                out.extend_from_slice(root);
                out
            }
            Message::Proof {
                name_hash,
                root,
                envelope,
            } => {
                let mut out = Vec::with_capacity(64 + envelope.len());
                out.extend_from_slice(name_hash);
                out.extend_from_slice(root);
                out.extend_from_slice(envelope);
                out
            }
            Message::Unknown(_) => Vec::new(),
        }
    }

    /// Decode a payload for a command code.
    pub fn decode(code: u8, payload: &[u8]) -> Result<Message, NetError> {
        match code {
            cmd::VERSION => decode_version(payload),
            cmd::VERACK => expect_empty(payload, Message::Verack),
            cmd::PING => Ok(Message::Ping(decode_nonce(payload)?)),
            cmd::PONG => Ok(Message::Pong(decode_nonce(payload)?)),
            cmd::GETADDR => expect_empty(payload, Message::GetAddr),
            cmd::ADDR => decode_addr(payload),
            cmd::GETHEADERS => decode_getheaders(payload),
            cmd::HEADERS => decode_headers(payload),
            cmd::SENDHEADERS => expect_empty(payload, Message::SendHeaders),
            cmd::GETPROOF => decode_getproof(payload),
            cmd::PROOF => decode_proof(payload),
            other => Ok(Message::Unknown(other)),
        }
    }
}

fn expect_empty(payload: &[u8], message: Message) -> Result<Message, NetError> {
    if payload.is_empty() {
        Ok(message)
    } else {
        Err(NetError::Format {
            reason: format!("unexpected {}-byte payload", payload.len()),
        })
    }
}

fn decode_nonce(payload: &[u8]) -> Result<u64, NetError> {
    let bytes: [u8; 8] = payload.try_into().map_err(|_| NetError::Format {
        reason: format!("nonce length {} != 8", payload.len()),
    })?;
    Ok(u64::from_le_bytes(bytes))
}

fn take<'a>(buf: &'a [u8], offset: &mut usize, len: usize) -> Result<&'a [u8], NetError> {
    let slice = buf
        .get(*offset..*offset + len)
        .ok_or_else(|| NetError::Format {
            reason: format!("payload truncated at offset {}", *offset),
        })?;
    *offset += len;
    Ok(slice)
}

fn take_hash(buf: &[u8], offset: &mut usize) -> Result<Hash, NetError> {
    let slice = take(buf, offset, 32)?;
    let mut out = [0u8; 32];
    out.copy_from_slice(slice);
    Ok(out)
}

fn take_varint(buf: &[u8], offset: &mut usize) -> Result<u64, NetError> {
    let (value, used) = read_varint(&buf[*offset..]).map_err(|e| NetError::Format {
        reason: e.to_string(),
    })?;
    *offset += used;
    Ok(value)
}

fn decode_version(payload: &[u8]) -> Result<Message, NetError> {
    let mut offset = 0;
    let version = u32::from_le_bytes(take(payload, &mut offset, 4)?.try_into().expect("4"));
    let services = u64::from_le_bytes(take(payload, &mut offset, 8)?.try_into().expect("8"));
    let time = u64::from_le_bytes(take(payload, &mut offset, 8)?.try_into().expect("8"));
    let remote = NetAddress::decode(take(payload, &mut offset, NETADDRESS_SIZE)?)?;
    let nonce = u64::from_le_bytes(take(payload, &mut offset, 8)?.try_into().expect("8"));
    let agent_len = take(payload, &mut offset, 1)?[0] as usize;
    let agent_bytes = take(payload, &mut offset, agent_len)?;
    let agent = String::from_utf8_lossy(agent_bytes).into_owned();
    let height = u32::from_le_bytes(take(payload, &mut offset, 4)?.try_into().expect("4"));
    let no_relay = take(payload, &mut offset, 1)?[0] != 0;
    if offset != payload.len() {
        return Err(NetError::Format {
            reason: format!("{} trailing bytes after version", payload.len() - offset),
        });
    }
    Ok(Message::Version(VersionPayload {
        version,
        services,
        time,
        remote,
        nonce,
        agent,
        height,
        no_relay,
    }))
}

fn decode_addr(payload: &[u8]) -> Result<Message, NetError> {
    let mut offset = 0;
    let count = take_varint(payload, &mut offset)? as usize;
    if count > MAX_ADDRS_PER_MESSAGE {
        return Err(NetError::Format {
            reason: format!("addr count {} exceeds {}", count, MAX_ADDRS_PER_MESSAGE),
        });
    }
    let mut addrs = Vec::with_capacity(count);
    for _ in 0..count {
        addrs.push(NetAddress::decode(take(
            payload,
            &mut offset,
            NETADDRESS_SIZE,
        )?)?);
    }
    if offset != payload.len() {
        return Err(NetError::Format {
            reason: "trailing bytes after addr".to_string(),
        });
    }
    Ok(Message::Addr(addrs))
}

fn decode_getheaders(payload: &[u8]) -> Result<Message, NetError> {
    let mut offset = 0;
    let count = take_varint(payload, &mut offset)? as usize;
    if count > MAX_LOCATOR_HASHES {
        return Err(NetError::Format {
            reason: format!("locator count {} exceeds {}", count, MAX_LOCATOR_HASHES),
        });
    }
    let mut locator = Vec::with_capacity(count);
    for _ in 0..count {
        locator.push(take_hash(payload, &mut offset)?);
    }
    let stop_hash = take_hash(payload, &mut offset)?;
    if offset != payload.len() {
        return Err(NetError::Format {
            reason: "trailing bytes after getheaders".to_string(),
        });
    }
    Ok(Message::GetHeaders { locator, stop_hash })
}

fn decode_headers(payload: &[u8]) -> Result<Message, NetError> {
    let mut offset = 0;
    let count = take_varint(payload, &mut offset)? as usize;
    if count > MAX_HEADERS_PER_MESSAGE {
        return Err(NetError::Format {
            reason: format!(
                "headers count {} exceeds {}",
                count, MAX_HEADERS_PER_MESSAGE
            ),
        });
    }
    let mut headers = Vec::with_capacity(count);
    for _ in 0..count {
        headers.push(take(payload, &mut offset, WIRE_HEADER_SIZE)?.to_vec());
    }
    if offset != payload.len() {
        return Err(NetError::Format {
            reason: "trailing bytes after headers".to_string(),
        });
    }
    Ok(Message::Headers(headers))
}

fn decode_getproof(payload: &[u8]) -> Result<Message, NetError> {
    let mut offset = 0;
    let name_hash = take_hash(payload, &mut offset)?;
    let root = take_hash(payload, &mut offset)?;
    if offset != payload.len() {
        return Err(NetError::Format {
            reason: "trailing bytes after getproof".to_string(),
        });
    }
    Ok(Message::GetProof { name_hash, root })
}

fn decode_proof(payload: &[u8]) -> Result<Message, NetError> {
    let mut offset = 0;
    let name_hash = take_hash(payload, &mut offset)?;
    let root = take_hash(payload, &mut offset)?;
    let envelope = payload[offset..].to_vec();
    Ok(Message::Proof {
        name_hash,
        root,
        envelope,
    })
}
