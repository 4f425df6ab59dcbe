//! Proof envelope codec.
//!
//! Peers answer `getproof` with `{ records, nodes }` in one of two
//! self-describing forms, and the decoder accepts either:
//!
//! - a CBOR map with `records` (array of byte strings) and `nodes`
//!   (array of 32-byte strings);
//! - a length-prefixed binary form: `varint(record_count) ||
//!   (varint(len) || bytes)* || varint(node_count) || (32 bytes)*`.
//!
//! An envelope with no records and no nodes is an authoritative
//! "not found" for the queried name.

use ciborium::Value;
use shared_types::{read_varint, write_varint, Hash};

use crate::domain::ResolveError;

/// Caps against absurd envelopes before any allocation happens.
const MAX_RECORDS: usize = 255;
const MAX_NODES: usize = 256;
const MAX_RECORD_LEN: usize = 512;

/// A decoded proof envelope: raw record entries plus proof nodes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProofEnvelope {
    /// Canonical record entries (`varint(type) || varint(len) || data`).
    pub records: Vec<Vec<u8>>,
    /// 32-byte tree nodes, leaf-adjacent first.
    pub nodes: Vec<Hash>,
}

impl ProofEnvelope {
    /// An authoritative "name not found".
    pub fn not_found() -> Self {
        Self::default()
    }

    /// Whether this envelope is the "not found" answer.
    pub fn is_not_found(&self) -> bool {
        self.records.is_empty() && self.nodes.is_empty()
    }

    /// Decode either accepted form.
    pub fn decode(bytes: &[u8]) -> Result<Self, ResolveError> {
        match Self::decode_cbor(bytes) {
            Ok(envelope) => Ok(envelope),
            Err(_) => Self::decode_binary(bytes),
        }
    }

    /// Decode the CBOR form.
    pub fn decode_cbor(bytes: &[u8]) -> Result<Self, ResolveError> {
        let value: Value = ciborium::de::from_reader(bytes).map_err(|e| ResolveError::Format {
            reason: format!("cbor envelope: {}", e),
        })?;
        let map = value.as_map().ok_or_else(|| ResolveError::Format {
            reason: "cbor envelope is not a map".to_string(),
        })?;

        let mut records = None;
        let mut nodes = None;
        for (key, val) in map {
            match key.as_text() {
                Some("records") => records = Some(byte_array(val, MAX_RECORDS, "records")?),
                Some("nodes") => nodes = Some(byte_array(val, MAX_NODES, "nodes")?),
                _ => {}
            }
        }
        let records = records.ok_or_else(|| ResolveError::Format {
            reason: "cbor envelope missing records".to_string(),
        })?;
        let raw_nodes = nodes.ok_or_else(|| ResolveError::Format {
            reason: "cbor envelope missing nodes".to_string(),
        })?;

        check_record_lens(&records)?;
        let nodes = to_hashes(raw_nodes)?;
        Ok(Self { records, nodes })
    }

    /// Decode the length-prefixed binary form.
    pub fn decode_binary(bytes: &[u8]) -> Result<Self, ResolveError> {
        let mut offset = 0;

        let record_count = take_varint(bytes, &mut offset)? as usize;
        if record_count > MAX_RECORDS {
            return Err(ResolveError::Format {
                reason: format!("{} records exceeds cap", record_count),
            });
        }
        let mut records = Vec::with_capacity(record_count);
        for _ in 0..record_count {
            let len = take_varint(bytes, &mut offset)? as usize;
            if len > MAX_RECORD_LEN {
                return Err(ResolveError::Format {
                    reason: format!("record of {} bytes exceeds cap", len),
                });
            }
            records.push(take(bytes, &mut offset, len)?.to_vec());
        }

        let node_count = take_varint(bytes, &mut offset)? as usize;
        if node_count > MAX_NODES {
            return Err(ResolveError::Format {
                reason: format!("{} nodes exceeds cap", node_count),
            });
        }
        let mut nodes = Vec::with_capacity(node_count);
        for _ in 0..node_count {
            let slice = take(bytes, &mut offset, 32)?;
            let mut node = [0u8; 32];
            node.copy_from_slice(slice);
            nodes.push(node);
        }

        if offset != bytes.len() {
            return Err(ResolveError::Format {
                reason: "trailing bytes after envelope".to_string(),
            });
        }
        Ok(Self { records, nodes })
    }

    /// Encode as CBOR.
    pub fn encode_cbor(&self) -> Vec<u8> {
        let records: Vec<Value> = self
            .records
            .iter()
            .map(|r| Value::Bytes(r.clone()))
            .collect();
        let nodes: Vec<Value> = self
            .nodes
            .iter()
            .map(|n| Value::Bytes(n.to_vec()))
            .collect();
        let envelope = Value::Map(vec![
            (Value::Text("records".into()), Value::Array(records)),
            (Value::Text("nodes".into()), Value::Array(nodes)),
        ]);
        let mut out = Vec::new();
        ciborium::ser::into_writer(&envelope, &mut out).expect("vec write cannot fail");
        out
    }

    /// Encode as the binary form (what goes on the wire).
    pub fn encode_binary(&self) -> Vec<u8> {
        let mut out = Vec::new();
        write_varint(&mut out, self.records.len() as u64);
        for record in &self.records {
            write_varint(&mut out, record.len() as u64);
            out.extend_from_slice(record);
        }
        write_varint(&mut out, self.nodes.len() as u64);
        for node in &self.nodes {
            out.extend_from_slice(node);
        }
        out
    }
}

fn byte_array(val: &Value, cap: usize, what: &str) -> Result<Vec<Vec<u8>>, ResolveError> {
    let array = val.as_array().ok_or_else(|| ResolveError::Format {
        reason: format!("{} is not an array", what),
    })?;
    if array.len() > cap {
        return Err(ResolveError::Format {
            reason: format!("{} {} entries exceeds cap", array.len(), what),
        });
    }
    array
        .iter()
        .map(|entry| {
            entry
                .as_bytes()
                .map(|b| b.to_vec())
                .ok_or_else(|| ResolveError::Format {
                    reason: format!("{} entry is not a byte string", what),
                })
        })
        .collect()
}

fn check_record_lens(records: &[Vec<u8>]) -> Result<(), ResolveError> {
    for record in records {
        if record.len() > MAX_RECORD_LEN {
            return Err(ResolveError::Format {
                reason: format!("record of {} bytes exceeds cap", record.len()),
            });
        }
    }
    Ok(())
}

fn to_hashes(raw: Vec<Vec<u8>>) -> Result<Vec<Hash>, ResolveError> {
    raw.into_iter()
        .map(|bytes| {
            let node: [u8; 32] = bytes.as_slice().try_into().map_err(|_| ResolveError::Format {
                reason: format!("node of {} bytes, want 32", bytes.len()),
            })?;
            Ok(node)
        })
        .collect()
}

fn take<'a>(buf: &'a [u8], offset: &mut usize, len: usize) -> Result<&'a [u8], ResolveError> {
    let slice = buf
        .get(*offset..*offset + len)
        .ok_or_else(|| ResolveError::Format {
            reason: format!("envelope truncated at offset {}", *offset),
        })?;
    *offset += len;
    Ok(slice)
}

fn take_varint(buf: &[u8], offset: &mut usize) -> Result<u64, ResolveError> {
    let (value, used) = read_varint(&buf[*offset..]).map_err(|e| ResolveError::Format {
        reason: e.to_string(),
    })?;
    *offset += used;
    Ok(value)
}
