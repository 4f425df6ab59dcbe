//! Peers file.
//!
//! A small self-describing CBOR envelope,
//! `{ peers: ["host:port"], timestamp, count }`, replaced atomically via
//! a sibling temp path. Unparseable entries are skipped on load; a
//! missing file is an empty list, not an error.

use std::fs;
use std::io::Write;
use std::net::SocketAddr;
use std::path::Path;

use ciborium::Value;

use crate::domain::peer::unix_now;
use crate::domain::NetError;

/// Persist the peer list.
pub fn save_peers(path: &Path, peers: &[SocketAddr]) -> Result<(), NetError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let entries: Vec<Value> = peers
        .iter()
        .map(|addr| Value::Text(addr.to_string()))
        .collect();
    let envelope = Value::Map(vec![
        (Value::Text("peers".into()), Value::Array(entries)),
        (
            Value::Text("timestamp".into()),
            Value::Integer(unix_now().into()),
        ),
        (
            Value::Text("count".into()),
            Value::Integer((peers.len() as u64).into()),
        ),
    ]);

    let mut bytes = Vec::new();
    ciborium::ser::into_writer(&envelope, &mut bytes).expect("vec write cannot fail");

    let mut temp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    temp_name.push(".tmp");
    let temp = path.with_file_name(temp_name);
    let mut file = fs::File::create(&temp)?;
    file.write_all(&bytes)?;
    file.sync_all()?;
    fs::rename(&temp, path)?;

    tracing::debug!("[hns-02] persisted {} peers", peers.len());
    Ok(())
}

/// Load the peer list. Missing file or a malformed envelope both yield an
/// empty list; persisted peers are a cache, never a source of truth.
pub fn load_peers(path: &Path) -> Result<Vec<SocketAddr>, NetError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let value: Value = match ciborium::de::from_reader(bytes.as_slice()) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("[hns-02] peers file unreadable ({}), starting empty", e);
            return Ok(Vec::new());
        }
    };

    let mut peers = Vec::new();
    if let Some(map) = value.as_map() {
        for (key, val) in map {
            if key.as_text() == Some("peers") {
                if let Some(entries) = val.as_array() {
                    for entry in entries {
                        if let Some(text) = entry.as_text() {
                            match text.parse::<SocketAddr>() {
                                Ok(addr) => peers.push(addr),
                                Err(_) => {
                                    tracing::debug!("[hns-02] skipping bad peer entry {:?}", text)
                                }
                            }
                        }
                    }
                }
            }
        }
    }
    Ok(peers)
}
