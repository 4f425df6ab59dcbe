//! A scripted Handshake full node on real TCP.
//!
//! Speaks the actual wire protocol: completes the version/verack
//! handshake, serves `getheaders` from a scripted chain in up-to-2,000
//! header batches, and answers `getproof` from a scripted envelope map.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};

use hns_01_header_chain::Header;
use hns_02_peer_network::wire::{cmd, read_frame, write_frame, Message, NetAddress, VersionPayload};
use hns_03_name_resolver::ProofEnvelope;
use shared_types::{Hash, NameHash, NetworkParams};

/// What the mock node serves.
#[derive(Default)]
pub struct MockNodeScript {
    /// The chain this node holds, oldest first.
    pub headers: Vec<Header>,
    /// Height of `headers[0]`.
    pub base_height: u32,
    /// Envelope served per name hash; names absent from the map get an
    /// authoritative not-found envelope.
    pub proofs: HashMap<NameHash, Vec<u8>>,
    /// Height announced in `version`; default is the scripted tip.
    pub announce_height: Option<u32>,
}

impl MockNodeScript {
    fn tip_height(&self) -> u32 {
        if self.headers.is_empty() {
            self.base_height
        } else {
            self.base_height + self.headers.len() as u32 - 1
        }
    }
}

/// Bind a listener and serve the script until the task is dropped.
pub async fn spawn_mock_node(params: NetworkParams, script: MockNodeScript) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock node");
    let addr = listener.local_addr().expect("local addr");
    let script = Arc::new(script);

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let params = params.clone();
            let script = Arc::clone(&script);
            tokio::spawn(async move {
                let _ = serve_connection(stream, params, script).await;
            });
        }
    });

    addr
}

async fn serve_connection(
    mut stream: TcpStream,
    params: NetworkParams,
    script: Arc<MockNodeScript>,
) -> std::io::Result<()> {
    let magic = params.magic;
    let max = shared_types::network::MAX_MESSAGE_SIZE;
    let peer_addr = stream.peer_addr()?;

    // client speaks first
    let Ok((code, _payload)) = read_frame(&mut stream, magic, max).await else {
        return Ok(());
    };
    if code != cmd::VERSION {
        return Ok(());
    }

    let version = Message::Version(VersionPayload {
        version: params.protocol_version,
        services: 1,
        time: 1_700_000_000,
        remote: NetAddress::plain(peer_addr, 0),
        nonce: 0x6d6f_636b,
        agent: "/mock-node:1.0/".to_string(),
        height: script.announce_height.unwrap_or_else(|| script.tip_height()),
        no_relay: false,
    });
    send(&mut stream, magic, version).await?;
    send(&mut stream, magic, Message::Verack).await?;

    loop {
        let Ok((code, payload)) = read_frame(&mut stream, magic, max).await else {
            return Ok(());
        };
        let Ok(message) = Message::decode(code, &payload) else {
            return Ok(());
        };
        match message {
            Message::Verack | Message::SendHeaders | Message::GetAddr => {}
            Message::Ping(nonce) => send(&mut stream, magic, Message::Pong(nonce)).await?,
            Message::GetHeaders { locator, .. } => {
                let batch = headers_after(&script, &locator);
                send(&mut stream, magic, Message::Headers(batch)).await?;
            }
            Message::GetProof { name_hash, root } => {
                let envelope = script
                    .proofs
                    .get(&name_hash)
                    .cloned()
                    .unwrap_or_else(|| ProofEnvelope::not_found().encode_binary());
                send(
                    &mut stream,
                    magic,
                    Message::Proof {
                        name_hash,
                        root,
                        envelope,
                    },
                )
                .await?;
            }
            _ => {}
        }
    }
}

fn headers_after(script: &MockNodeScript, locator: &[Hash]) -> Vec<Vec<u8>> {
    let start = locator
        .iter()
        .find_map(|hash| {
            script
                .headers
                .iter()
                .position(|h| h.pow_hash() == *hash)
        })
        .map(|i| i + 1)
        .unwrap_or(0);
    script
        .headers
        .iter()
        .skip(start)
        .take(2000)
        .map(|h| h.encode().to_vec())
        .collect()
}

async fn send(stream: &mut TcpStream, magic: u32, message: Message) -> std::io::Result<()> {
    write_frame(stream, magic, message.cmd(), &message.encode_payload())
        .await
        .map_err(std::io::Error::other)
}
