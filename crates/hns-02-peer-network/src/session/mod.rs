//! Peer session state machine.
//!
//! `Disconnected → Connecting → Handshaking → Ready → Closing → Closed`.
//! Our `version` goes out as soon as TCP connects; READY requires the
//! peer's `version` (answered with our `verack`) and the peer's `verack`,
//! both within the handshake deadline. Requests correlate by expected
//! reply command in a per-session FIFO; there is no request id on this
//! wire. Reads and writes are strictly serialized within a session.

use std::net::SocketAddr;
use std::time::Duration;

use rand::RngCore;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout, Instant};

use shared_types::{short_hash, Hash, NetworkParams};

use crate::config::NetConfig;
use crate::domain::NetError;
use crate::wire::{cmd, read_frame, write_frame, Message, NetAddress, VersionPayload};

/// Where a session is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// No socket.
    Disconnected,
    /// TCP connect in flight.
    Connecting,
    /// Socket up, version/verack exchange in flight.
    Handshaking,
    /// Handshake complete; requests may be issued.
    Ready,
    /// Tearing down.
    Closing,
    /// Socket gone; terminal.
    Closed,
}

/// One connection to one peer.
pub struct PeerSession {
    addr: SocketAddr,
    stream: TcpStream,
    state: SessionState,
    magic: u32,
    config: NetConfig,
    peer_version: Option<VersionPayload>,
    collected_addrs: Vec<NetAddress>,
    errors: u32,
}

impl PeerSession {
    /// Connect and complete the handshake, with exponential backoff
    /// between attempts.
    pub async fn connect(
        addr: SocketAddr,
        params: &NetworkParams,
        config: NetConfig,
        our_height: u32,
    ) -> Result<Self, NetError> {
        let mut attempt = 0u32;
        loop {
            match Self::connect_once(addr, params, config.clone(), our_height).await {
                Ok(session) => return Ok(session),
                Err(e) => {
                    attempt += 1;
                    if attempt > config.max_retries {
                        return Err(e);
                    }
                    let delay = config.retry_base_delay_ms << (attempt - 1).min(8);
                    tracing::debug!(
                        "[hns-02] connect to {} failed ({}), retry {}/{} in {}ms",
                        addr,
                        e,
                        attempt,
                        config.max_retries,
                        delay
                    );
                    sleep(Duration::from_millis(delay)).await;
                }
            }
        }
    }

    async fn connect_once(
        addr: SocketAddr,
        params: &NetworkParams,
        config: NetConfig,
        our_height: u32,
    ) -> Result<Self, NetError> {
        tracing::debug!("[hns-02] {} connecting", addr);
        let stream = timeout(
            Duration::from_millis(config.connect_timeout_ms),
            TcpStream::connect(addr),
        )
        .await
        .map_err(|_| NetError::Timeout {
            what: format!("connect to {}", addr),
        })??;
        stream.set_nodelay(true)?;

        let mut session = Self {
            addr,
            stream,
            state: SessionState::Handshaking,
            magic: params.magic,
            config,
            peer_version: None,
            collected_addrs: Vec::new(),
            errors: 0,
        };
        session.handshake(params, our_height).await?;
        Ok(session)
    }

    async fn handshake(
        &mut self,
        params: &NetworkParams,
        our_height: u32,
    ) -> Result<(), NetError> {
        let our_version = Message::Version(VersionPayload {
            version: params.protocol_version,
            services: params.services,
            time: crate::domain::peer::unix_now(),
            remote: NetAddress::plain(self.addr, 0),
            nonce: rand::thread_rng().next_u64(),
            agent: params.agent.to_string(),
            height: our_height,
            no_relay: true,
        });
        self.send(our_version).await?;

        let deadline = Instant::now() + Duration::from_millis(self.config.handshake_timeout_ms);
        let mut got_verack = false;
        while self.peer_version.is_none() || !got_verack {
            let message = self.read_until(deadline, "handshake").await?;
            match message {
                Message::Version(v) => {
                    if self.peer_version.is_some() {
                        return self.fail_protocol("duplicate version").await;
                    }
                    tracing::debug!(
                        "[hns-02] {} version: agent {} height {}",
                        self.addr,
                        v.agent,
                        v.height
                    );
                    self.peer_version = Some(v);
                    self.send(Message::Verack).await?;
                }
                Message::Verack => {
                    if got_verack {
                        return self.fail_protocol("duplicate verack").await;
                    }
                    got_verack = true;
                }
                Message::Ping(nonce) => self.send(Message::Pong(nonce)).await?,
                Message::Addr(addrs) => self.collect_addrs(addrs),
                Message::Unknown(code) => {
                    tracing::debug!("[hns-02] {} unknown command {} ignored", self.addr, code);
                }
                other => {
                    return self
                        .fail_protocol(&format!("{:?} before handshake completed", other.cmd()))
                        .await;
                }
            }
        }

        // Announce-by-header and ask for addresses exactly once, right
        // after the handshake.
        self.send(Message::SendHeaders).await?;
        self.send(Message::GetAddr).await?;
        self.state = SessionState::Ready;
        tracing::debug!("[hns-02] {} ready", self.addr);
        Ok(())
    }

    /// Request headers following `locator`. Returns raw 236-byte entries.
    pub async fn request_headers(
        &mut self,
        locator: Vec<Hash>,
        stop_hash: Hash,
    ) -> Result<Vec<Vec<u8>>, NetError> {
        let reply = self
            .request(Message::GetHeaders { locator, stop_hash }, cmd::HEADERS)
            .await?;
        match reply {
            Message::Headers(headers) => Ok(headers),
            _ => unreachable!("request returns the wanted command"),
        }
    }

    /// Request a name proof. Returns the opaque proof envelope.
    pub async fn request_proof(
        &mut self,
        name_hash: Hash,
        root: Hash,
    ) -> Result<Vec<u8>, NetError> {
        let reply = self
            .request(Message::GetProof { name_hash, root }, cmd::PROOF)
            .await?;
        match reply {
            Message::Proof {
                name_hash: got_name,
                envelope,
                ..
            } => {
                if got_name != name_hash {
                    let err = NetError::Protocol {
                        reason: format!(
                            "proof for {} while awaiting {}",
                            short_hash(&got_name),
                            short_hash(&name_hash)
                        ),
                    };
                    self.note_failure(&err).await;
                    return Err(err);
                }
                Ok(envelope)
            }
            _ => unreachable!("request returns the wanted command"),
        }
    }

    /// Liveness probe: ping with a fresh nonce, require the echo.
    pub async fn ping(&mut self) -> Result<(), NetError> {
        let nonce = rand::thread_rng().next_u64();
        let reply = self.request(Message::Ping(nonce), cmd::PONG).await?;
        match reply {
            Message::Pong(echoed) if echoed == nonce => Ok(()),
            Message::Pong(_) => {
                let err = NetError::Protocol {
                    reason: "pong nonce mismatch".to_string(),
                };
                self.note_failure(&err).await;
                Err(err)
            }
            _ => unreachable!("request returns the wanted command"),
        }
    }

    /// One outstanding request of each type at a time: send, then read
    /// frames until the wanted reply command arrives or the deadline
    /// passes. Interleaved pings, addrs, and unknown commands are handled
    /// in place; anything else protocol-faults the session.
    async fn request(&mut self, message: Message, want: u8) -> Result<Message, NetError> {
        if self.state != SessionState::Ready {
            return Err(NetError::Closed);
        }
        if let Err(e) = self.send(message).await {
            self.note_failure(&e).await;
            return Err(e);
        }

        let deadline = Instant::now() + Duration::from_millis(self.config.socket_timeout_ms);
        loop {
            let message = match self.read_until(deadline, "reply").await {
                Ok(m) => m,
                Err(e) => {
                    self.note_failure(&e).await;
                    return Err(e);
                }
            };
            match message {
                m if m.cmd() == want => return Ok(m),
                Message::Ping(nonce) => {
                    if let Err(e) = self.send(Message::Pong(nonce)).await {
                        self.note_failure(&e).await;
                        return Err(e);
                    }
                }
                Message::Addr(addrs) => self.collect_addrs(addrs),
                Message::Pong(_) => {} // stale keepalive echo
                Message::Headers(_) => {
                    // unsolicited tip announcement (we asked for
                    // sendheaders); not the reply we are waiting on
                    tracing::trace!("[hns-02] {} unsolicited headers", self.addr);
                }
                Message::Unknown(code) => {
                    tracing::trace!("[hns-02] {} unknown command {}", self.addr, code);
                }
                other => {
                    let err = NetError::Protocol {
                        reason: format!("unexpected command {}", other.cmd()),
                    };
                    self.note_failure(&err).await;
                    return Err(err);
                }
            }
        }
    }

    async fn read_until(&mut self, deadline: Instant, what: &str) -> Result<Message, NetError> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(NetError::Timeout { what: what.to_string() });
        }
        let (code, payload) = timeout(
            remaining,
            read_frame(&mut self.stream, self.magic, self.config.max_message_size),
        )
        .await
        .map_err(|_| NetError::Timeout { what: what.to_string() })??;
        Message::decode(code, &payload)
    }

    async fn send(&mut self, message: Message) -> Result<(), NetError> {
        let payload = message.encode_payload();
        write_frame(&mut self.stream, self.magic, message.cmd(), &payload).await
    }

    fn collect_addrs(&mut self, addrs: Vec<NetAddress>) {
        const MAX_COLLECTED: usize = 2000;
        let room = MAX_COLLECTED.saturating_sub(self.collected_addrs.len());
        self.collected_addrs.extend(addrs.into_iter().take(room));
    }

    /// Timeouts leave the session usable until errors cascade; protocol
    /// and I/O faults close it immediately.
    async fn note_failure(&mut self, error: &NetError) {
        self.errors += 1;
        let fatal = matches!(error, NetError::Io(_) | NetError::Protocol { .. } | NetError::Format { .. })
            || self.errors >= self.config.session_max_errors;
        if fatal {
            self.close().await;
        }
    }

    async fn fail_protocol(&mut self, reason: &str) -> Result<(), NetError> {
        let err = NetError::Protocol {
            reason: reason.to_string(),
        };
        self.close().await;
        Err(err)
    }

    /// Tear the session down. Idempotent.
    pub async fn close(&mut self) {
        if matches!(self.state, SessionState::Closing | SessionState::Closed) {
            return;
        }
        self.state = SessionState::Closing;
        tracing::debug!("[hns-02] {} closing", self.addr);
        let _ = self.stream.shutdown().await;
        self.state = SessionState::Closed;
    }

    /// Chain height the peer announced in its `version`.
    pub fn peer_height(&self) -> Option<u32> {
        self.peer_version.as_ref().map(|v| v.height)
    }

    /// The peer's `version` payload, once handshaken.
    pub fn peer_version(&self) -> Option<&VersionPayload> {
        self.peer_version.as_ref()
    }

    /// Drain addresses gossiped to this session.
    pub fn take_addrs(&mut self) -> Vec<NetAddress> {
        std::mem::take(&mut self.collected_addrs)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the session can carry requests.
    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Ready
    }

    /// The peer this session talks to.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Request failures since the session opened.
    pub fn error_count(&self) -> u32 {
        self.errors
    }
}
