//! The peer session state machine: connect, handshake, then drive header
//! sync until disconnect or shutdown.
//!
//! The state diagram in the wire spec this follows:
//!
//! ```text
//! disconnected -> connecting -> handshaking -> synced_idle <-> syncing
//! any -> terminating (SIGINT/SIGUSR1)
//! ```
//!
//! Rather than a manual nonblocking poll loop, the session runs as a
//! single async task: `tokio::select!` plays the role of the poll(2)
//! wait, `Framed<TcpStream, MessageCodec>` owns the in/outbound buffers,
//! and the terminate flag is checked on every loop wakeup exactly as the
//! source's `g_quit` check is.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::interval;
use tokio_util::codec::Framed;
use tracing::{info, warn};

use crate::chain::ChainEngine;
use crate::codec::{GetHeadersMessage, Message, MessageCodec, Network, NetworkAddress, VersionMessage};
use crate::error::{NodeError, Result};
use crate::primitives::Hash256;
use crate::utils::retry::RetryConfig;
use crate::utils::TerminateFlag;

use super::dispatch::HandlerTable;

/// Our advertised protocol version. 70012 is the minimum that supports
/// `sendheaders`; a real peer may negotiate down.
pub const PROTOCOL_VERSION: i32 = 70012;

bitflags::bitflags! {
    /// Service bits advertised in the version message's `services` field.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ServiceFlags: u64 {
        const NODE_NETWORK = 1;
        const NODE_WITNESS = 1 << 3;
        const NODE_NETWORK_LIMITED = 1 << 10;
    }
}

/// Headers requested per GETHEADERS, matching the protocol's own cap on
/// a single reply.
const GETHEADERS_BATCH: usize = 2000;
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    Disconnected,
    Connecting,
    Handshaking,
    SyncedIdle,
    Syncing,
    Terminating,
}

/// Mutable state the dispatch handlers operate on: negotiated peer
/// facts, the send-headers preference, the known-peer-address table,
/// and handles back into the chain and outbound queue.
pub struct SessionState {
    pub peer_version: Option<i32>,
    pub peer_start_height: Option<i32>,
    pub send_headers: bool,
    pub known_addrs: HashMap<(IpAddr, u16), NetworkAddress>,
    pub state: PeerState,
    pub chain: Arc<Mutex<ChainEngine>>,
    pub network: Network,
    outbound: Vec<Message>,
}

impl SessionState {
    fn queue(&mut self, msg: Message) {
        self.outbound.push(msg);
    }

    fn on_version(&mut self, msg: Message) -> Result<()> {
        let Message::Version(v) = msg else { return Ok(()) };
        self.peer_version = Some(v.version);
        self.peer_start_height = Some(v.start_height);
        info!(peer_version = v.version, peer_start_height = v.start_height, "received version");
        self.queue(Message::Verack);
        Ok(())
    }

    fn on_verack(&mut self, _msg: Message) -> Result<()> {
        if self.state == PeerState::Handshaking {
            self.state = PeerState::SyncedIdle;
            info!("handshake complete");
            self.start_sync();
        }
        Ok(())
    }

    fn on_headers(&mut self, msg: Message) -> Result<()> {
        let Message::Headers(headers) = msg else { return Ok(()) };
        let count = headers.len();
        {
            let mut chain = self.chain.lock().unwrap();
            for entry in &headers {
                // A chain-validation error (bad PoW, unknown parent) rejects
                // just this header; the session and the rest of the batch
                // continue. Only a non-recoverable error aborts the batch.
                if let Err(e) = chain.add(None, entry.header) {
                    if e.is_recoverable() {
                        warn!(error = %e, hash = %entry.header.block_hash(), "rejected header, continuing");
                        continue;
                    }
                    return Err(e);
                }
            }
        }
        info!(count, "processed headers batch");
        if count == 0 {
            self.state = PeerState::SyncedIdle;
        } else {
            self.start_sync();
        }
        Ok(())
    }

    fn on_ping(&mut self, msg: Message) -> Result<()> {
        if let Message::Ping(nonce) = msg {
            self.queue(Message::Pong(nonce));
        }
        Ok(())
    }

    /// Compute a fresh locator and request the next batch of headers.
    fn start_sync(&mut self) {
        self.state = PeerState::Syncing;
        let locator = self.chain.lock().unwrap().get_known_hashes(GETHEADERS_BATCH);
        let version = self.peer_version.map(|v| v.min(PROTOCOL_VERSION)).unwrap_or(PROTOCOL_VERSION) as u32;
        self.queue(Message::GetHeaders(GetHeadersMessage { version, locator_hashes: locator, hash_stop: Hash256::ZERO }));
    }

    fn take_outbound(&mut self) -> Vec<Message> {
        std::mem::take(&mut self.outbound)
    }
}

pub struct PeerSession {
    addr: SocketAddr,
    network: Network,
    chain: Arc<Mutex<ChainEngine>>,
    terminate: TerminateFlag,
    retry: RetryConfig,
    handlers: HandlerTable,
}

impl PeerSession {
    pub fn new(addr: SocketAddr, network: Network, chain: Arc<Mutex<ChainEngine>>, terminate: TerminateFlag, max_retries: u32) -> Self {
        PeerSession {
            addr,
            network,
            chain,
            terminate,
            retry: RetryConfig::new(max_retries, Duration::from_secs(1)),
            handlers: HandlerTable::with_defaults(),
        }
    }

    /// Replace or add a dispatch handler, overriding the default for one
    /// message command. Exposed so application code installed at
    /// startup can customize behavior without touching the session loop.
    pub fn install_handler(&mut self, command: &'static str, handler: super::dispatch::Handler) {
        self.handlers.install(command, handler);
    }

    /// Run the session to completion: connect, handshake, sync, and
    /// reconnect with backoff on disconnect, up to `max_retries`. Returns
    /// once the terminate flag is observed or retries are exhausted.
    pub async fn run(mut self) -> Result<()> {
        let mut attempt = 0;
        loop {
            if self.terminate.is_set() {
                return Ok(());
            }
            match self.run_once().await {
                Ok(()) => return Ok(()),
                Err(e) if self.terminate.is_set() => {
                    info!(error = %e, "session ending on shutdown signal");
                    return Ok(());
                }
                Err(e) => {
                    attempt += 1;
                    if attempt >= self.retry.max_attempts {
                        warn!(error = %e, attempt, "retries exhausted, giving up");
                        return Err(NodeError::RetriesExhausted(attempt));
                    }
                    warn!(error = %e, attempt, max = self.retry.max_attempts, "peer session failed, retrying");
                    tokio::time::sleep(self.retry.initial_delay).await;
                }
            }
        }
    }

    async fn run_once(&mut self) -> Result<()> {
        let stream = TcpStream::connect(self.addr)
            .await
            .map_err(|e| NodeError::ConnectFailed(e.to_string()))?;
        let mut framed = Framed::new(stream, MessageCodec::new(self.network));

        let height = self.chain.lock().unwrap().height();
        let version = build_version_message(self.addr, height as i32);
        framed.send(Message::Version(version)).await?;

        let mut state = SessionState {
            peer_version: None,
            peer_start_height: None,
            send_headers: false,
            known_addrs: HashMap::new(),
            state: PeerState::Handshaking,
            chain: Arc::clone(&self.chain),
            network: self.network,
            outbound: Vec::new(),
        };

        let mut ticker = interval(POLL_INTERVAL);
        loop {
            tokio::select! {
                frame = framed.next() => {
                    match frame {
                        Some(Ok(msg)) => {
                            if let Err(e) = self.handlers.dispatch(&mut state, msg) {
                                if e.is_session_fatal() {
                                    return Err(e);
                                }
                                warn!(error = %e, "non-fatal dispatch error, session continues");
                            }
                            for out in state.take_outbound() {
                                framed.send(out).await?;
                            }
                        }
                        Some(Err(e)) if e.is_session_fatal() => return Err(e),
                        Some(Err(e)) => {
                            warn!(error = %e, "non-fatal frame error, session continues");
                        }
                        None => {
                            return Err(NodeError::HandshakeFailed("peer closed the connection".into()));
                        }
                    }
                }
                _ = ticker.tick() => {
                    if self.terminate.is_set() {
                        state.state = PeerState::Terminating;
                        info!("terminate flag observed, closing session");
                        return Ok(());
                    }
                }
            }
        }
    }
}

fn build_version_message(peer_addr: SocketAddr, start_height: i32) -> VersionMessage {
    let services = (ServiceFlags::NODE_NETWORK | ServiceFlags::NODE_NETWORK_LIMITED | ServiceFlags::NODE_WITNESS).bits();
    let timestamp = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64;
    let addr_recv = match peer_addr.ip() {
        IpAddr::V4(ip) => NetworkAddress::ipv4_mapped(ip, peer_addr.port(), 0),
        IpAddr::V6(ip) => NetworkAddress { services: 0, ip: ip.octets(), port: peer_addr.port() },
    };
    let addr_from = NetworkAddress { services: 0, ip: [0; 16], port: 0 };
    let nonce: u64 = rand::random();

    VersionMessage {
        version: PROTOCOL_VERSION,
        services,
        timestamp,
        addr_recv,
        addr_from,
        nonce,
        user_agent: "/bllvm-spv-node:0.1/".to_string(),
        start_height,
        relay: true,
    }
}
