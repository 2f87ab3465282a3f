//! # Producer Listener - TCP Telemetry Ingest
//!
//! ## Purpose
//! Accepts telemetry producer connections over TCP, frames each byte stream
//! into JSON envelopes, routes every frame and writes the producer's status
//! reply back on the same connection.
//!
//! ## Architecture Role
//!
//! ```text
//! Producer ──TCP──> [session] ──bytes──> FrameDecoder ──frames──> Router
//!     ^                                                             │
//!     └──────────────── "Success" / clients list ───────────────────┘
//! ```
//!
//! ## Sessions
//!
//! Each accepted connection runs in its own task and owns its decoder, so a
//! partial frame never leaks between producers. Frames of one producer are
//! routed strictly in arrival order. A read error or peer close ends only
//! that session.
//!
//! **Producer mode**: in `multi` mode sessions run side by side; in `single`
//! mode a newly accepted producer aborts the previous session.
//!
//! **Replies**: under delimiter framing every reply is NUL-terminated so
//! producers can frame replies the same way they frame requests; single-shot
//! framing writes replies raw.

use crate::error::Result;
use crate::router::Router;
use codec::constants::{FRAME_DELIMITER, READ_CHUNK_SIZE};
use codec::{FrameDecoder, FramingMode};
use relay_config::{ProducerMode, RelayOptions};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Framing settings handed to every producer session
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    pub framing: FramingMode,
    pub max_frame_bytes: usize,
}

impl From<&RelayOptions> for SessionConfig {
    fn from(options: &RelayOptions) -> Self {
        Self {
            framing: options.framing,
            max_frame_bytes: options.max_frame_bytes,
        }
    }
}

/// TCP listener for telemetry producers
pub struct ProducerListener {
    listener: TcpListener,
    router: Arc<Router>,
    session: SessionConfig,
    mode: ProducerMode,
}

impl ProducerListener {
    pub async fn bind(addr: &str, router: Arc<Router>, options: &RelayOptions) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!(
            "✅ Producer listener bound on {} (framing={}, mode={})",
            listener.local_addr()?,
            options.framing,
            options.producer_mode
        );

        Ok(Self {
            listener,
            router,
            session: SessionConfig::from(options),
            mode: options.producer_mode,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept producers until the task is dropped
    pub async fn run(self) -> Result<()> {
        let mut active: Option<JoinHandle<()>> = None;

        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    info!("📡 Producer connected: {}", peer);

                    if self.mode == ProducerMode::Single {
                        if let Some(previous) = active.take() {
                            if !previous.is_finished() {
                                warn!("Replacing active producer session with {}", peer);
                                previous.abort();
                            }
                        }
                    }

                    let router = self.router.clone();
                    let session = self.session;
                    let handle = tokio::spawn(async move {
                        let label = peer.to_string();
                        match serve_producer(stream, &label, router, session).await {
                            Ok(()) => info!("📡 Producer {} disconnected", label),
                            Err(e) => warn!("Producer {} session ended: {}", label, e),
                        }
                    });

                    if self.mode == ProducerMode::Single {
                        active = Some(handle);
                    }
                }
                Err(e) => {
                    error!("Failed to accept producer connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
    }
}

/// Run one producer session until the peer closes or a read/write fails
pub async fn serve_producer<S>(
    mut stream: S,
    label: &str,
    router: Arc<Router>,
    session: SessionConfig,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut decoder = FrameDecoder::new(session.framing, session.max_frame_bytes);
    let mut buffer = vec![0u8; READ_CHUNK_SIZE];

    loop {
        let bytes_read = stream.read(&mut buffer).await?;
        if bytes_read == 0 {
            if decoder.buffered_len() > 0 {
                debug!(
                    "Producer {} closed with {} unterminated bytes",
                    label,
                    decoder.buffered_len()
                );
            }
            return Ok(());
        }

        debug!("Read {} bytes from producer {}", bytes_read, label);

        for message in decoder.feed(&buffer[..bytes_read]) {
            let reply = router.route(message).await;
            let mut response = router.render(&reply)?.into_bytes();
            if decoder.mode() == FramingMode::Delimiter {
                response.push(FRAME_DELIMITER);
            }
            stream.write_all(&response).await?;
        }
    }
}
