//! End-to-end harness for the telemetry bridge
//!
//! Starts a real bridge on ephemeral loopback ports and drives it with a TCP
//! producer and `tokio-tungstenite` viewers, the same way the visualization
//! frontend and the telemetry source talk to it.

use anyhow::{bail, Context, Result};
use codec::constants::{what, FRAME_DELIMITER};
use futures_util::{SinkExt, StreamExt};
use relay_config::{BridgeSettings, Endpoint, RelayOptions};
use serde_json::Value;
use std::net::SocketAddr;
use std::time::Duration;
use telemetry_bridge::BridgeServer;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

/// Upper bound for any single step of a scenario
pub const STEP_TIMEOUT: Duration = Duration::from_secs(5);

/// A bridge running in the background for the duration of a test
pub struct TestBridge {
    pub producer_addr: SocketAddr,
    pub viewer_addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl TestBridge {
    /// Start with default relay options
    pub async fn start() -> Result<Self> {
        Self::start_with(RelayOptions::default()).await
    }

    pub async fn start_with(relay: RelayOptions) -> Result<Self> {
        let settings = BridgeSettings {
            http: None,
            tcp: Endpoint::new("127.0.0.1", 0),
            websocket: Endpoint::new("127.0.0.1", 0),
            relay,
        };

        let bound = BridgeServer::new(settings).bind().await?;
        let (producer_addr, viewer_addr) = (bound.producer_addr, bound.viewer_addr);
        let handle = tokio::spawn(async move {
            if let Err(e) = bound.run().await {
                debug!("Test bridge stopped: {}", e);
            }
        });

        Ok(Self {
            producer_addr,
            viewer_addr,
            handle,
        })
    }

    pub async fn producer(&self) -> Result<Producer> {
        Producer::connect(self.producer_addr).await
    }

    pub async fn viewer(&self) -> Result<Viewer> {
        Viewer::connect(self.viewer_addr).await
    }
}

impl Drop for TestBridge {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Telemetry source speaking NUL-delimited JSON
pub struct Producer {
    stream: TcpStream,
}

impl Producer {
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        let stream = timeout(STEP_TIMEOUT, TcpStream::connect(addr))
            .await
            .context("Timed out connecting producer")??;
        Ok(Self { stream })
    }

    /// Write raw bytes, framing included
    pub async fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream.write_all(bytes).await?;
        Ok(())
    }

    /// Write one NUL-terminated frame
    pub async fn send(&mut self, frame: &Value) -> Result<()> {
        let mut bytes = serde_json::to_vec(frame)?;
        bytes.push(FRAME_DELIMITER);
        self.write_raw(&bytes).await
    }

    /// Read one NUL-terminated reply
    pub async fn reply(&mut self) -> Result<String> {
        timeout(STEP_TIMEOUT, async {
            let mut reply = Vec::new();
            loop {
                let byte = self.stream.read_u8().await?;
                if byte == FRAME_DELIMITER {
                    return Ok::<_, anyhow::Error>(String::from_utf8(reply)?);
                }
                reply.push(byte);
            }
        })
        .await
        .context("Timed out waiting for producer reply")?
    }

    /// Send a frame and wait for its reply
    pub async fn request(&mut self, frame: &Value) -> Result<String> {
        self.send(frame).await?;
        self.reply().await
    }

    /// Ask the bridge for the registered viewer ids
    pub async fn clients(&mut self) -> Result<Vec<String>> {
        let reply = self
            .request(&serde_json::json!({ "what": what::GET_CLIENTS_ID }))
            .await?;
        let value: Value = serde_json::from_str(&reply)
            .with_context(|| format!("Unexpected clients reply: {}", reply))?;
        let mut ids: Vec<String> = serde_json::from_value(value["clients"].clone())?;
        ids.sort();
        Ok(ids)
    }
}

/// Visualization client over WebSocket
pub struct Viewer {
    pub id: String,
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl Viewer {
    /// Connect and consume the `connected` greeting to learn the routing id
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        let url = format!("ws://{}/ws", addr);
        let (socket, _) = timeout(STEP_TIMEOUT, connect_async(url.as_str()))
            .await
            .context("Timed out connecting viewer")??;

        let mut viewer = Self {
            id: String::new(),
            socket,
        };
        let greeting = viewer.next_json().await?;
        if greeting["what"] != what::CONNECTED {
            bail!("Expected connected greeting, got {}", greeting);
        }
        viewer.id = greeting["client"]
            .as_str()
            .context("Greeting without client id")?
            .to_string();
        Ok(viewer)
    }

    /// Next text message, parsed
    pub async fn next_json(&mut self) -> Result<Value> {
        loop {
            let message = timeout(STEP_TIMEOUT, self.socket.next())
                .await
                .context("Timed out waiting for viewer message")?
                .context("Viewer stream ended")??;
            match message {
                Message::Text(text) => return Ok(serde_json::from_str(&text)?),
                Message::Close(_) => bail!("Viewer closed by bridge"),
                _ => continue,
            }
        }
    }

    /// True if nothing arrives within `window`
    pub async fn is_quiet(&mut self, window: Duration) -> bool {
        timeout(window, self.socket.next()).await.is_err()
    }

    pub async fn close(mut self) -> Result<()> {
        self.socket.send(Message::Close(None)).await?;
        Ok(())
    }
}

/// Poll until the bridge reports exactly `expected` viewers
pub async fn wait_for_clients(producer: &mut Producer, expected: usize) -> Result<Vec<String>> {
    let deadline = tokio::time::Instant::now() + STEP_TIMEOUT;
    loop {
        let ids = producer.clients().await.unwrap_or_default();
        if ids.len() == expected {
            return Ok(ids);
        }
        if tokio::time::Instant::now() >= deadline {
            bail!("Expected {} viewers, bridge reports {:?}", expected, ids);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
