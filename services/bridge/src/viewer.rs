//! Viewer WebSocket listener
//!
//! Serves the WebSocket upgrade on `/ws` (and `/` for clients that connect to
//! the bare host), plus `/health` and `/status`. Each upgraded connection is
//! registered, greeted with its routing id, and then fed from its outbound
//! queue until it closes.
//!
//! Per-connection lifecycle: `Connecting -> Open -> Closed`. Peer close,
//! protocol error, a failed or timed-out write, or the registry dropping the
//! queue all lead to `Closed`, after which the id is unregistered at once.

use crate::client::{ClientManager, Payload};
use crate::error::{BridgeError, Result};
use codec::ConnectedGreeting;
use futures_util::future::BoxFuture;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use relay_config::BridgeSettings;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use warp::ws::{Message, WebSocket};
use warp::Filter;

/// Lifecycle of one viewer connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerState {
    Connecting,
    Open,
    Closed,
}

impl fmt::Display for ViewerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewerState::Connecting => write!(f, "connecting"),
            ViewerState::Open => write!(f, "open"),
            ViewerState::Closed => write!(f, "closed"),
        }
    }
}

/// Shared state handed to every upgraded connection
#[derive(Clone)]
struct ViewerContext {
    client_manager: Arc<ClientManager>,
    max_connections: usize,
    client_buffer_size: usize,
    write_timeout: Duration,
}

/// HTTP/WebSocket listener for visualization clients
pub struct ViewerListener {
    context: ViewerContext,
    enable_cors: bool,
    cors_origin: Option<String>,
}

impl ViewerListener {
    pub fn new(client_manager: Arc<ClientManager>, settings: &BridgeSettings) -> Self {
        let relay = &settings.relay;
        Self {
            context: ViewerContext {
                client_manager,
                max_connections: relay.max_connections,
                client_buffer_size: relay.client_buffer_size,
                write_timeout: relay.write_timeout(),
            },
            enable_cors: relay.enable_cors,
            cors_origin: settings.cors_origin(),
        }
    }

    /// Bind the listener, returning the bound address and the server future
    pub fn bind(self, addr: SocketAddr) -> Result<(SocketAddr, BoxFuture<'static, ()>)> {
        let context = self.context.clone();

        // Common WebSocket upgrade handler (reused for multiple paths)
        let ws_handler = move |ws: warp::ws::Ws| {
            let context = context.clone();
            async move {
                Ok::<_, warp::Rejection>(
                    ws.on_upgrade(move |socket| handle_viewer_connection(context, socket)),
                )
            }
        };

        let ws_route = warp::path("ws")
            .and(warp::path::end())
            .and(warp::ws())
            .and_then(ws_handler.clone());
        // Frontends that connect to the bare host
        let root_route = warp::path::end().and(warp::ws()).and_then(ws_handler);

        let health_route = warp::path("health")
            .map(|| warp::reply::with_status("OK", warp::http::StatusCode::OK));

        let status_clients = self.context.client_manager.clone();
        let status_route = warp::path("status").and_then(move || {
            let clients = status_clients.clone();
            async move {
                Ok::<_, warp::Rejection>(warp::reply::json(&serde_json::json!({
                    "status": "running",
                    "service": "telemetry-bridge",
                    "version": env!("CARGO_PKG_VERSION"),
                    "viewers": clients.client_count().await
                })))
            }
        });

        let routes = ws_route.or(root_route).or(health_route).or(status_route);

        if self.enable_cors {
            let cors = match &self.cors_origin {
                Some(origin) => {
                    info!("CORS enabled for origin {}", origin);
                    warp::cors().allow_origin(origin.as_str())
                }
                None => warp::cors().allow_any_origin(),
            }
            .allow_methods(vec!["GET", "POST"]);

            let (bound, server) = warp::serve(routes.with(cors)).try_bind_ephemeral(addr)?;
            let server: BoxFuture<'static, ()> = Box::pin(server);
            Ok((bound, server))
        } else {
            let (bound, server) = warp::serve(routes).try_bind_ephemeral(addr)?;
            let server: BoxFuture<'static, ()> = Box::pin(server);
            Ok((bound, server))
        }
    }
}

async fn handle_viewer_connection(context: ViewerContext, ws: WebSocket) {
    debug!("New WebSocket connection ({})", ViewerState::Connecting);

    let (tx, rx) = mpsc::channel::<Payload>(context.client_buffer_size);
    let client_id = match context
        .client_manager
        .try_register(tx, context.max_connections)
        .await
    {
        Ok(client_id) => client_id,
        Err(e) => {
            warn!("🚫 Rejecting viewer: {}", e);
            if let Err(e) = ws.close().await {
                debug!("Error closing rejected viewer: {}", e);
            }
            return;
        }
    };

    let (ws_sender, ws_receiver) = ws.split();
    if let Err(e) = serve_viewer(&context, &client_id, ws_sender, ws_receiver, rx).await {
        warn!("WebSocket connection error for client {}: {}", client_id, e);
    }
}

fn transition(client_id: &str, from: ViewerState, to: ViewerState) -> ViewerState {
    info!("Viewer {}: {} -> {}", client_id, from, to);
    to
}

/// Run a registered viewer from Open to Closed, unregistering it on the way out
async fn serve_viewer<S, R>(
    context: &ViewerContext,
    client_id: &str,
    ws_sender: S,
    ws_receiver: R,
    rx: mpsc::Receiver<Payload>,
) -> Result<()>
where
    S: Sink<Message, Error = warp::Error> + Unpin,
    R: Stream<Item = std::result::Result<Message, warp::Error>> + Unpin,
{
    let state = transition(client_id, ViewerState::Connecting, ViewerState::Open);

    let result = pump_viewer(context, client_id, ws_sender, ws_receiver, rx).await;

    // Cleanup
    context.client_manager.unregister(client_id).await;
    transition(client_id, state, ViewerState::Closed);
    result
}

/// Forward queued payloads to the socket until either side goes away
async fn pump_viewer<S, R>(
    context: &ViewerContext,
    client_id: &str,
    mut ws_sender: S,
    mut ws_receiver: R,
    mut rx: mpsc::Receiver<Payload>,
) -> Result<()>
where
    S: Sink<Message, Error = warp::Error> + Unpin,
    R: Stream<Item = std::result::Result<Message, warp::Error>> + Unpin,
{
    let greeting = serde_json::to_string(&ConnectedGreeting::new(client_id))?;
    send_with_timeout(&mut ws_sender, greeting, context.write_timeout).await?;

    loop {
        tokio::select! {
            // Handle outgoing messages from our queue
            payload = rx.recv() => {
                match payload {
                    Some(payload) => {
                        send_with_timeout(&mut ws_sender, payload.to_string(), context.write_timeout)
                            .await?;
                    }
                    None => {
                        info!("Message queue closed for client {}", client_id);
                        break;
                    }
                }
            }

            // Handle incoming WebSocket messages
            ws_msg = ws_receiver.next() => {
                match ws_msg {
                    Some(Ok(msg)) => {
                        if msg.is_close() {
                            info!("Client {} disconnected", client_id);
                            break;
                        } else if let Ok(text) = msg.to_str() {
                            debug!("Ignoring message from client {}: {}", client_id, text);
                        }
                    }
                    Some(Err(e)) => return Err(e.into()),
                    None => {
                        info!("WebSocket stream closed for client {}", client_id);
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}

async fn send_with_timeout<S>(ws_sender: &mut S, text: String, limit: Duration) -> Result<()>
where
    S: Sink<Message, Error = warp::Error> + Unpin,
{
    match timeout(limit, ws_sender.send(Message::text(text))).await {
        Ok(result) => result.map_err(BridgeError::from),
        Err(_) => Err(BridgeError::WriteTimeout {
            timeout_ms: limit.as_millis() as u64,
        }),
    }
}
