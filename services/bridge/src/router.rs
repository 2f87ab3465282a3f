//! # Message Router
//!
//! ## Purpose
//!
//! Decides where each decoded producer frame goes and what the producer hears
//! back.
//!
//! | `what`                          | action                    | reply              |
//! |---------------------------------|---------------------------|--------------------|
//! | `get_clientsID`                 | snapshot registered ids   | clients list       |
//! | `update_cam` / `update_orbital` | deliver to `client` only  | `Success`*         |
//! | anything else                   | broadcast to all viewers  | `Success`          |
//!
//! \* or `Client not found: <id>` under [`UnknownTargetPolicy::ReportNotFound`].
//!
//! With [`EmptyRegistryPolicy::Reject`] every frame is answered with
//! `No connected sockets` while no viewer is registered, and nothing is sent.
//! A targeted command without a string `client` field is broadcast.

use crate::client::{ClientManager, Payload};
use crate::error::{RegistryError, Result};
use codec::{status, ClientsIdResponse, InboundMessage, MessageKind};
use relay_config::{ClientsReplyFormat, EmptyRegistryPolicy, RelayOptions, UnknownTargetPolicy};
use std::sync::Arc;
use tracing::{debug, warn};

/// Synchronous answer written back to the producer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProducerReply {
    Success,
    NoConnectedSockets,
    TargetNotFound(String),
    Clients(Vec<String>),
}

impl ProducerReply {
    /// Wire text for this reply
    pub fn render(&self, format: ClientsReplyFormat) -> Result<String> {
        let text = match self {
            ProducerReply::Success => status::SUCCESS.to_string(),
            ProducerReply::NoConnectedSockets => status::NO_CONNECTED_SOCKETS.to_string(),
            ProducerReply::TargetNotFound(id) => {
                format!("{}{}", status::CLIENT_NOT_FOUND_PREFIX, id)
            }
            ProducerReply::Clients(ids) => match format {
                ClientsReplyFormat::Json => {
                    serde_json::to_string(&ClientsIdResponse::new(ids.clone()))?
                }
                ClientsReplyFormat::Delimited => ids.join(codec::constants::CLIENTS_LIST_SEPARATOR),
            },
        };
        Ok(text)
    }
}

/// Routing knobs taken from the relay options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoutingPolicy {
    pub empty_registry: EmptyRegistryPolicy,
    pub unknown_target: UnknownTargetPolicy,
    pub clients_reply: ClientsReplyFormat,
}

impl From<&RelayOptions> for RoutingPolicy {
    fn from(options: &RelayOptions) -> Self {
        Self {
            empty_registry: options.empty_registry,
            unknown_target: options.unknown_target,
            clients_reply: options.clients_reply,
        }
    }
}

pub struct Router {
    clients: Arc<ClientManager>,
    policy: RoutingPolicy,
}

impl Router {
    pub fn new(clients: Arc<ClientManager>, policy: RoutingPolicy) -> Self {
        Self { clients, policy }
    }

    /// Route one frame and produce the producer's reply
    pub async fn route(&self, message: InboundMessage) -> ProducerReply {
        if self.policy.empty_registry == EmptyRegistryPolicy::Reject
            && self.clients.client_count().await == 0
        {
            debug!("No viewers connected, dropping {:?} frame", message.what());
            return ProducerReply::NoConnectedSockets;
        }

        match message.kind() {
            MessageKind::GetClientsId => ProducerReply::Clients(self.clients.live_ids().await),
            kind if kind.is_targeted() => match message.target_client() {
                Some(target) => {
                    let target = target.to_string();
                    self.deliver_targeted(target, &message).await
                }
                None => {
                    debug!("Targeted {:?} frame without client id, broadcasting", kind);
                    self.broadcast(&message).await
                }
            },
            _ => self.broadcast(&message).await,
        }
    }

    /// Render a reply with the configured clients format
    pub fn render(&self, reply: &ProducerReply) -> Result<String> {
        reply.render(self.policy.clients_reply)
    }

    async fn deliver_targeted(&self, target: String, message: &InboundMessage) -> ProducerReply {
        let payload: Payload = Arc::from(message.to_json_text());
        match self.clients.send_to(&target, payload).await {
            Ok(()) => {
                debug!("Delivered {:?} to client {}", message.what(), target);
                ProducerReply::Success
            }
            Err(e) => {
                match &e {
                    RegistryError::NotFound(_) => debug!("Targeted delivery skipped: {}", e),
                    _ => warn!("Targeted delivery failed: {}", e),
                }
                match self.policy.unknown_target {
                    UnknownTargetPolicy::ReportSuccess => ProducerReply::Success,
                    UnknownTargetPolicy::ReportNotFound => ProducerReply::TargetNotFound(target),
                }
            }
        }
    }

    async fn broadcast(&self, message: &InboundMessage) -> ProducerReply {
        let payload: Payload = Arc::from(message.to_json_text());
        let delivered = self.clients.broadcast(payload).await;
        debug!("Broadcast {:?} to {} viewers", message.what(), delivered);
        ProducerReply::Success
    }
}
