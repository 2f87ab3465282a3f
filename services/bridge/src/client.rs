//! Viewer connection registry
//!
//! Every live viewer owns a bounded outbound queue; the registry only holds the
//! sending half. Delivery is a non-blocking `try_send`, so the registry lock is
//! never held across socket I/O. A failed enqueue (queue closed, or full
//! because the viewer stalled) prunes the entry immediately.

use crate::error::RegistryError;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Serialized JSON text, shared by every queue it is fanned out to
pub type Payload = Arc<str>;

/// One registered viewer
pub struct Client {
    pub id: String,
    sender: mpsc::Sender<Payload>,
    connected_at: Instant,
}

impl Client {
    pub fn new(id: String, sender: mpsc::Sender<Payload>) -> Self {
        Self {
            id,
            sender,
            connected_at: Instant::now(),
        }
    }

    /// Queue a payload for this viewer without waiting
    pub fn send_message(&self, payload: Payload) -> Result<(), RegistryError> {
        self.sender.try_send(payload).map_err(|e| {
            match e {
                TrySendError::Full(_) => {
                    warn!("Outbound queue full for client {}, disconnecting", self.id)
                }
                TrySendError::Closed(_) => debug!("Outbound queue closed for client {}", self.id),
            }
            RegistryError::Disconnected(self.id.clone())
        })
    }

    /// The viewer's session still drains the queue
    pub fn is_live(&self) -> bool {
        !self.sender.is_closed()
    }

    pub fn connected_for(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

/// Manages all connected viewers
#[derive(Default)]
pub struct ClientManager {
    clients: RwLock<HashMap<String, Client>>,
}

impl ClientManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a viewer under a freshly generated id
    pub async fn register(&self, sender: mpsc::Sender<Payload>) -> String {
        let client_id = Uuid::new_v4().simple().to_string();
        self.register_as(client_id.clone(), sender).await;
        client_id
    }

    /// Register a viewer unless `max_connections` viewers are already registered
    pub async fn try_register(
        &self,
        sender: mpsc::Sender<Payload>,
        max_connections: usize,
    ) -> Result<String, RegistryError> {
        let mut clients = self.clients.write().await;

        if clients.len() >= max_connections {
            return Err(RegistryError::LimitReached(max_connections));
        }

        let client_id = Uuid::new_v4().simple().to_string();
        clients.insert(client_id.clone(), Client::new(client_id.clone(), sender));

        info!(
            "Added client {}, total connections: {}",
            client_id,
            clients.len()
        );
        Ok(client_id)
    }

    /// Register a viewer under a caller-chosen id, replacing any existing entry
    pub async fn register_as(&self, client_id: impl Into<String>, sender: mpsc::Sender<Payload>) {
        let client_id = client_id.into();
        let mut clients = self.clients.write().await;

        let client = Client::new(client_id.clone(), sender);
        if clients.insert(client_id.clone(), client).is_some() {
            warn!("Replaced existing registration for client {}", client_id);
        }

        info!(
            "Added client {}, total connections: {}",
            client_id,
            clients.len()
        );
    }

    /// Remove a viewer; unknown ids are ignored
    pub async fn unregister(&self, client_id: &str) -> bool {
        let mut clients = self.clients.write().await;
        match clients.remove(client_id) {
            Some(client) => {
                info!(
                    "Removed client {} after {:?}, total connections: {}",
                    client_id,
                    client.connected_for(),
                    clients.len()
                );
                true
            }
            None => false,
        }
    }

    /// Snapshot of the registered ids, sorted
    pub async fn live_ids(&self) -> Vec<String> {
        let clients = self.clients.read().await;
        let mut ids: Vec<String> = clients
            .values()
            .filter(|client| client.is_live())
            .map(|client| client.id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Deliver to one viewer
    pub async fn send_to(&self, client_id: &str, payload: Payload) -> Result<(), RegistryError> {
        let clients = self.clients.read().await;
        let client = clients
            .get(client_id)
            .ok_or_else(|| RegistryError::NotFound(client_id.to_string()))?;

        match client.send_message(payload) {
            Ok(()) => Ok(()),
            Err(e) => {
                let failed = vec![(client.id.clone(), client.sender.clone())];
                drop(clients);
                self.prune(failed).await;
                Err(e)
            }
        }
    }

    /// Deliver to every viewer, returning how many accepted the payload
    pub async fn broadcast(&self, payload: Payload) -> usize {
        let clients = self.clients.read().await;
        let mut delivered = 0;
        let mut failed_clients = Vec::new();

        for (client_id, client) in clients.iter() {
            match client.send_message(payload.clone()) {
                Ok(()) => delivered += 1,
                Err(_) => failed_clients.push((client_id.clone(), client.sender.clone())),
            }
        }

        drop(clients); // Release read lock before acquiring write lock

        if !failed_clients.is_empty() {
            self.prune(failed_clients).await;
        }

        delivered
    }

    /// Remove entries whose delivery failed, unless the id was re-registered meanwhile
    async fn prune(&self, failed: Vec<(String, mpsc::Sender<Payload>)>) {
        let mut clients = self.clients.write().await;
        for (client_id, sender) in failed {
            let same_entry = clients
                .get(&client_id)
                .is_some_and(|client| client.sender.same_channel(&sender));
            if same_entry {
                clients.remove(&client_id);
                debug!("Removed disconnected client {}", client_id);
            }
        }
    }

    /// Get the number of connected clients
    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }
}
