//! Telemetry Bridge
//!
//! Accepts JSON telemetry from producers over TCP and relays it to browser
//! visualization clients over WebSocket. Producers get a synchronous status
//! reply for every frame; viewers get a `connected` greeting carrying their
//! routing id, then every update addressed to them.

pub mod client;
pub mod error;
pub mod producer;
pub mod router;
pub mod server;
pub mod viewer;

pub use client::{Client, ClientManager, Payload};
pub use error::{BridgeError, RegistryError, Result};
pub use producer::{serve_producer, ProducerListener, SessionConfig};
pub use router::{ProducerReply, Router, RoutingPolicy};
pub use server::{BoundBridge, BridgeServer};
pub use viewer::{ViewerListener, ViewerState};
