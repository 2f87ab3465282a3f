//! # Telemetry Bridge Codec
//!
//! ## Purpose
//!
//! The "rules" layer of the bridge: how producer bytes become messages and
//! what those messages look like.
//! - Producer stream framing (NUL-delimited and legacy single-shot)
//! - The `{"what": ...}` JSON envelope and its routing classes
//! - Reply shapes written back to producers and viewers
//! - Wire constants
//!
//! ## Architecture Role
//!
//! ```text
//! TCP bytes → [FrameDecoder] → InboundMessage → Router (services/bridge)
//!                  ↑                  ↓
//!             per-connection     what / client
//!             ByteBuffer         discriminators
//! ```
//!
//! ## What This Crate Does NOT Contain
//! - Socket handling or listeners (belongs in services/bridge)
//! - The viewer registry or routing decisions

pub mod constants;
pub mod error;
pub mod framing;
pub mod message;

pub use constants::{what, status};
pub use error::{CodecError, Result};
pub use framing::{FrameDecoder, FramingMode};
pub use message::{ClientsIdResponse, ConnectedGreeting, InboundMessage, MessageKind};
