//! # Telemetry Bridge Configuration
//!
//! Settings loading and relay policy knobs for the bridge service.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use relay_config::{BridgeSettings, DEFAULT_SETTINGS_PATH};
//! use std::path::Path;
//!
//! let settings = BridgeSettings::load(Path::new(DEFAULT_SETTINGS_PATH), None)?;
//! println!("producers on {}", settings.tcp.address());
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod policy;
pub mod settings;

// Re-export commonly used types
pub use policy::{ClientsReplyFormat, EmptyRegistryPolicy, ProducerMode, UnknownTargetPolicy};
pub use settings::{BridgeSettings, Endpoint, RelayOptions, DEFAULT_SETTINGS_PATH};
