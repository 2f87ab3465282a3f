//! Bridge Settings Module
//!
//! Loads the listener endpoints and relay options once at startup. The file
//! shares its shape with the web frontend's `serverSettings.json`, so one file
//! configures both:
//!
//! ```json
//! {
//!   "HTTP": { "host": "127.0.0.1", "port": 8080 },
//!   "TCP": { "port": 3000 },
//!   "WebSocket": { "port": 3001 },
//!   "relay": { "framing": "delimiter", "producer_mode": "multi" }
//! }
//! ```
//!
//! JSON and TOML are both accepted, picked by file extension. Host values may
//! reference environment variables (`"${BRIDGE_HOST}"`). An optional
//! environment overlay `<stem>.<env>.<ext>` next to the base file is merged
//! on top.

use anyhow::{bail, Context, Result};
use codec::constants::DEFAULT_MAX_FRAME_BYTES;
use codec::FramingMode;
use config_crate::{Config, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::policy::{ClientsReplyFormat, EmptyRegistryPolicy, ProducerMode, UnknownTargetPolicy};

/// Default settings location, relative to the working directory
pub const DEFAULT_SETTINGS_PATH: &str = "static/serverSettings.json";

/// A host/port pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    #[serde(default = "default_bind_host")]
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// `host:port`, suitable for `SocketAddr` parsing or `TcpListener::bind`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_bind_host() -> String {
    "0.0.0.0".to_string()
}

/// Relay behavior options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayOptions {
    /// Producer stream framing
    pub framing: FramingMode,

    /// Single or multiple concurrent producers
    pub producer_mode: ProducerMode,

    /// Reply when no viewer is connected
    pub empty_registry: EmptyRegistryPolicy,

    /// Reply when a targeted command names an unknown viewer
    pub unknown_target: UnknownTargetPolicy,

    /// Shape of the clients list reply
    pub clients_reply: ClientsReplyFormat,

    /// Maximum number of concurrent viewer connections
    pub max_connections: usize,

    /// Outbound message queue size per viewer
    pub client_buffer_size: usize,

    /// Per-message write timeout towards a viewer
    pub write_timeout_ms: u64,

    /// Largest frame the decoder will buffer
    pub max_frame_bytes: usize,

    /// Allow the web frontend's origin to reach the viewer endpoint
    pub enable_cors: bool,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            framing: FramingMode::Delimiter,
            producer_mode: ProducerMode::Multi,
            empty_registry: EmptyRegistryPolicy::Reject,
            unknown_target: UnknownTargetPolicy::ReportSuccess,
            clients_reply: ClientsReplyFormat::Json,
            max_connections: 1000,
            client_buffer_size: 1000,
            write_timeout_ms: 5000,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            enable_cors: true,
        }
    }
}

impl RelayOptions {
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

/// Complete bridge settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeSettings {
    /// Web frontend endpoint, used for the CORS origin
    #[serde(rename = "http", alias = "HTTP", default)]
    pub http: Option<Endpoint>,

    /// Producer listener
    #[serde(rename = "tcp", alias = "TCP")]
    pub tcp: Endpoint,

    /// Viewer listener
    #[serde(rename = "websocket", alias = "WebSocket")]
    pub websocket: Endpoint,

    #[serde(default)]
    pub relay: RelayOptions,
}

impl BridgeSettings {
    /// Load settings from `path`, merging an optional environment overlay
    pub fn load(path: &Path, environment: Option<&str>) -> Result<Self> {
        let path_str = path.to_string_lossy();
        let expanded =
            shellexpand::full(&path_str).context("Failed to expand settings path")?;
        let base = PathBuf::from(expanded.as_ref());

        if !base.exists() {
            bail!("Settings file not found: {}", base.display());
        }

        info!("Loading bridge settings: {}", base.display());
        let mut builder = Config::builder().add_source(File::from(base.as_path()).required(true));

        if let Some(env) = environment {
            let overlay = overlay_path(&base, env);
            if overlay.exists() {
                info!("Loading environment settings: {}", overlay.display());
                builder = builder.add_source(File::from(overlay.as_path()));
            } else {
                warn!("Environment settings not found: {}", overlay.display());
            }
        }

        let config = builder.build().context("Failed to build settings")?;
        let mut settings: Self = config
            .try_deserialize()
            .context("Failed to deserialize settings")?;

        settings.expand_env_vars()?;
        settings.validate()?;
        debug!("Settings loaded: {:?}", settings);
        Ok(settings)
    }

    /// Parse settings from JSON text without touching the filesystem
    pub fn from_json(text: &str) -> Result<Self> {
        let mut settings: Self = serde_json::from_str(text).context("Invalid settings JSON")?;
        settings.expand_env_vars()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parse settings from TOML text without touching the filesystem
    pub fn from_toml(text: &str) -> Result<Self> {
        let mut settings: Self = toml::from_str(text).context("Invalid settings TOML")?;
        settings.expand_env_vars()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Expand environment variables in host values
    pub fn expand_env_vars(&mut self) -> Result<()> {
        for endpoint in [Some(&mut self.tcp), Some(&mut self.websocket), self.http.as_mut()]
            .into_iter()
            .flatten()
        {
            let expanded =
                shellexpand::env(&endpoint.host).context("Failed to expand endpoint host")?;
            endpoint.host = expanded.into_owned();
        }
        Ok(())
    }

    /// Reject settings the bridge cannot run with
    pub fn validate(&self) -> Result<()> {
        let relay = &self.relay;
        if relay.max_connections == 0 {
            bail!("relay.max_connections must be greater than zero");
        }
        if relay.client_buffer_size == 0 {
            bail!("relay.client_buffer_size must be greater than zero");
        }
        if relay.write_timeout_ms == 0 {
            bail!("relay.write_timeout_ms must be greater than zero");
        }
        if relay.max_frame_bytes == 0 {
            bail!("relay.max_frame_bytes must be greater than zero");
        }
        if self.tcp.port != 0 && self.tcp == self.websocket {
            bail!(
                "TCP and WebSocket listeners cannot share {}",
                self.tcp.address()
            );
        }
        Ok(())
    }

    /// Origin allowed by CORS: the web frontend's address, if configured
    pub fn cors_origin(&self) -> Option<String> {
        self.http
            .as_ref()
            .map(|http| format!("http://{}:{}", http.host, http.port))
    }
}

/// `settings.json` + `dev` -> `settings.dev.json`
fn overlay_path(base: &Path, environment: &str) -> PathBuf {
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = match base.extension() {
        Some(ext) => format!("{}.{}.{}", stem, environment, ext.to_string_lossy()),
        None => format!("{}.{}", stem, environment),
    };
    base.with_file_name(file_name)
}
