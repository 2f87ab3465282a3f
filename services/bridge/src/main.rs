//! Telemetry bridge entry point

use anyhow::{Context, Result};
use clap::Parser;
use codec::FramingMode;
use relay_config::{BridgeSettings, ProducerMode, DEFAULT_SETTINGS_PATH};
use std::path::PathBuf;
use telemetry_bridge::BridgeServer;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Settings file path
    #[arg(short, long, default_value = DEFAULT_SETTINGS_PATH)]
    settings: PathBuf,

    /// Environment overlay (loads `<stem>.<env>.<ext>` next to the settings file)
    #[arg(short, long)]
    environment: Option<String>,

    /// Producer framing: delimiter or single_shot
    #[arg(long)]
    framing: Option<FramingMode>,

    /// Producer mode: multi or single
    #[arg(long)]
    producer_mode: Option<ProducerMode>,

    /// Override the producer listener port
    #[arg(long)]
    tcp_port: Option<u16>,

    /// Override the viewer listener port
    #[arg(long)]
    ws_port: Option<u16>,
}

impl Args {
    fn apply(&self, settings: &mut BridgeSettings) {
        if let Some(framing) = self.framing {
            settings.relay.framing = framing;
        }
        if let Some(mode) = self.producer_mode {
            settings.relay.producer_mode = mode;
        }
        if let Some(port) = self.tcp_port {
            settings.tcp.port = port;
        }
        if let Some(port) = self.ws_port {
            settings.websocket.port = port;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "telemetry_bridge=info,codec=info,relay_config=info,warn".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!("Starting telemetry bridge");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut settings = match BridgeSettings::load(&args.settings, args.environment.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            error!("Failed to load settings from {}: {:#}", args.settings.display(), e);
            return Err(e);
        }
    };
    args.apply(&mut settings);
    settings.validate().context("Invalid settings after overrides")?;

    info!(
        "Producers on {}, viewers on {} (framing={}, mode={})",
        settings.tcp.address(),
        settings.websocket.address(),
        settings.relay.framing,
        settings.relay.producer_mode
    );

    let server = BridgeServer::new(settings);

    tokio::select! {
        result = server.start() => {
            if let Err(e) = result {
                error!("Telemetry bridge error: {}", e);
                return Err(e.into());
            }
        }
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => info!("Shutdown signal received"),
                Err(e) => warn!("Failed to listen for shutdown signal: {}", e),
            }
        }
    }

    info!("Telemetry bridge stopped");
    Ok(())
}
