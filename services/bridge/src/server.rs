//! Bridge server: wires the producer listener and the viewer listener around
//! one shared connection registry

use crate::client::ClientManager;
use crate::error::{BridgeError, Result};
use crate::producer::ProducerListener;
use crate::router::{Router, RoutingPolicy};
use crate::viewer::ViewerListener;
use futures_util::future::BoxFuture;
use relay_config::BridgeSettings;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::lookup_host;
use tracing::{error, info};

/// Main bridge server
pub struct BridgeServer {
    settings: BridgeSettings,
    client_manager: Arc<ClientManager>,
    router: Arc<Router>,
}

impl BridgeServer {
    pub fn new(settings: BridgeSettings) -> Self {
        let client_manager = Arc::new(ClientManager::new());
        let router = Arc::new(Router::new(
            client_manager.clone(),
            RoutingPolicy::from(&settings.relay),
        ));

        Self {
            settings,
            client_manager,
            router,
        }
    }

    pub fn client_manager(&self) -> Arc<ClientManager> {
        self.client_manager.clone()
    }

    /// Bind both listeners without serving yet
    pub async fn bind(&self) -> Result<BoundBridge> {
        let producer = ProducerListener::bind(
            &self.settings.tcp.address(),
            self.router.clone(),
            &self.settings.relay,
        )
        .await?;
        let producer_addr = producer.local_addr()?;

        let viewer_addr = resolve(&self.settings.websocket.address()).await?;
        let (viewer_addr, viewer) =
            ViewerListener::new(self.client_manager.clone(), &self.settings).bind(viewer_addr)?;
        info!("✅ Viewer listener bound on {}", viewer_addr);

        Ok(BoundBridge {
            producer_addr,
            viewer_addr,
            producer,
            viewer,
        })
    }

    /// Bind and serve until a listener fails
    pub async fn start(&self) -> Result<()> {
        info!("Starting telemetry bridge");
        self.bind().await?.run().await
    }
}

/// Both listeners bound, with their resolved local addresses
pub struct BoundBridge {
    pub producer_addr: SocketAddr,
    pub viewer_addr: SocketAddr,
    producer: ProducerListener,
    viewer: BoxFuture<'static, ()>,
}

impl BoundBridge {
    pub async fn run(self) -> Result<()> {
        let producer_handle = tokio::spawn(self.producer.run());
        let viewer_handle = tokio::spawn(self.viewer);

        info!(
            "Telemetry bridge running: producers on {}, viewers on {}",
            self.producer_addr, self.viewer_addr
        );

        tokio::select! {
            result = producer_handle => match result {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => {
                    error!("Producer listener failed: {}", e);
                    Err(e)
                }
                Err(e) => {
                    error!("Producer listener task failed: {}", e);
                    Err(BridgeError::Configuration { message: e.to_string() })
                }
            },
            result = viewer_handle => {
                if let Err(e) = result {
                    error!("Viewer listener task failed: {}", e);
                }
                Ok(())
            }
        }
    }
}

async fn resolve(address: &str) -> Result<SocketAddr> {
    lookup_host(address)
        .await?
        .next()
        .ok_or_else(|| BridgeError::Configuration {
            message: format!("Address {} did not resolve", address),
        })
}
