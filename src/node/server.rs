//! Node service server

use crate::common::{NodeServiceConfig, Result};
use crate::node::http::{create_router, FaultInjector, NodeState};
use crate::node::table::NodeTables;
use std::net::SocketAddr;
use tokio::net::TcpListener;

pub struct NodeServer {
    config: NodeServiceConfig,
}

impl NodeServer {
    pub fn new(config: NodeServiceConfig) -> Self {
        Self { config }
    }

    fn state(&self) -> NodeState {
        NodeState::new(
            NodeTables::new(self.config.nodes.iter().cloned()),
            FaultInjector::new(self.config.failure_rate),
        )
    }

    pub async fn serve(self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve_on(listener).await
    }

    /// Serve on an already-bound listener (tests bind `127.0.0.1:0`)
    pub async fn serve_on(self, listener: TcpListener) -> Result<()> {
        let local_addr: SocketAddr = listener.local_addr()?;
        tracing::info!("Starting node service on {}", local_addr);
        tracing::info!("  Nodes: {:?}", self.config.nodes);
        tracing::info!("  Failure rate: {}", self.config.failure_rate);

        let router = create_router(self.state());

        tracing::info!("✓ Node service ready");

        axum::serve(listener, router).await?;
        Ok(())
    }
}
