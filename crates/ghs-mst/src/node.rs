//! A single process of the distributed computation, wired to TCP.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use ghs_mst_core::{ProcessId, ProcessState};
use ghs_mst_net::transport::tcp;
use ghs_mst_net::{DispatchLoop, LoopOutcome, TcpTransport};

use crate::config::{NodeConfig, Topology};
use crate::error::{NodeError, Result};
use crate::identity::resolve_identity;

/// One process: its identity, the shared topology and its runtime settings.
#[derive(Debug, Clone)]
pub struct Node {
    id: ProcessId,
    topology: Topology,
    config: NodeConfig,
}

impl Node {
    /// Create a node for `id`.
    ///
    /// Fails if the topology gives the process no links.
    pub fn new(id: ProcessId, topology: Topology, config: NodeConfig) -> Result<Self> {
        if topology.links_for(id).is_empty() {
            return Err(NodeError::NoLinks(id));
        }
        if !topology.is_connected() {
            warn!("topology is not connected; fragments will never merge into one tree");
        }
        Ok(Self {
            id,
            topology,
            config,
        })
    }

    /// Resolve the identity and load the topology named by `config`.
    pub fn from_config(config: NodeConfig) -> Result<Self> {
        let id = resolve_identity(&config)?;
        let topology = Topology::load(&config.topology_path)?;
        info!(
            process = %id,
            topology = %config.topology_path.display(),
            edges = topology.edges().len(),
            "configuration loaded"
        );
        Self::new(id, topology, config)
    }

    pub fn id(&self) -> ProcessId {
        self.id
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Whether this process wakes up on its own.
    pub fn is_initiator(&self) -> bool {
        self.id == self.topology.initiator()
    }

    /// Bind the listening socket for this process.
    pub async fn bind(&self) -> Result<TcpListener> {
        let addr = self
            .config
            .addressing
            .bind_address(self.id)
            .ok_or(NodeError::NoAddress(self.id))?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| NodeError::Bind { addr, source })?;
        info!(process = %self.id, %addr, "listening");
        Ok(listener)
    }

    /// Bind, then serve until termination or shutdown.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<LoopOutcome> {
        let listener = self.bind().await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener.
    ///
    /// The accept loop feeds the bounded incoming queue; the dispatch loop is
    /// its only consumer. Returns once this process detects termination,
    /// `shutdown` flips to `true`, or the queue closes.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: watch::Receiver<bool>,
    ) -> Result<LoopOutcome> {
        let (inbox_tx, inbox_rx) = mpsc::channel(self.config.queue_capacity);
        let id = self.id;
        let read_timeout = self.config.read_timeout;
        let server = tokio::spawn(async move {
            if let Err(e) = tcp::serve(listener, inbox_tx, read_timeout).await {
                debug!(process = %id, error = %e, "accept loop stopped");
            }
        });

        let transport = Arc::new(TcpTransport::new(id, self.config.addressing));
        let state = ProcessState::new(id, self.topology.links_for(id));
        let outcome = DispatchLoop::new(state, transport, inbox_rx)
            .wake_on_start(self.is_initiator())
            .run(shutdown)
            .await;
        server.abort();

        let outcome = outcome?;
        info!(
            process = %id,
            level = %outcome.summary.level,
            fragment = ?outcome.summary.fragment,
            branches = ?outcome.summary.branch_weights(),
            halted = outcome.halted,
            "process finished"
        );
        Ok(outcome)
    }
}
