//! Node orchestration: owns the shared ledger, the peer set and the resolver,
//! and exposes the operations the HTTP layer maps onto routes.

use crate::blockchain::{Block, Blockchain};
use crate::config::Config;
use crate::consensus::ConsensusResolver;
use crate::crypto::{generate_node_id, hash_block};
use crate::error::ChainError;
use crate::miner;
use crate::network::{ChainFetcher, ChainResponse, HttpChainFetcher, PeerSet};
use crate::transaction::Transaction;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Counters reported on `/stats`.
#[derive(Debug)]
pub struct NodeStats {
    blocks_mined: AtomicU64,
    transactions_submitted: AtomicU64,
    resolutions: AtomicU64,
    chain_replacements: AtomicU64,
    start_time: Instant,
}

impl NodeStats {
    fn new() -> Self {
        Self {
            blocks_mined: AtomicU64::new(0),
            transactions_submitted: AtomicU64::new(0),
            resolutions: AtomicU64::new(0),
            chain_replacements: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn blocks_mined(&self) -> u64 {
        self.blocks_mined.load(Ordering::Relaxed)
    }

    pub fn transactions_submitted(&self) -> u64 {
        self.transactions_submitted.load(Ordering::Relaxed)
    }

    pub fn resolutions(&self) -> u64 {
        self.resolutions.load(Ordering::Relaxed)
    }

    pub fn chain_replacements(&self) -> u64 {
        self.chain_replacements.load(Ordering::Relaxed)
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }
}

pub struct Node {
    identifier: String,
    pub config: Config,
    pub blockchain: Arc<RwLock<Blockchain>>,
    pub peers: Arc<PeerSet>,
    resolver: ConsensusResolver,
    stats: NodeStats,
    shutdown: watch::Sender<bool>,
}

impl Node {
    /// Create a node that fetches peer chains over HTTP.
    pub fn new(config: Config) -> Result<Self, ChainError> {
        let fetcher = HttpChainFetcher::new(config.peer_timeout())?;
        Self::with_fetcher(config, Arc::new(fetcher))
    }

    /// Create a node with a custom chain-fetch implementation.
    pub fn with_fetcher(config: Config, fetcher: Arc<dyn ChainFetcher>) -> Result<Self, ChainError> {
        let identifier = config
            .node
            .identifier
            .clone()
            .unwrap_or_else(generate_node_id);

        let peers = Arc::new(PeerSet::new());
        for peer in &config.network.bootstrap_peers {
            peers.register(peer)?;
        }

        let resolver = ConsensusResolver::new(fetcher, config.peer_timeout());
        let (shutdown, _) = watch::channel(false);

        Ok(Self {
            identifier,
            config,
            blockchain: Arc::new(RwLock::new(Blockchain::new())),
            peers,
            resolver,
            stats: NodeStats::new(),
            shutdown,
        })
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn stats(&self) -> &NodeStats {
        &self.stats
    }

    /// Queue a transaction; returns the index of the block it is expected to land in.
    pub async fn submit_transaction(
        &self,
        sender: &str,
        recipient: &str,
        amount: i64,
    ) -> Result<u64, ChainError> {
        let index = self
            .blockchain
            .write()
            .await
            .submit_transaction(sender, recipient, amount)?;
        self.stats.transactions_submitted.fetch_add(1, Ordering::Relaxed);
        debug!(sender, recipient, amount, index, "transaction queued");
        Ok(index)
    }

    /// Solve the puzzle for the current tip, credit the reward and seal a block.
    ///
    /// The search runs on a blocking worker without holding the ledger lock. If
    /// the tip moved in the meantime the search is repeated against the new tip.
    pub async fn mine(&self) -> Result<Block, ChainError> {
        loop {
            let (last_proof, tip_hash) = {
                let bc = self.blockchain.read().await;
                let tip = bc.tip()?;
                (tip.proof, hash_block(tip))
            };

            let started = Instant::now();
            let proof = tokio::task::spawn_blocking(move || miner::solve(last_proof))
                .await
                .map_err(|e| ChainError::MiningError(format!("Proof search failed: {}", e)))?;

            let Some(block) = self.seal_on_tip(&tip_hash, proof).await? else {
                debug!("tip changed during proof search, retrying");
                continue;
            };

            info!(
                index = block.index,
                proof,
                txs = block.transactions.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "mined new block"
            );
            return Ok(block);
        }
    }

    /// Credit the reward and seal with `proof`, provided the tip still hashes to
    /// `tip_hash`. Returns `None` and leaves the ledger untouched otherwise.
    async fn seal_on_tip(&self, tip_hash: &str, proof: u64) -> Result<Option<Block>, ChainError> {
        let mut bc = self.blockchain.write().await;
        if hash_block(bc.tip()?) != tip_hash {
            return Ok(None);
        }

        bc.add_transaction(Transaction::reward(self.identifier.as_str()))?;
        let block = bc.seal_block(proof, None)?;
        self.stats.blocks_mined.fetch_add(1, Ordering::Relaxed);
        Ok(Some(block))
    }

    /// Snapshot of the local chain.
    pub async fn chain(&self) -> ChainResponse {
        ChainResponse::new(self.blockchain.read().await.blocks().to_vec())
    }

    pub fn register_peer(&self, address: &str) -> Result<bool, ChainError> {
        let added = self.peers.register(address)?;
        if added {
            info!(peer = %address.trim(), "registered peer");
        }
        Ok(added)
    }

    /// Register a batch of peers; none are added if any address is unusable.
    pub fn register_peers(&self, addresses: &[String]) -> Result<usize, ChainError> {
        let added = self.peers.register_all(addresses)?;
        if added > 0 {
            info!(added, total = self.peers.len(), "registered peers");
        }
        Ok(added)
    }

    pub fn peers(&self) -> Vec<String> {
        self.peers.list()
    }

    /// Run conflict resolution against every known peer.
    pub async fn resolve_conflicts(&self) -> bool {
        let peers = self.peers.list();
        let replaced = self.resolver.resolve(&self.blockchain, &peers).await;

        self.stats.resolutions.fetch_add(1, Ordering::Relaxed);
        if replaced {
            self.stats.chain_replacements.fetch_add(1, Ordering::Relaxed);
        }
        replaced
    }

    /// Ask the running server and background tasks to stop.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Resolves once [`Node::shutdown`] has been called.
    pub async fn shutdown_requested(&self) {
        let mut rx = self.shutdown.subscribe();
        // The sender lives as long as `self`, so this only errors if it is dropped.
        let _ = rx.wait_for(|stop| *stop).await;
    }

    fn spawn_resolution_loop(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let node = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = node.shutdown_requested() => break,
                }

                if node.peers.is_empty() {
                    continue;
                }
                let replaced = node.resolve_conflicts().await;
                debug!(replaced, "periodic conflict resolution finished");
            }
        })
    }

    /// Serve the HTTP API and run background tasks until shutdown.
    pub async fn start(self: Arc<Self>) -> Result<(), Box<dyn std::error::Error>> {
        let addr = self.config.bind_addr()?;
        info!(identifier = %self.identifier, %addr, "starting node");

        let resolution_task = self
            .config
            .resolve_interval()
            .map(|interval| self.spawn_resolution_loop(interval));

        let result = Node::start_api(self.clone(), addr).await;

        self.shutdown();
        if let Some(task) = resolution_task {
            if let Err(e) = task.await {
                warn!("Resolution task ended abnormally: {}", e);
            }
        }
        info!("node stopped");
        result
    }

    #[cfg(feature = "api")]
    async fn start_api(
        node: Arc<Self>,
        addr: std::net::SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error>> {
        crate::api::run_api_server(node, addr).await
    }

    #[cfg(not(feature = "api"))]
    async fn start_api(
        _node: Arc<Self>,
        _addr: std::net::SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error>> {
        Err("API feature not enabled in this build".into())
    }
}
