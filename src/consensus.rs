//! Longest-valid-chain conflict resolution.
//!
//! A node adopts a peer's chain only if it is strictly longer than every other
//! candidate (its own chain included) and passes [`validate_chain`]. Equal
//! lengths never replace the local chain.

use crate::blockchain::{validate_chain, Block, Blockchain};
use crate::network::{ChainFetcher, ChainResponse, FetchError};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Fetches peer chains and swaps in the best one.
#[derive(Clone)]
pub struct ConsensusResolver {
    fetcher: Arc<dyn ChainFetcher>,
    peer_timeout: Duration,
}

impl ConsensusResolver {
    pub fn new(fetcher: Arc<dyn ChainFetcher>, peer_timeout: Duration) -> Self {
        Self {
            fetcher,
            peer_timeout,
        }
    }

    async fn fetch(&self, peer: &str) -> Result<ChainResponse, FetchError> {
        let response = tokio::time::timeout(self.peer_timeout, self.fetcher.fetch_chain(peer))
            .await
            .map_err(|_| FetchError::Timeout(self.peer_timeout))??;

        if response.length != response.chain.len() {
            return Err(FetchError::LengthMismatch {
                reported: response.length,
                actual: response.chain.len(),
            });
        }
        Ok(response)
    }

    /// Query every peer and replace the local chain with the longest valid one.
    ///
    /// Returns true iff the local chain was replaced. The lock is only held to
    /// read the local length and for the final swap, never across peer requests.
    pub async fn resolve(&self, blockchain: &RwLock<Blockchain>, peers: &[String]) -> bool {
        let local_length = blockchain.read().await.len();

        let responses = join_all(peers.iter().map(|peer| async move {
            (peer.as_str(), self.fetch(peer).await)
        }))
        .await;

        let mut best_length = local_length;
        let mut best_chain: Option<Vec<Block>> = None;

        for (peer, result) in responses {
            let response = match result {
                Ok(response) => response,
                Err(e) => {
                    warn!(peer = %peer, error = %e, "skipping peer during conflict resolution");
                    continue;
                }
            };

            if response.length <= best_length {
                debug!(peer = %peer, length = response.length, best_length, "peer chain not longer");
                continue;
            }

            if let Err(e) = validate_chain(&response.chain) {
                warn!(peer = %peer, length = response.length, error = %e, "rejecting invalid peer chain");
                continue;
            }

            best_length = response.length;
            best_chain = Some(response.chain);
        }

        let Some(chain) = best_chain else {
            return false;
        };

        let mut bc = blockchain.write().await;
        if chain.len() <= bc.len() {
            // Local chain grew while peers were being queried.
            debug!(candidate = chain.len(), local = bc.len(), "candidate no longer longer than local chain");
            return false;
        }

        match bc.replace_chain(chain) {
            Ok(()) => {
                info!(from = local_length, to = bc.len(), "replaced local chain");
                true
            }
            Err(e) => {
                warn!(error = %e, "failed to replace local chain");
                false
            }
        }
    }
}
