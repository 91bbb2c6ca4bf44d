//! Peer boundary: the set of known peers and the chain-fetch client.
//!
//! Every node serves its chain as a [`ChainResponse`] and consumes the same
//! structure from its peers during conflict resolution.

use crate::blockchain::Block;
use crate::error::ChainError;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;
use thiserror::Error;

/// A node's chain as exposed on `/chain`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainResponse {
    pub chain: Vec<Block>,
    pub length: usize,
}

impl ChainResponse {
    pub fn new(chain: Vec<Block>) -> Self {
        let length = chain.len();
        Self { chain, length }
    }
}

/// Failure to obtain a peer's chain. Resolution skips the peer on any of these.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("peer answered with status {0}")]
    Status(u16),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("reported length {reported} but sent {actual} blocks")]
    LengthMismatch { reported: usize, actual: usize },

    #[error("{0}")]
    Other(String),
}

/// Source of remote chain snapshots.
#[async_trait]
pub trait ChainFetcher: Send + Sync {
    async fn fetch_chain(&self, peer: &str) -> Result<ChainResponse, FetchError>;
}

/// Fetches `GET {peer}/chain` over HTTP.
#[derive(Debug, Clone)]
pub struct HttpChainFetcher {
    http_client: reqwest::Client,
}

impl HttpChainFetcher {
    pub fn new(timeout: Duration) -> Result<Self, ChainError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChainError::NetworkError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { http_client })
    }

    fn chain_url(peer: &str) -> String {
        if peer.starts_with("http://") || peer.starts_with("https://") {
            format!("{}/chain", peer)
        } else {
            format!("http://{}/chain", peer)
        }
    }
}

#[async_trait]
impl ChainFetcher for HttpChainFetcher {
    async fn fetch_chain(&self, peer: &str) -> Result<ChainResponse, FetchError> {
        let response = self.http_client.get(Self::chain_url(peer)).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        Ok(response.json::<ChainResponse>().await?)
    }
}

/// Endpoints of known peers. Membership only grows.
#[derive(Debug, Default)]
pub struct PeerSet {
    peers: RwLock<BTreeSet<String>>,
}

impl PeerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a peer endpoint; returns false if it was already known.
    pub fn register(&self, address: &str) -> Result<bool, ChainError> {
        let address = normalize_address(address)?;
        Ok(self.peers.write().insert(address))
    }

    /// Register several endpoints at once. Nothing is registered unless every
    /// address is usable; returns how many were new.
    pub fn register_all<S: AsRef<str>>(&self, addresses: &[S]) -> Result<usize, ChainError> {
        let normalized = addresses
            .iter()
            .map(|address| normalize_address(address.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        let mut peers = self.peers.write();
        Ok(normalized
            .into_iter()
            .filter(|address| peers.insert(address.clone()))
            .count())
    }

    pub fn list(&self) -> Vec<String> {
        self.peers.read().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.peers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.read().is_empty()
    }
}

fn normalize_address(address: &str) -> Result<String, ChainError> {
    let address = address.trim().trim_end_matches('/');
    if address.is_empty() {
        return Err(ChainError::InvalidPeer(
            "Peer address cannot be empty".to_string(),
        ));
    }
    Ok(address.to_string())
}
