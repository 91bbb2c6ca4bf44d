//! Integration tests for longest-valid-chain conflict resolution

use async_trait::async_trait;
use powledger::blockchain::{Block, Blockchain};
use powledger::consensus::ConsensusResolver;
use powledger::miner;
use powledger::network::{ChainFetcher, ChainResponse, FetchError};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Peer behaviours for the mock fetcher.
#[derive(Clone)]
enum Peer {
    Serves(ChainResponse),
    Unreachable,
    Hangs,
}

struct MockFetcher {
    peers: HashMap<String, Peer>,
}

#[async_trait]
impl ChainFetcher for MockFetcher {
    async fn fetch_chain(&self, peer: &str) -> Result<ChainResponse, FetchError> {
        match self.peers.get(peer) {
            Some(Peer::Serves(response)) => Ok(response.clone()),
            Some(Peer::Hangs) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(FetchError::Other("woke up".to_string()))
            }
            Some(Peer::Unreachable) | None => {
                Err(FetchError::Other(format!("connection refused: {}", peer)))
            }
        }
    }
}

/// A valid chain of `length` blocks, each carrying one transaction.
fn mined_chain(length: usize) -> Vec<Block> {
    let mut bc = Blockchain::new();
    while bc.len() < length {
        bc.submit_transaction("alice", "bob", bc.len() as i64).unwrap();
        let last_proof = bc.tip().unwrap().proof;
        bc.seal_block(miner::solve(last_proof), None).unwrap();
    }
    bc.blocks().to_vec()
}

/// A chain of `length` blocks whose linkage is broken.
fn forged_chain(length: usize) -> Vec<Block> {
    let mut bc = Blockchain::new();
    while bc.len() < length {
        bc.seal_block(0, Some("forged")).unwrap();
    }
    bc.blocks().to_vec()
}

/// Seals a block on the local ledger before answering, as if the node mined
/// while the request was in flight.
struct GrowsLocalFetcher {
    ledger: Arc<RwLock<Blockchain>>,
    response: ChainResponse,
}

#[async_trait]
impl ChainFetcher for GrowsLocalFetcher {
    async fn fetch_chain(&self, _peer: &str) -> Result<ChainResponse, FetchError> {
        let mut bc = self.ledger.write().await;
        let last_proof = bc.tip().map_err(|e| FetchError::Other(e.to_string()))?.proof;
        bc.seal_block(miner::solve(last_proof), None)
            .map_err(|e| FetchError::Other(e.to_string()))?;
        Ok(self.response.clone())
    }
}

fn resolver(peers: Vec<(&str, Peer)>, timeout: Duration) -> (ConsensusResolver, Vec<String>) {
    let names = peers.iter().map(|(name, _)| name.to_string()).collect();
    let peers = peers
        .into_iter()
        .map(|(name, peer)| (name.to_string(), peer))
        .collect();
    (
        ConsensusResolver::new(Arc::new(MockFetcher { peers }), timeout),
        names,
    )
}

fn local_ledger(length: usize) -> RwLock<Blockchain> {
    let mut bc = Blockchain::new();
    bc.replace_chain(mined_chain(length)).unwrap();
    RwLock::new(bc)
}

#[tokio::test]
async fn test_longest_valid_peer_chain_wins() {
    tokio::time::timeout(Duration::from_secs(120), async {
        let local = local_ledger(3);
        let five = mined_chain(5);
        let (resolver, peers) = resolver(
            vec![
                ("short", Peer::Serves(ChainResponse::new(mined_chain(2)))),
                ("long", Peer::Serves(ChainResponse::new(five.clone()))),
            ],
            Duration::from_secs(1),
        );

        assert!(resolver.resolve(&local, &peers).await);
        assert_eq!(local.read().await.blocks(), five.as_slice());
    })
    .await
    .expect("test_longest_valid_peer_chain_wins timed out");
}

#[tokio::test]
async fn test_shorter_equal_and_invalid_chains_do_not_replace() {
    tokio::time::timeout(Duration::from_secs(120), async {
        let local = local_ledger(3);
        let before = local.read().await.blocks().to_vec();
        let (resolver, peers) = resolver(
            vec![
                ("short", Peer::Serves(ChainResponse::new(mined_chain(2)))),
                ("equal", Peer::Serves(ChainResponse::new(mined_chain(3)))),
                ("forged", Peer::Serves(ChainResponse::new(forged_chain(6)))),
            ],
            Duration::from_secs(1),
        );

        assert!(!resolver.resolve(&local, &peers).await);
        assert_eq!(local.read().await.blocks(), before.as_slice());
    })
    .await
    .expect("test_shorter_equal_and_invalid_chains_do_not_replace timed out");
}

#[tokio::test]
async fn test_failing_peers_do_not_abort_resolution() {
    tokio::time::timeout(Duration::from_secs(120), async {
        let local = local_ledger(1);
        let four = mined_chain(4);
        let (resolver, peers) = resolver(
            vec![
                ("down", Peer::Unreachable),
                ("stuck", Peer::Hangs),
                ("good", Peer::Serves(ChainResponse::new(four.clone()))),
            ],
            Duration::from_millis(200),
        );

        assert!(resolver.resolve(&local, &peers).await);
        assert_eq!(local.read().await.blocks(), four.as_slice());
    })
    .await
    .expect("test_failing_peers_do_not_abort_resolution timed out");
}

#[tokio::test]
async fn test_longer_forged_chain_does_not_shadow_valid_one() {
    tokio::time::timeout(Duration::from_secs(120), async {
        let local = local_ledger(2);
        let three = mined_chain(3);
        let (resolver, peers) = resolver(
            vec![
                ("forged", Peer::Serves(ChainResponse::new(forged_chain(8)))),
                ("valid", Peer::Serves(ChainResponse::new(three.clone()))),
            ],
            Duration::from_secs(1),
        );

        assert!(resolver.resolve(&local, &peers).await);
        assert_eq!(local.read().await.len(), 3);
        assert_eq!(local.read().await.blocks(), three.as_slice());
    })
    .await
    .expect("test_longer_forged_chain_does_not_shadow_valid_one timed out");
}

#[tokio::test]
async fn test_replacement_keeps_pending_pool() {
    tokio::time::timeout(Duration::from_secs(120), async {
        let local = local_ledger(1);
        local
            .write()
            .await
            .submit_transaction("carol", "dave", 4)
            .unwrap();
        let (resolver, peers) = resolver(
            vec![("peer", Peer::Serves(ChainResponse::new(mined_chain(2))))],
            Duration::from_secs(1),
        );

        assert!(resolver.resolve(&local, &peers).await);
        let bc = local.read().await;
        assert_eq!(bc.len(), 2);
        assert_eq!(bc.mempool().len(), 1);
    })
    .await
    .expect("test_replacement_keeps_pending_pool timed out");
}

#[tokio::test]
async fn test_linked_chain_with_overflowing_index_is_rejected() {
    tokio::time::timeout(Duration::from_secs(120), async {
        let local = local_ledger(1);
        let mut bogus = mined_chain(2);
        bogus[1].index = u64::MAX;
        let (resolver, peers) = resolver(
            vec![("peer", Peer::Serves(ChainResponse::new(bogus)))],
            Duration::from_secs(1),
        );

        assert!(!resolver.resolve(&local, &peers).await);
        let mut bc = local.write().await;
        assert_eq!(bc.len(), 1);
        assert_eq!(bc.submit_transaction("alice", "bob", 1).unwrap(), 2);
    })
    .await
    .expect("test_linked_chain_with_overflowing_index_is_rejected timed out");
}

#[tokio::test]
async fn test_ledger_stays_usable_while_peers_are_queried() {
    tokio::time::timeout(Duration::from_secs(30), async {
        let local = Arc::new(local_ledger(1));
        let (resolver, peers) = resolver(vec![("stuck", Peer::Hangs)], Duration::from_secs(2));

        let resolution = {
            let local = local.clone();
            tokio::spawn(async move { resolver.resolve(&local, &peers).await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;

        // Both a writer and a reader get through while the peer is still hanging.
        let index = tokio::time::timeout(Duration::from_millis(500), async {
            local.write().await.submit_transaction("carol", "dave", 2)
        })
        .await
        .expect("ledger write lock held during peer fetch")
        .unwrap();
        assert_eq!(index, 2);
        let length = tokio::time::timeout(Duration::from_millis(500), async {
            local.read().await.len()
        })
        .await
        .expect("ledger read lock held during peer fetch");
        assert_eq!(length, 1);
        assert!(!resolution.is_finished());

        assert!(!resolution.await.unwrap());
        assert_eq!(local.read().await.mempool().len(), 1);
    })
    .await
    .expect("test_ledger_stays_usable_while_peers_are_queried timed out");
}

#[tokio::test]
async fn test_candidate_outgrown_during_fetch_is_not_adopted() {
    tokio::time::timeout(Duration::from_secs(120), async {
        let local = Arc::new(local_ledger(2));
        let peer_chain = mined_chain(3);
        let fetcher = GrowsLocalFetcher {
            ledger: local.clone(),
            response: ChainResponse::new(peer_chain.clone()),
        };
        let resolver = ConsensusResolver::new(Arc::new(fetcher), Duration::from_secs(5));

        assert!(!resolver.resolve(&local, &["peer".to_string()]).await);

        let bc = local.read().await;
        assert_eq!(bc.len(), 3);
        assert_ne!(bc.blocks(), peer_chain.as_slice());
        assert!(powledger::blockchain::is_valid_chain(bc.blocks()));
    })
    .await
    .expect("test_candidate_outgrown_during_fetch_is_not_adopted timed out");
}
