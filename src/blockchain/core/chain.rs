use crate::crypto::hash_block;
use crate::error::ChainError;
use crate::mempool::PendingPool;
use crate::transaction::Transaction;
use tracing::debug;

/// Proof carried by the genesis block.
pub const GENESIS_PROOF: u64 = 100;

/// Previous-hash sentinel of the genesis block; exempt from linkage checks.
pub const GENESIS_PREVIOUS_HASH: &str = "1";

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Block {
    pub index: u64,
    /// Wall clock at creation, in nanoseconds since the Unix epoch.
    pub timestamp: i64,
    pub transactions: Vec<Transaction>,
    pub proof: u64,
    pub previous_hash: String,
}

impl Block {
    pub fn hash(&self) -> String {
        hash_block(self)
    }
}

fn next_index(tip: &Block) -> Result<u64, ChainError> {
    tip.index.checked_add(1).ok_or_else(|| {
        ChainError::InvalidChain(format!("Block index {} cannot be followed", tip.index))
    })
}

fn now_nanos() -> i64 {
    chrono::Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX)
}

/// The local ledger: an append-only chain plus the pool of unconfirmed transactions.
///
/// The chain is never empty. Callers share a `Blockchain` behind a lock; every
/// method here either completes fully or leaves both chain and pool untouched.
#[derive(Debug, Clone)]
pub struct Blockchain {
    blocks: Vec<Block>,
    mempool: PendingPool,
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::new()
    }
}

impl Blockchain {
    /// Create a new `Blockchain` seeded with its genesis block.
    pub fn new() -> Self {
        let genesis = Block {
            index: 1,
            timestamp: now_nanos(),
            transactions: Vec::new(),
            proof: GENESIS_PROOF,
            previous_hash: GENESIS_PREVIOUS_HASH.to_string(),
        };

        Blockchain {
            blocks: vec![genesis],
            mempool: PendingPool::new(),
        }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn mempool(&self) -> &PendingPool {
        &self.mempool
    }

    /// The last block of the chain.
    pub fn tip(&self) -> Result<&Block, ChainError> {
        self.blocks.last().ok_or(ChainError::EmptyChain)
    }

    /// Validate and queue a transaction, returning the index of the block it
    /// is expected to land in. The index is advisory: more transactions may
    /// arrive before the next block is sealed.
    pub fn submit_transaction(
        &mut self,
        sender: &str,
        recipient: &str,
        amount: i64,
    ) -> Result<u64, ChainError> {
        self.add_transaction(Transaction::new(sender, recipient, amount))
    }

    pub fn add_transaction(&mut self, tx: Transaction) -> Result<u64, ChainError> {
        tx.validate()?;
        let next_index = next_index(self.tip()?)?;
        self.mempool.push(tx);
        Ok(next_index)
    }

    /// Seal every pending transaction into a new block and append it.
    ///
    /// When `previous_hash` is absent or empty the hash of the current tip is used.
    pub fn seal_block(
        &mut self,
        proof: u64,
        previous_hash: Option<&str>,
    ) -> Result<Block, ChainError> {
        let tip = self.tip()?;
        let previous_hash = match previous_hash {
            Some(hash) if !hash.is_empty() => hash.to_string(),
            _ => tip.hash(),
        };
        let index = next_index(tip)?;
        let timestamp = now_nanos().max(tip.timestamp.saturating_add(1));

        let block = Block {
            index,
            timestamp,
            transactions: self.mempool.take(),
            proof,
            previous_hash,
        };

        debug!(index, txs = block.transactions.len(), "sealed block");
        self.blocks.push(block.clone());
        Ok(block)
    }

    /// Substitute the whole chain. The pending pool is left as is.
    pub fn replace_chain(&mut self, blocks: Vec<Block>) -> Result<(), ChainError> {
        if blocks.is_empty() {
            return Err(ChainError::EmptyChain);
        }
        self.blocks = blocks;
        Ok(())
    }
}
