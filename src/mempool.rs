//! Pending transaction pool

use crate::transaction::Transaction;

/// Ordered transactions waiting to be sealed into the next block.
#[derive(Debug, Clone, Default)]
pub struct PendingPool {
    transactions: Vec<Transaction>,
}

impl PendingPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, tx: Transaction) {
        self.transactions.push(tx);
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Moves every pending transaction out, leaving a fresh empty pool behind.
    pub fn take(&mut self) -> Vec<Transaction> {
        std::mem::take(&mut self.transactions)
    }
}
