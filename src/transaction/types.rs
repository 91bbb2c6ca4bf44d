//! Transaction types for PowLedger

/// Sender used for the reward transaction credited to a node that mines a block.
pub const REWARD_SENDER: &str = "0";

/// Amount credited to the miner for each sealed block.
pub const MINING_REWARD: i64 = 1;

/// A value transfer between two identifiers.
///
/// Transactions are immutable once created; they live either in the pending
/// pool or in exactly one sealed block.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Transaction {
    pub sender: String,
    pub recipient: String,
    pub amount: i64,
}

impl Transaction {
    pub fn new(sender: impl Into<String>, recipient: impl Into<String>, amount: i64) -> Self {
        Transaction {
            sender: sender.into(),
            recipient: recipient.into(),
            amount,
        }
    }

    /// The reward transaction credited to `miner` when it seals a block.
    pub fn reward(miner: impl Into<String>) -> Self {
        Transaction::new(REWARD_SENDER, miner, MINING_REWARD)
    }

    /// Canonical byte encoding used when hashing a block.
    ///
    /// Strings are length-prefixed so that adjacent fields cannot be shifted
    /// into one another without changing the encoding.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.sender.len() + self.recipient.len() + 24);
        bytes.extend_from_slice(&(self.sender.len() as u64).to_le_bytes());
        bytes.extend_from_slice(self.sender.as_bytes());
        bytes.extend_from_slice(&(self.recipient.len() as u64).to_le_bytes());
        bytes.extend_from_slice(self.recipient.as_bytes());
        bytes.extend_from_slice(&self.amount.to_le_bytes());
        bytes
    }
}
