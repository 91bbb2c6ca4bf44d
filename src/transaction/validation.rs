//! Validation logic for transactions separated from type definitions

use crate::error::ChainError;
use crate::transaction::types::Transaction;

impl Transaction {
    /// Stateless field validation applied before a transaction enters the pending pool.
    pub fn validate(&self) -> Result<(), ChainError> {
        if self.sender.is_empty() {
            return Err(ChainError::InvalidTransaction(
                "Missing sender".to_string(),
            ));
        }
        if self.recipient.is_empty() {
            return Err(ChainError::InvalidTransaction(
                "Missing recipient".to_string(),
            ));
        }
        if self.amount == 0 {
            return Err(ChainError::InvalidTransaction(
                "Amount must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
