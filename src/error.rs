//! Error types for PowLedger

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    InvalidTransaction(String),
    InvalidBlockLinkage { index: u64 },
    InvalidProofOfWork { index: u64 },
    InvalidBlockIndex { position: u64, index: u64 },
    InvalidChain(String),
    InvalidPeer(String),
    EmptyChain,
    NetworkError(String),
    SerializationError(String),
    MiningError(String),
    ConfigError(String),
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ChainError::InvalidTransaction(msg) => write!(f, "Invalid transaction: {}", msg),
            ChainError::InvalidBlockLinkage { index } => {
                write!(f, "Invalid block linkage at block {}", index)
            }
            ChainError::InvalidProofOfWork { index } => {
                write!(f, "Invalid proof of work at block {}", index)
            }
            ChainError::InvalidBlockIndex { position, index } => {
                write!(f, "Block at position {} carries index {}", position, index)
            }
            ChainError::InvalidChain(msg) => write!(f, "Invalid chain: {}", msg),
            ChainError::InvalidPeer(msg) => write!(f, "Invalid peer: {}", msg),
            ChainError::EmptyChain => write!(f, "Chain is empty"),
            ChainError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            ChainError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            ChainError::MiningError(msg) => write!(f, "Mining error: {}", msg),
            ChainError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for ChainError {}

impl From<serde_json::Error> for ChainError {
    fn from(err: serde_json::Error) -> Self {
        ChainError::SerializationError(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;
