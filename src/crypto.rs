//! Hashing primitives and node identifiers for PowLedger

use crate::blockchain::Block;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 digest of arbitrary bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Digest of a block's canonical content.
///
/// Every field participates, including the transaction list in order, so two
/// blocks hash equal only if they are structurally identical.
pub fn hash_block(block: &Block) -> String {
    let mut hasher = Sha256::new();
    hasher.update(block.index.to_le_bytes());
    hasher.update(block.timestamp.to_le_bytes());
    hasher.update((block.transactions.len() as u64).to_le_bytes());
    for tx in &block.transactions {
        hasher.update(tx.canonical_bytes());
    }
    hasher.update(block.proof.to_le_bytes());
    hasher.update((block.previous_hash.len() as u64).to_le_bytes());
    hasher.update(block.previous_hash.as_bytes());
    hex::encode(hasher.finalize())
}

/// Generates a random node identifier formatted like a version 4 UUID.
pub fn generate_node_id() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    format!(
        "{}-{}-{}-{}-{}",
        hex::encode(&bytes[..4]),
        hex::encode(&bytes[4..6]),
        hex::encode(&bytes[6..8]),
        hex::encode(&bytes[8..10]),
        hex::encode(&bytes[10..])
    )
}
