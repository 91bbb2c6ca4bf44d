//! Proof-of-work puzzle: search and verification.
//!
//! A proof `p` is valid for a previous proof `last` when the SHA-256 hex digest
//! of the decimal concatenation `"{last}{p}"` ends with [`DIFFICULTY_SUFFIX`].
//! Difficulty is fixed; a solve costs about 65,536 trials on average.

use crate::crypto::sha256_hex;

/// Four trailing zero nibbles.
pub const DIFFICULTY_SUFFIX: &str = "0000";

/// Returns true if `proof` solves the puzzle posed by `last_proof`.
pub fn verify(last_proof: u64, proof: u64) -> bool {
    let guess = format!("{}{}", last_proof, proof);
    sha256_hex(guess.as_bytes()).ends_with(DIFFICULTY_SUFFIX)
}

/// Linear scan from zero for the smallest proof satisfying [`verify`].
///
/// This is CPU bound and unbounded in principle; async callers should run it
/// on a blocking worker.
pub fn solve(last_proof: u64) -> u64 {
    let mut proof = 0u64;
    while !verify(last_proof, proof) {
        proof += 1;
    }
    proof
}
