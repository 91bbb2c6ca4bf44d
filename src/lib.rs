//! PowLedger - a replicated, append-only ledger secured by proof-of-work
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Core Ledger
//! - [`blockchain`] - Blocks, the local chain and chain validation
//! - [`transaction`] - Transaction type and field validation
//! - [`mempool`] - Pending transaction pool
//!
//! ## Consensus
//! - [`miner`] - Proof-of-work search and verification
//! - [`consensus`] - Longest-valid-chain conflict resolution
//!
//! ## Cryptography
//! - [`crypto`] - Block hashing and node identifiers
//!
//! ## Networking & Integration
//! - [`network`] - Peer set and chain-fetch client
//! - [`node`] - Node orchestration
//! - [`api`] - HTTP API
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Core Ledger
// ============================================================================
pub mod blockchain;
pub mod mempool;
pub mod transaction;

// ============================================================================
// Consensus & Mining
// ============================================================================
pub mod consensus;
pub mod miner;

// ============================================================================
// Cryptography
// ============================================================================
pub mod crypto;

// ============================================================================
// Networking
// ============================================================================
pub mod network;
pub mod node;

// ============================================================================
// Integration
// ============================================================================
#[cfg(feature = "api")]
pub mod api;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;
