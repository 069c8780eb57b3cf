//! ProofChain - a single-node proof-of-work ledger
//!
//! # Architecture
//!
//! ## Ledger Engine
//! - [`blockchain`] - Blocks, the chain state machine and chain validation
//! - [`transaction`] - Transfer records and amounts
//! - [`canonical`] - Canonical block encoding and fingerprints
//!
//! ## Consensus & Mining
//! - [`miner`] - Proof-of-work puzzle and interruptible proof search
//! - [`consensus`] - Longest-valid-chain selection
//!
//! ## Networking
//! - [`network`] - Peer addresses and the peer set
//! - [`sync`] - Concurrent, time-bounded peer chain fetching
//! - [`node`] - The shared node service
//! - [`api`] - HTTP endpoints
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Ledger Engine
// ============================================================================
pub mod blockchain;
pub mod canonical;
pub mod transaction;

// ============================================================================
// Consensus & Mining
// ============================================================================
pub mod consensus;
pub mod miner;

// ============================================================================
// Networking
// ============================================================================
pub mod network;
pub mod node;
pub mod sync;

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
