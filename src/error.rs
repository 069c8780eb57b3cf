//! Error types for ProofChain

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("Invalid proof of work: {0}")]
    InvalidProofOfWork(String),
    #[error("Chain is empty")]
    EmptyChain,
    #[error("Invalid peer address: {0}")]
    InvalidPeerAddress(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Mining aborted before a proof was found")]
    MiningAborted,
    #[error("Mining timed out after {0} seconds")]
    MiningTimedOut(u64),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ChainError {
    fn from(err: serde_json::Error) -> Self {
        ChainError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for ChainError {
    fn from(err: toml::de::Error) -> Self {
        ChainError::Config(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;
