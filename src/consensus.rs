//! Longest-valid-chain selection across peers.

use crate::blockchain::{check_chain, Block, ChainFault};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A chain as reported by a peer's `/chain` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerChain {
    pub chain: Vec<Block>,
    pub length: usize,
}

impl PeerChain {
    pub fn new(chain: Vec<Block>) -> Self {
        Self {
            length: chain.len(),
            chain,
        }
    }

    /// The blocks, provided the reported length matches the contents.
    pub fn into_blocks(self) -> Result<Vec<Block>, FetchError> {
        if self.length != self.chain.len() {
            return Err(FetchError::LengthMismatch {
                reported: self.length,
                actual: self.chain.len(),
            });
        }
        Ok(self.chain)
    }
}

/// Why a peer's chain could not be obtained. The peer is skipped.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("peer answered with status {0}")]
    Status(u16),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("no answer within {0} seconds")]
    Timeout(u64),
    #[error("undecodable response: {0}")]
    Decode(String),
    #[error("reported length {reported} but sent {actual} blocks")]
    LengthMismatch { reported: usize, actual: usize },
    #[error("no response recorded for this peer")]
    Missing,
}

/// What happened to one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateVerdict {
    /// Longest valid chain so far.
    Adopted { length: usize },
    /// Not strictly longer than the current best. Equal length keeps the earlier chain.
    NotLonger { length: usize, best: usize },
    Invalid(ChainFault),
}

/// Running "longest so far" over a sequence of candidate chains.
///
/// Starts from the local chain length, so only strictly longer candidates can
/// win. The result depends only on the order candidates are offered in, and
/// [`crate::blockchain::Blockchain::resolve_conflicts`] always offers them in
/// sorted peer order.
#[derive(Debug)]
pub struct LongestChainSelector {
    best_length: usize,
    best: Option<(String, Vec<Block>)>,
}

impl LongestChainSelector {
    pub fn new(local_length: usize) -> Self {
        Self {
            best_length: local_length,
            best: None,
        }
    }

    pub fn best_length(&self) -> usize {
        self.best_length
    }

    pub fn consider(&mut self, peer: &str, candidate: Vec<Block>) -> CandidateVerdict {
        let length = candidate.len();
        // Length first: a short chain is rejected without hashing it.
        if length <= self.best_length {
            return CandidateVerdict::NotLonger {
                length,
                best: self.best_length,
            };
        }

        if let Err(fault) = check_chain(&candidate) {
            return CandidateVerdict::Invalid(fault);
        }

        self.best_length = length;
        self.best = Some((peer.to_string(), candidate));
        CandidateVerdict::Adopted { length }
    }

    /// The winning peer and its chain, if any candidate beat the local chain.
    pub fn into_winner(self) -> Option<(String, Vec<Block>)> {
        self.best
    }
}
