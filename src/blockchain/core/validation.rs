use crate::canonical::fingerprint;
use crate::miner::is_valid_proof;
use thiserror::Error;

use super::chain::Block;

/// The first broken link found in a candidate chain.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChainFault {
    #[error("chain has no blocks")]
    EmptyChain,
    #[error("block at position {position}: previous_hash {found} does not match predecessor fingerprint {expected}")]
    HashMismatch {
        position: usize,
        expected: String,
        found: String,
    },
    #[error("block at position {position}: proof {proof} does not solve the puzzle for previous proof {previous_proof}")]
    ProofMismatch {
        position: usize,
        proof: u64,
        previous_proof: u64,
    },
}

/// Walk `chain` pairwise and report the first link that fails.
///
/// Each block must carry its predecessor's fingerprint and a proof that
/// solves the puzzle against the predecessor's proof. A lone block passes.
pub fn check_chain(chain: &[Block]) -> Result<(), ChainFault> {
    if chain.is_empty() {
        return Err(ChainFault::EmptyChain);
    }

    for (position, pair) in chain.windows(2).enumerate().map(|(i, w)| (i + 1, w)) {
        let (prev, block) = (&pair[0], &pair[1]);

        let expected = fingerprint(prev);
        if block.previous_hash != expected {
            return Err(ChainFault::HashMismatch {
                position,
                expected,
                found: block.previous_hash.clone(),
            });
        }

        if !is_valid_proof(block.proof, prev.proof) {
            return Err(ChainFault::ProofMismatch {
                position,
                proof: block.proof,
                previous_proof: prev.proof,
            });
        }
    }

    Ok(())
}

/// Boolean form of [`check_chain`]; the fault is logged.
pub fn validate_chain(chain: &[Block]) -> bool {
    match check_chain(chain) {
        Ok(()) => true,
        Err(fault) => {
            tracing::warn!(%fault, "chain failed validation");
            false
        }
    }
}
