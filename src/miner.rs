//! Proof-of-work puzzle and proof search.
//!
//! A proof `p` is accepted against the previous block's proof `q` when the
//! SHA-256 hex digest of the decimal string of `p * q` starts with
//! [`PROOF_PREFIX`]. The product is taken in `u128`, so it never overflows.
//!
//! The search has no natural bound. With `q == 0` every product is `0`, whose
//! digest does not meet the target, and [`proof_of_work`] never returns.
//! Callers that cannot afford that use [`ProofSearch`] with a cancel flag or
//! an attempt budget.

use crate::canonical::sha256_hex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Required leading characters of an accepted digest.
pub const PROOF_PREFIX: &str = "0000";

/// How many candidates are tried between cancel-flag checks.
const CANCEL_CHECK_INTERVAL: u64 = 1024;

/// True iff the hex digest of `x`'s decimal representation starts with [`PROOF_PREFIX`].
pub fn puzzle_valid(x: u128) -> bool {
    sha256_hex(x.to_string().as_bytes()).starts_with(PROOF_PREFIX)
}

/// True iff `proof` solves the puzzle posed by `last_proof`.
pub fn is_valid_proof(proof: u64, last_proof: u64) -> bool {
    puzzle_valid(proof as u128 * last_proof as u128)
}

/// Smallest non-negative `p` with `puzzle_valid(p * last_proof)`.
///
/// Unbounded: see the module docs for the `last_proof == 0` case.
pub fn proof_of_work(last_proof: u64) -> u64 {
    let mut proof = 0u64;
    while !is_valid_proof(proof, last_proof) {
        proof += 1;
    }
    proof
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    Found(u64),
    /// The cancel flag was raised.
    Cancelled { attempts: u64 },
    /// The attempt budget ran out.
    Exhausted { attempts: u64 },
}

/// An interruptible version of [`proof_of_work`].
///
/// Candidates are tried in ascending order from zero, so a `Found` outcome
/// is always the same proof `proof_of_work` would return.
#[derive(Debug, Clone)]
pub struct ProofSearch {
    last_proof: u64,
    cancel: Option<Arc<AtomicBool>>,
    max_attempts: Option<u64>,
}

impl ProofSearch {
    pub fn new(last_proof: u64) -> Self {
        Self {
            last_proof,
            cancel: None,
            max_attempts: None,
        }
    }

    /// Stop the search once `flag` is set.
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Give up after trying `attempts` candidates.
    pub fn with_max_attempts(mut self, attempts: u64) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    pub fn last_proof(&self) -> u64 {
        self.last_proof
    }

    pub fn run(&self) -> SearchOutcome {
        let limit = self.max_attempts.unwrap_or(u64::MAX);
        let mut attempts = 0u64;

        while attempts < limit {
            if attempts % CANCEL_CHECK_INTERVAL == 0 && self.is_cancelled() {
                return SearchOutcome::Cancelled { attempts };
            }
            // `attempts` doubles as the candidate proof.
            if is_valid_proof(attempts, self.last_proof) {
                return SearchOutcome::Found(attempts);
            }
            attempts += 1;
        }

        SearchOutcome::Exhausted { attempts }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}
