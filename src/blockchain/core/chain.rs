use crate::canonical::fingerprint;
use crate::consensus::{CandidateVerdict, FetchError, LongestChainSelector, PeerChain};
use crate::error::{ChainError, Result};
use crate::miner::{is_valid_proof, proof_of_work};
use crate::network::PeerSet;
use crate::transaction::{Amount, Transaction};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Proof stored in the genesis block.
pub const GENESIS_PROOF: u64 = 100;

/// `previous_hash` of the genesis block. Never a valid 64-character fingerprint.
pub const GENESIS_PREVIOUS_HASH: &str = "1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub timestamp: String,
    pub transactions: Vec<Transaction>,
    pub proof: u64,
    pub previous_hash: String,
}

impl Block {
    pub fn fingerprint(&self) -> String {
        fingerprint(self)
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 1 && self.previous_hash == GENESIS_PREVIOUS_HASH
    }
}

fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

/// The ledger engine: chain, pending pool and peer set.
///
/// The chain is never empty. It grows by one block per [`Blockchain::mine`] /
/// [`Blockchain::forge_block`] and is otherwise only swapped wholesale for a
/// longer valid peer chain in [`Blockchain::resolve_conflicts`].
#[derive(Debug, Clone)]
pub struct Blockchain {
    blocks: Vec<Block>,
    pending: Vec<Transaction>,
    peers: PeerSet,
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::new()
    }
}

impl Blockchain {
    /// Create a chain holding only the genesis block.
    pub fn new() -> Self {
        let genesis = Block {
            index: 1,
            timestamp: now_timestamp(),
            transactions: Vec::new(),
            proof: GENESIS_PROOF,
            previous_hash: GENESIS_PREVIOUS_HASH.to_string(),
        };

        Self {
            blocks: vec![genesis],
            pending: Vec::new(),
            peers: PeerSet::new(),
        }
    }

    pub fn chain(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn last_block(&self) -> &Block {
        // Constructed with a genesis block and only ever replaced by non-empty chains.
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn pending_transactions(&self) -> &[Transaction] {
        &self.pending
    }

    pub fn peers(&self) -> &PeerSet {
        &self.peers
    }

    /// Queue a transaction. Returns the index of the block that will hold it.
    pub fn submit_transaction(
        &mut self,
        sender: impl Into<String>,
        recipient: impl Into<String>,
        amount: impl Into<Amount>,
    ) -> u64 {
        self.submit(Transaction::new(sender, recipient, amount))
    }

    pub fn submit(&mut self, tx: Transaction) -> u64 {
        self.pending.push(tx);
        self.next_index()
    }

    /// Positional: a block's index is the chain length once it is appended,
    /// whatever indexes an adopted chain carries.
    fn next_index(&self) -> u64 {
        self.blocks.len() as u64 + 1
    }

    /// Search for the next proof and forge a block with it.
    ///
    /// Blocks the calling thread for as long as the search takes, which is
    /// forever if the last proof is 0. Use [`crate::miner::ProofSearch`] plus
    /// [`Blockchain::forge_block`] when that matters.
    pub fn mine(&mut self) -> Block {
        let proof = proof_of_work(self.last_block().proof);
        self.append_block(proof)
    }

    /// Whether `proof` solves the puzzle posed by the current last block.
    pub fn accepts_proof(&self, proof: u64) -> bool {
        is_valid_proof(proof, self.last_block().proof)
    }

    /// Forge a block from a proof found elsewhere.
    ///
    /// The proof is re-checked against the current last block, which may have
    /// changed while the proof was being searched for.
    pub fn forge_block(&mut self, proof: u64) -> Result<Block> {
        if !self.accepts_proof(proof) {
            return Err(ChainError::InvalidProofOfWork(format!(
                "proof {} does not solve the puzzle for last proof {}",
                proof,
                self.last_block().proof
            )));
        }
        Ok(self.append_block(proof))
    }

    fn append_block(&mut self, proof: u64) -> Block {
        let previous_hash = fingerprint(self.last_block());
        let block = Block {
            index: self.next_index(),
            timestamp: now_timestamp(),
            transactions: std::mem::take(&mut self.pending),
            proof,
            previous_hash,
        };

        info!(
            index = block.index,
            proof = block.proof,
            transactions = block.transactions.len(),
            "forged block"
        );
        self.blocks.push(block.clone());
        block
    }

    /// Add a peer by its normalized `host:port`. Duplicates collapse.
    pub fn register_peer(&mut self, address: &str) -> Result<String> {
        self.peers.register(address)
    }

    /// Replace the chain with the longest valid chain any peer reports.
    ///
    /// Peers are asked in sorted address order. A candidate wins only if it is
    /// strictly longer than the best seen so far (starting from the local
    /// length) and passes [`super::check_chain`]; on equal length the earlier
    /// peer keeps the win. Fetch failures skip the peer. The pending pool and
    /// peer set are left alone. Returns whether the chain was replaced.
    pub fn resolve_conflicts<F>(&mut self, mut fetch: F) -> bool
    where
        F: FnMut(&str) -> std::result::Result<PeerChain, FetchError>,
    {
        let mut selector = LongestChainSelector::new(self.blocks.len());

        for peer in self.peers.iter() {
            let candidate = match fetch(peer).and_then(PeerChain::into_blocks) {
                Ok(candidate) => candidate,
                Err(e) => {
                    debug!(peer, error = %e, "skipping peer");
                    continue;
                }
            };

            match selector.consider(peer, candidate) {
                CandidateVerdict::Adopted { length } => {
                    debug!(peer, length, "longest valid candidate so far");
                }
                CandidateVerdict::NotLonger { length, best } => {
                    debug!(peer, length, best, "candidate not longer");
                }
                CandidateVerdict::Invalid(fault) => {
                    warn!(peer, %fault, "rejected invalid candidate chain");
                }
            }
        }

        match selector.into_winner() {
            Some((peer, chain)) => {
                info!(
                    peer = %peer,
                    old_length = self.blocks.len(),
                    new_length = chain.len(),
                    "replaced chain"
                );
                self.blocks = chain;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genesis_block() {
        let chain = Blockchain::new();
        assert_eq!(chain.len(), 1);

        let genesis = chain.last_block();
        assert_eq!(genesis.index, 1);
        assert_eq!(genesis.previous_hash, GENESIS_PREVIOUS_HASH);
        assert_eq!(genesis.proof, GENESIS_PROOF);
        assert!(genesis.transactions.is_empty());
        assert!(genesis.is_genesis());
        assert!(chain.pending_transactions().is_empty());
        assert!(chain.peers().is_empty());
    }

    #[test]
    fn test_submit_returns_next_index() {
        let mut chain = Blockchain::new();
        assert_eq!(chain.submit_transaction("a", "b", 1u64), 2);
        assert_eq!(chain.submit_transaction("b", "c", 2u64), 2);
        assert_eq!(chain.pending_transactions().len(), 2);
    }

    #[test]
    fn test_mine_appends_linked_block() {
        let mut chain = Blockchain::new();
        let genesis = chain.last_block().clone();

        let block = chain.mine();
        assert_eq!(chain.len(), 2);
        assert_eq!(block.index, 2);
        assert_eq!(block.previous_hash, fingerprint(&genesis));
        assert!(is_valid_proof(block.proof, genesis.proof));
        assert_eq!(chain.last_block(), &block);
    }

    #[test]
    fn test_mine_drains_pool_in_order() {
        let mut chain = Blockchain::new();
        chain.submit_transaction("alice", "bob", 3u64);
        chain.submit_transaction("bob", "carol", 1u64);

        let block = chain.mine();
        assert_eq!(
            block.transactions,
            vec![
                Transaction::new("alice", "bob", 3u64),
                Transaction::new("bob", "carol", 1u64)
            ]
        );
        assert!(chain.pending_transactions().is_empty());
        assert_eq!(chain.submit_transaction("x", "y", 1u64), 3);
    }

    #[test]
    fn test_forge_block_rechecks_proof() {
        let mut chain = Blockchain::new();
        let good = proof_of_work(GENESIS_PROOF);
        // 0 * 100 hashes "0", which misses the target.
        let bad = 0;
        chain.submit_transaction("a", "b", 1u64);

        assert!(matches!(chain.forge_block(bad), Err(ChainError::InvalidProofOfWork(_))));
        assert_eq!(chain.len(), 1);
        assert_eq!(chain.pending_transactions().len(), 1);

        let block = chain.forge_block(good).unwrap();
        assert_eq!(block.proof, good);
        assert_eq!(block.transactions.len(), 1);
    }

    #[test]
    fn test_register_peer_normalizes() {
        let mut chain = Blockchain::new();
        assert_eq!(chain.register_peer("http://10.0.0.1:5000/").unwrap(), "10.0.0.1:5000");
        chain.register_peer("10.0.0.1:5000").unwrap();
        assert_eq!(chain.peers().len(), 1);
        assert!(chain.register_peer("http://").is_err());
    }
}
