//! The node service: one ledger behind one lock, shared by every caller.
//!
//! All chain and pool mutations happen under the write half of
//! `blockchain`. Proof searches and peer fetches run without the lock; only
//! their results are applied under it.

use crate::blockchain::{Block, Blockchain};
use crate::config::Config;
use crate::consensus::FetchError;
use crate::error::{ChainError, Result};
use crate::miner::{ProofSearch, SearchOutcome};
use crate::network::normalize_peer_address;
use crate::sync::{fetch_all, ChainSource, HttpChainFetcher};
use crate::transaction::Transaction;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// 32 lowercase hex characters from the OS random generator.
pub fn generate_node_identifier() -> String {
    hex::encode(rand::random::<[u8; 16]>())
}

/// Raises the cancel flag when dropped, so an abandoned `mine_block` call
/// also stops its blocking search.
struct CancelOnDrop(Arc<AtomicBool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

pub struct Node {
    blockchain: Arc<RwLock<Blockchain>>,
    identifier: String,
    source: Arc<dyn ChainSource>,
    mine_timeout: Option<Duration>,
}

impl Node {
    pub fn new(blockchain: Blockchain, identifier: impl Into<String>, source: Arc<dyn ChainSource>) -> Self {
        Self {
            blockchain: Arc::new(RwLock::new(blockchain)),
            identifier: identifier.into(),
            source,
            mine_timeout: None,
        }
    }

    /// Build a node with a fresh chain, an HTTP peer fetcher and the
    /// configured bootstrap peers registered.
    pub fn from_config(config: &Config) -> Result<Self> {
        let fetcher = HttpChainFetcher::new(config.consensus.peer_timeout())?;
        let identifier = config
            .miner
            .node_identifier
            .clone()
            .unwrap_or_else(generate_node_identifier);

        let mut blockchain = Blockchain::new();
        for peer in &config.network.bootstrap_peers {
            blockchain.register_peer(peer)?;
        }

        Ok(Self::new(blockchain, identifier, Arc::new(fetcher)).with_mine_timeout(config.miner.timeout()))
    }

    pub fn with_mine_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.mine_timeout = timeout;
        self
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn blockchain(&self) -> Arc<RwLock<Blockchain>> {
        self.blockchain.clone()
    }

    pub async fn chain_snapshot(&self) -> Vec<Block> {
        self.blockchain.read().await.chain().to_vec()
    }

    pub async fn peers(&self) -> Vec<String> {
        self.blockchain.read().await.peers().to_vec()
    }

    pub async fn submit_transaction(&self, tx: Transaction) -> u64 {
        self.blockchain.write().await.submit(tx)
    }

    /// Register every address, or none of them if any is malformed.
    pub async fn register_peers(&self, addresses: &[String]) -> Result<Vec<String>> {
        let normalized = addresses
            .iter()
            .map(|address| normalize_peer_address(address))
            .collect::<Result<Vec<_>>>()?;

        let mut chain = self.blockchain.write().await;
        for address in &normalized {
            chain.register_peer(address)?;
        }
        Ok(chain.peers().to_vec())
    }

    /// Find a proof off the lock, then reward this node and forge the block.
    ///
    /// If the chain moved while searching and the proof no longer fits the
    /// new last block, the search starts over. Transactions submitted during
    /// the search go into whichever block is forged.
    pub async fn mine_block(&self) -> Result<Block> {
        loop {
            let last_proof = self.blockchain.read().await.last_block().proof;
            let proof = self.search_proof(last_proof).await?;

            if let Some(block) = self.forge_with(proof).await? {
                return Ok(block);
            }
            debug!(proof, last_proof, "chain moved during proof search; restarting");
        }
    }

    /// Forge the next block with `proof` if it still solves the puzzle posed
    /// by the current last block. A stale proof changes nothing.
    async fn forge_with(&self, proof: u64) -> Result<Option<Block>> {
        let mut chain = self.blockchain.write().await;
        if !chain.accepts_proof(proof) {
            return Ok(None);
        }

        chain.submit(Transaction::reward(self.identifier.as_str()));
        chain.forge_block(proof).map(Some)
    }

    async fn search_proof(&self, last_proof: u64) -> Result<u64> {
        let cancel = Arc::new(AtomicBool::new(false));
        let _guard = CancelOnDrop(cancel.clone());
        let search = ProofSearch::new(last_proof).with_cancel(cancel);
        let handle = tokio::task::spawn_blocking(move || search.run());

        let joined = match self.mine_timeout {
            Some(limit) => match tokio::time::timeout(limit, handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!(last_proof, timeout_secs = limit.as_secs(), "proof search timed out");
                    return Err(ChainError::MiningTimedOut(limit.as_secs()));
                }
            },
            None => handle.await,
        };

        match joined {
            Ok(SearchOutcome::Found(proof)) => Ok(proof),
            Ok(outcome) => {
                warn!(?outcome, "proof search stopped without a proof");
                Err(ChainError::MiningAborted)
            }
            Err(e) => {
                warn!(error = %e, "proof search task failed");
                Err(ChainError::MiningAborted)
            }
        }
    }

    /// Run conflict resolution against every registered peer.
    ///
    /// Peer chains are fetched without holding the lock; the selection and
    /// any replacement happen under the write lock. Peers registered after the
    /// fetch started are skipped this round.
    pub async fn resolve(&self) -> bool {
        let peers = self.peers().await;
        let mut results = fetch_all(self.source.clone(), peers).await;

        let mut chain = self.blockchain.write().await;
        let replaced = chain.resolve_conflicts(|peer| results.remove(peer).unwrap_or(Err(FetchError::Missing)));
        info!(replaced, length = chain.len(), "conflict resolution finished");
        replaced
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::check_chain;
    use crate::canonical::fingerprint;
    use crate::consensus::PeerChain;
    use crate::miner::{is_valid_proof, proof_of_work};
    use crate::sync::StaticChainSource;

    fn offline_node() -> Node {
        Node::new(Blockchain::new(), "node-a", Arc::new(StaticChainSource::new()))
    }

    #[test]
    fn test_node_identifier_format() {
        let id = generate_node_identifier();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(id, generate_node_identifier());
    }

    #[tokio::test]
    async fn test_mine_block_appends_reward_last() {
        tokio::time::timeout(Duration::from_secs(60), async {
            let node = offline_node();
            node.submit_transaction(Transaction::new("alice", "bob", 2u64)).await;

            let block = node.mine_block().await.unwrap();
            assert_eq!(block.index, 2);
            assert_eq!(block.transactions.len(), 2);
            assert_eq!(block.transactions[0], Transaction::new("alice", "bob", 2u64));
            assert_eq!(block.transactions[1], Transaction::reward("node-a"));

            let chain = node.chain_snapshot().await;
            assert_eq!(chain.len(), 2);
            assert!(check_chain(&chain).is_ok());
            assert!(node.blockchain().read().await.pending_transactions().is_empty());
        })
        .await
        .expect("test_mine_block_appends_reward_last timed out");
    }

    #[tokio::test]
    async fn test_mine_timeout_leaves_chain_alone() {
        tokio::time::timeout(Duration::from_secs(10), async {
            let node = offline_node().with_mine_timeout(Some(Duration::from_nanos(1)));
            node.submit_transaction(Transaction::new("a", "b", 1u64)).await;

            match node.mine_block().await {
                Err(ChainError::MiningTimedOut(_)) => {
                    assert_eq!(node.chain_snapshot().await.len(), 1);
                    assert_eq!(node.blockchain().read().await.pending_transactions().len(), 1);
                }
                // The search can finish before the timer is first polled.
                Ok(block) => assert_eq!(block.index, 2),
                Err(e) => panic!("unexpected error: {}", e),
            }
        })
        .await
        .expect("test_mine_timeout_leaves_chain_alone timed out");
    }

    #[tokio::test]
    async fn test_resolve_adopts_longer_peer_chain() {
        tokio::time::timeout(Duration::from_secs(60), async {
            let mut remote = Blockchain::new();
            remote.mine();
            remote.mine();
            let source = StaticChainSource::new()
                .with_chain("10.0.0.2:5000", PeerChain::new(remote.chain().to_vec()));

            let node = Node::new(Blockchain::new(), "node-a", Arc::new(source));
            node.register_peers(&["http://10.0.0.2:5000".to_string(), "10.0.0.3:5000".to_string()])
                .await
                .unwrap();
            node.submit_transaction(Transaction::new("a", "b", 1u64)).await;

            assert!(node.resolve().await);
            assert_eq!(node.chain_snapshot().await, remote.chain().to_vec());
            assert_eq!(node.blockchain().read().await.pending_transactions().len(), 1);
            assert_eq!(node.peers().await.len(), 2);

            assert!(!node.resolve().await);
        })
        .await
        .expect("test_resolve_adopts_longer_peer_chain timed out");
    }

    #[tokio::test]
    async fn test_stale_proof_restarts_on_moved_chain() {
        tokio::time::timeout(Duration::from_secs(60), async {
            let mut remote = Blockchain::new();
            remote.mine();
            remote.mine();
            let source = StaticChainSource::new()
                .with_chain("10.0.0.2:5000", PeerChain::new(remote.chain().to_vec()));
            let node = Node::new(Blockchain::new(), "node-a", Arc::new(source));

            let first = Transaction::new("alice", "bob", 1u64);
            node.submit_transaction(first.clone()).await;
            let stale = proof_of_work(node.blockchain().read().await.last_block().proof);

            // The chain is replaced before the proof found for genesis is applied.
            node.register_peers(&["10.0.0.2:5000".to_string()]).await.unwrap();
            assert!(node.resolve().await);
            let second = Transaction::new("bob", "carol", 2u64);
            node.submit_transaction(second.clone()).await;

            assert!(node.forge_with(stale).await.unwrap().is_none());
            assert_eq!(node.chain_snapshot().await.len(), 3);
            assert_eq!(node.blockchain().read().await.pending_transactions(), &[first.clone(), second.clone()]);

            let block = node.mine_block().await.unwrap();
            let remote_last = remote.last_block();
            assert_eq!(block.index, 4);
            assert_eq!(block.previous_hash, fingerprint(remote_last));
            assert!(is_valid_proof(block.proof, remote_last.proof));
            assert_eq!(block.transactions, vec![first, second, Transaction::reward("node-a")]);
            assert!(check_chain(&node.chain_snapshot().await).is_ok());
        })
        .await
        .expect("test_stale_proof_restarts_on_moved_chain timed out");
    }

    #[tokio::test]
    async fn test_register_peers_is_all_or_nothing() {
        tokio::time::timeout(Duration::from_secs(5), async {
            let node = offline_node();
            let result = node
                .register_peers(&["10.0.0.1:5000".to_string(), "http://".to_string()])
                .await;

            assert!(matches!(result, Err(ChainError::InvalidPeerAddress(_))));
            assert!(node.peers().await.is_empty());

            let peers = node
                .register_peers(&["http://10.0.0.1:5000/".to_string(), "10.0.0.1:5000".to_string()])
                .await
                .unwrap();
            assert_eq!(peers, vec!["10.0.0.1:5000"]);
        })
        .await
        .expect("test_register_peers_is_all_or_nothing timed out");
    }
}
