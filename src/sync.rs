//! Fetching peer chains for conflict resolution.
//!
//! Fetches run concurrently and hold no ledger lock. Each one is bounded by a
//! timeout so a silent peer cannot stall resolution. The results are handed to
//! [`crate::blockchain::Blockchain::resolve_conflicts`] afterwards.

use crate::consensus::{FetchError, PeerChain};
use crate::error::{ChainError, Result};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::debug;

pub type FetchResult = std::result::Result<PeerChain, FetchError>;
pub type FetchFuture = Pin<Box<dyn Future<Output = FetchResult> + Send + 'static>>;

/// Something that can report a peer's chain.
pub trait ChainSource: Send + Sync {
    fn fetch_chain(&self, peer: String) -> FetchFuture;
}

/// Reads `http://<peer>/chain`.
#[derive(Debug, Clone)]
pub struct HttpChainFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpChainFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| ChainError::Network(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client, timeout })
    }
}

impl ChainSource for HttpChainFetcher {
    fn fetch_chain(&self, peer: String) -> FetchFuture {
        let client = self.client.clone();
        let timeout = self.timeout;

        Box::pin(async move {
            let url = format!("http://{}/chain", peer);
            let request = async {
                let response = client
                    .get(&url)
                    .send()
                    .await
                    .map_err(|e| FetchError::Transport(e.to_string()))?;

                let status = response.status();
                if !status.is_success() {
                    return Err(FetchError::Status(status.as_u16()));
                }

                response
                    .json::<PeerChain>()
                    .await
                    .map_err(|e| FetchError::Decode(e.to_string()))
            };

            match tokio::time::timeout(timeout, request).await {
                Ok(result) => result,
                Err(_) => Err(FetchError::Timeout(timeout.as_secs())),
            }
        })
    }
}

/// Serves fixed chains from memory. Unknown peers answer 404.
#[derive(Debug, Clone, Default)]
pub struct StaticChainSource {
    chains: HashMap<String, PeerChain>,
}

impl StaticChainSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chain(mut self, peer: impl Into<String>, chain: PeerChain) -> Self {
        self.chains.insert(peer.into(), chain);
        self
    }
}

impl ChainSource for StaticChainSource {
    fn fetch_chain(&self, peer: String) -> FetchFuture {
        let result = self.chains.get(&peer).cloned().ok_or(FetchError::Status(404));
        Box::pin(async move { result })
    }
}

/// Fetch every peer's chain concurrently.
///
/// Every peer gets an entry; a task that panicked is recorded as a
/// transport error.
pub async fn fetch_all(source: Arc<dyn ChainSource>, peers: Vec<String>) -> HashMap<String, FetchResult> {
    let mut tasks = JoinSet::new();
    for peer in &peers {
        let fetch = source.fetch_chain(peer.clone());
        let peer = peer.clone();
        tasks.spawn(async move { (peer, fetch.await) });
    }

    let mut results = HashMap::with_capacity(peers.len());
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((peer, result)) => {
                if let Err(e) = &result {
                    debug!(peer = %peer, error = %e, "peer fetch failed");
                }
                results.insert(peer, result);
            }
            Err(e) => debug!(error = %e, "peer fetch task failed"),
        }
    }

    for peer in peers {
        results
            .entry(peer)
            .or_insert_with(|| Err(FetchError::Transport("fetch task failed".to_string())));
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::Blockchain;

    #[tokio::test]
    async fn test_fetch_all_collects_every_peer() {
        tokio::time::timeout(Duration::from_secs(5), async {
            let chain = Blockchain::new();
            let source = StaticChainSource::new()
                .with_chain("a:1", PeerChain::new(chain.chain().to_vec()));

            let results = fetch_all(
                Arc::new(source),
                vec!["a:1".to_string(), "b:2".to_string()],
            )
            .await;

            assert_eq!(results.len(), 2);
            assert_eq!(results["a:1"].as_ref().unwrap().length, 1);
            assert_eq!(results["b:2"], Err(FetchError::Status(404)));
        })
        .await
        .expect("test_fetch_all_collects_every_peer timed out");
    }

    #[tokio::test]
    async fn test_http_fetch_unreachable_peer() {
        tokio::time::timeout(Duration::from_secs(10), async {
            // Bind then drop to get a port nothing listens on.
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            let addr = listener.local_addr().unwrap();
            drop(listener);

            let fetcher = HttpChainFetcher::new(Duration::from_secs(2)).unwrap();
            let result = fetcher.fetch_chain(addr.to_string()).await;
            assert!(matches!(
                result,
                Err(FetchError::Transport(_)) | Err(FetchError::Timeout(_))
            ));
        })
        .await
        .expect("test_http_fetch_unreachable_peer timed out");
    }
}
