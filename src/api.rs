//! REST API for a ProofChain node.
//!
//! Exposes mining, transaction submission, the chain itself (which doubles as
//! the peer wire format), peer registration and conflict resolution.

use axum::{
    extract::{Request, State},
    http::{self, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};

use crate::blockchain::Block;
use crate::consensus::PeerChain;
use crate::error::ChainError;
use crate::node::Node;
use crate::transaction::Transaction;

const REQUIRED_TRANSACTION_FIELDS: [&str; 3] = ["sender", "recipient", "amount"];

// ============================================================================
// API Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    BlockchainError(ChainError),
    InvalidInput(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BlockchainError(e) => {
                let status = match e {
                    ChainError::InvalidPeerAddress(_) | ChainError::InvalidProofOfWork(_) => {
                        StatusCode::BAD_REQUEST
                    }
                    ChainError::MiningTimedOut(_) | ChainError::MiningAborted => {
                        StatusCode::SERVICE_UNAVAILABLE
                    }
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, e.to_string())
            }
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<ChainError> for ApiError {
    fn from(err: ChainError) -> Self {
        ApiError::BlockchainError(err)
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
pub struct MineResponse {
    pub message: String,
    pub index: u64,
    pub transactions: Vec<Transaction>,
    pub proof: u64,
    pub previous_hash: String,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Serialize)]
pub struct RegisterResponse {
    pub message: String,
    pub total_nodes: Vec<String>,
}

#[derive(Serialize)]
pub struct ResolveResponse {
    pub message: String,
    pub chain: Vec<Block>,
}

// ============================================================================
// Middleware
// ============================================================================

/// Logs method, path, status and duration of every request.
async fn logging_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    tracing::info!(
        method = %method,
        path = %path,
        status = %response.status().as_u16(),
        duration_ms = %start.elapsed().as_millis(),
        "api.request"
    );

    response
}

// ============================================================================
// API Server
// ============================================================================

pub fn build_api_router(node: Arc<Node>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(vec![http::Method::GET, http::Method::POST, http::Method::OPTIONS])
        .allow_headers(vec![http::header::CONTENT_TYPE]);

    Router::new()
        .route("/mine", get(mine))
        .route("/transactions/new", post(new_transaction))
        .route("/chain", get(full_chain))
        .route("/nodes/register", post(register_nodes))
        .route("/nodes/resolve", get(consensus))
        .route("/health", get(health_check))
        .layer(middleware::from_fn(logging_middleware))
        .with_state(node)
        .layer(cors)
}

pub async fn run_api_server(node: Arc<Node>, addr: SocketAddr) -> Result<(), ChainError> {
    let app = build_api_router(node);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "API server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

// ============================================================================
// Route Handlers
// ============================================================================

async fn mine(State(node): State<Arc<Node>>) -> Result<Json<MineResponse>, ApiError> {
    let block = node.mine_block().await?;

    Ok(Json(MineResponse {
        message: "New block forged".to_string(),
        index: block.index,
        transactions: block.transactions,
        proof: block.proof,
        previous_hash: block.previous_hash,
    }))
}

async fn new_transaction(
    State(node): State<Arc<Node>>,
    Json(values): Json<Value>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let missing: Vec<&str> = REQUIRED_TRANSACTION_FIELDS
        .iter()
        .copied()
        .filter(|field| values.get(field).is_none())
        .collect();
    if !missing.is_empty() {
        return Err(ApiError::InvalidInput(format!("Missing values: {}", missing.join(", "))));
    }

    let tx: Transaction = serde_json::from_value(values)
        .map_err(|e| ApiError::InvalidInput(format!("Invalid transaction: {}", e)))?;
    let index = node.submit_transaction(tx).await;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: format!("Transaction will be added to Block {}", index),
        }),
    ))
}

async fn full_chain(State(node): State<Arc<Node>>) -> Json<PeerChain> {
    Json(PeerChain::new(node.chain_snapshot().await))
}

async fn register_nodes(
    State(node): State<Arc<Node>>,
    Json(values): Json<Value>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let nodes: Vec<String> = values
        .get("nodes")
        .cloned()
        .and_then(|nodes| serde_json::from_value(nodes).ok())
        .ok_or_else(|| ApiError::InvalidInput("Please supply a valid list of nodes".to_string()))?;

    let total_nodes = node.register_peers(&nodes).await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "New nodes have been added!".to_string(),
            total_nodes,
        }),
    ))
}

async fn consensus(State(node): State<Arc<Node>>) -> Json<ResolveResponse> {
    let replaced = node.resolve().await;
    let message = if replaced {
        "New chain detected"
    } else {
        "Old chain retained!"
    };

    Json(ResolveResponse {
        message: message.to_string(),
        chain: node.chain_snapshot().await,
    })
}

async fn health_check(State(node): State<Arc<Node>>) -> impl IntoResponse {
    let (length, peers) = {
        let chain = node.blockchain();
        let chain = chain.read().await;
        (chain.len(), chain.peers().len())
    };

    Json(serde_json::json!({
        "status": "healthy",
        "node": node.identifier(),
        "length": length,
        "peers": peers,
    }))
}
