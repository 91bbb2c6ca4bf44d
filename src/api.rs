//! REST API server for PowLedger
//!
//! Maps the node's operations onto HTTP routes: transaction submission,
//! mining, chain inspection, peer registration and conflict resolution.

use axum::{
    extract::{rejection::JsonRejection, Path, Request, State},
    http::{self, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::error::ChainError;
use crate::node::Node;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct ApiState {
    pub node: Arc<Node>,
    api_stats: Arc<RwLock<ApiStats>>,
}

impl ApiState {
    pub fn new(node: Arc<Node>) -> Self {
        Self {
            node,
            api_stats: Arc::new(RwLock::new(ApiStats::default())),
        }
    }
}

/// API request counters
#[derive(Debug, Default)]
struct ApiStats {
    total_requests: u64,
    successful_requests: u64,
    failed_requests: u64,
}

impl ApiStats {
    fn record_request(&mut self, success: bool) {
        self.total_requests += 1;
        if success {
            self.successful_requests += 1;
        } else {
            self.failed_requests += 1;
        }
    }
}

// ============================================================================
// API Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    BlockchainError(ChainError),
    InvalidInput(String),
    NotFound(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BlockchainError(e) => {
                let status = match &e {
                    ChainError::InvalidTransaction(_) | ChainError::InvalidPeer(_) => {
                        StatusCode::BAD_REQUEST
                    }
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if status.is_server_error() {
                    tracing::error!(error = %e, "request failed");
                }
                (status, e.to_string())
            }
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<ChainError> for ApiError {
    fn from(err: ChainError) -> Self {
        ApiError::BlockchainError(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidInput(rejection.body_text())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct NewTransactionRequest {
    pub sender: String,
    pub recipient: String,
    pub amount: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TransactionCreatedResponse {
    pub message: String,
    pub index: u64,
}

#[derive(Debug, Deserialize)]
pub struct RegisterNodesRequest {
    pub nodes: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterNodesResponse {
    pub message: String,
    pub total_nodes: Vec<String>,
}

#[derive(Serialize)]
pub struct ApiStatsResponse {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub transactions_submitted: u64,
    pub blocks_mined: u64,
    pub resolutions: u64,
    pub chain_replacements: u64,
    pub uptime_seconds: u64,
}

#[derive(Serialize)]
struct SuccessResponse {
    message: String,
}

/// Encode a value up front so that a failure surfaces as a serialization error.
fn to_json<T: Serialize>(value: &T) -> Result<Json<serde_json::Value>, ApiError> {
    Ok(Json(serde_json::to_value(value).map_err(ChainError::from)?))
}

// ============================================================================
// Middleware
// ============================================================================

/// Request statistics middleware
async fn stats_middleware(State(state): State<ApiState>, req: Request, next: Next) -> Response {
    let response = next.run(req).await;

    let success = response.status().is_success();
    state.api_stats.write().await.record_request(success);

    response
}

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

/// Build the API router with all endpoints
pub fn build_api_router(node: Arc<Node>) -> Router {
    let state = ApiState::new(node);

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(vec![
            http::Method::GET,
            http::Method::POST,
            http::Method::OPTIONS,
        ])
        .allow_headers(vec![http::header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(home))
        // Ledger endpoints
        .route("/mine", get(mine))
        .route("/transactions/new", post(new_transaction))
        .route("/chain", get(get_chain))
        // Peer endpoints
        .route("/nodes", get(list_nodes))
        .route("/nodes/register", post(register_nodes))
        .route("/nodes/register/:address", get(register_node))
        .route("/nodes/resolve", get(resolve_conflicts))
        // System endpoints
        .route("/health", get(health_check))
        .route("/stats", get(get_api_stats))
        .route("/close", get(close))
        .fallback(not_found)
        // logging before stats so every request is timed
        .layer(middleware::from_fn(logging_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), stats_middleware))
        .with_state(state)
        .layer(cors)
}

/// Serve the API on `addr` until the node is shut down or Ctrl-C is received.
pub async fn run_api_server(
    node: Arc<Node>,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = build_api_router(node.clone());
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(
        addr = %local_addr,
        identifier = %node.identifier(),
        "API server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(node))
        .await?;

    Ok(())
}

async fn shutdown_signal(node: Arc<Node>) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::warn!("Failed to listen for Ctrl-C: {}", e);
                // Without a signal handler, only an explicit close stops the server.
                node.shutdown_requested().await;
            }
        }
        _ = node.shutdown_requested() => {}
    }
    tracing::info!("shutting down API server");
}

// ============================================================================
// Route Handlers
// ============================================================================

async fn home(State(state): State<ApiState>) -> String {
    format!("Welcome to node #{}#", state.node.identifier())
}

async fn mine(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    let block = state.node.mine().await?;
    Ok((StatusCode::CREATED, to_json(&block)?))
}

async fn new_transaction(
    State(state): State<ApiState>,
    payload: Result<Json<NewTransactionRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;

    let index = state
        .node
        .submit_transaction(&req.sender, &req.recipient, req.amount)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(TransactionCreatedResponse {
            message: format!("Transaction will be added to block {}", index),
            index,
        }),
    ))
}

async fn get_chain(State(state): State<ApiState>) -> Result<Json<serde_json::Value>, ApiError> {
    to_json(&state.node.chain().await)
}

async fn list_nodes(State(state): State<ApiState>) -> impl IntoResponse {
    let nodes = state.node.peers();
    Json(serde_json::json!({
        "count": nodes.len(),
        "nodes": nodes
    }))
}

async fn register_node(
    State(state): State<ApiState>,
    Path(address): Path<String>,
) -> Result<Json<RegisterNodesResponse>, ApiError> {
    state.node.register_peer(&address)?;

    Ok(Json(RegisterNodesResponse {
        message: "New node has been added".to_string(),
        total_nodes: state.node.peers(),
    }))
}

async fn register_nodes(
    State(state): State<ApiState>,
    payload: Result<Json<RegisterNodesRequest>, JsonRejection>,
) -> Result<Json<RegisterNodesResponse>, ApiError> {
    let Json(req) = payload?;

    if req.nodes.is_empty() {
        return Err(ApiError::InvalidInput(
            "Please supply a valid list of nodes".to_string(),
        ));
    }

    state.node.register_peers(&req.nodes)?;

    Ok(Json(RegisterNodesResponse {
        message: "New nodes have been added".to_string(),
        total_nodes: state.node.peers(),
    }))
}

async fn resolve_conflicts(
    State(state): State<ApiState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let replaced = state.node.resolve_conflicts().await;
    let message = if replaced {
        "Our chain was replaced"
    } else {
        "Our chain is authoritative"
    };

    let chain = state.node.chain().await;
    Ok(Json(serde_json::json!({
        "message": message,
        "replaced": replaced,
        "chain": serde_json::to_value(&chain.chain).map_err(ChainError::from)?,
        "length": chain.length,
    })))
}

async fn health_check(State(state): State<ApiState>) -> impl IntoResponse {
    let chain_length = state.node.blockchain.read().await.len();
    Json(serde_json::json!({
        "status": "healthy",
        "identifier": state.node.identifier(),
        "chain_length": chain_length,
        "peers": state.node.peers.len(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn get_api_stats(State(state): State<ApiState>) -> impl IntoResponse {
    let api_stats = state.api_stats.read().await;
    let node_stats = state.node.stats();

    Json(ApiStatsResponse {
        total_requests: api_stats.total_requests,
        successful_requests: api_stats.successful_requests,
        failed_requests: api_stats.failed_requests,
        transactions_submitted: node_stats.transactions_submitted(),
        blocks_mined: node_stats.blocks_mined(),
        resolutions: node_stats.resolutions(),
        chain_replacements: node_stats.chain_replacements(),
        uptime_seconds: node_stats.uptime().as_secs(),
    })
}

async fn close(State(state): State<ApiState>) -> impl IntoResponse {
    state.node.shutdown();
    Json(SuccessResponse {
        message: format!("Closing node #{}#", state.node.identifier()),
    })
}

async fn not_found(req: Request) -> ApiError {
    ApiError::NotFound(format!("No route for {}", req.uri().path()))
}
