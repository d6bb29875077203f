//! HTTP/JSON-RPC front end: renders the Manager's public verb surface as a
//! REST surface and a JSON-RPC 2.0 surface over the same methods, plus
//! health and Prometheus endpoints.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{MatchedPath, Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use gateway_core::Manager;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod envelope;
pub mod jrpc;
pub mod metrics;
pub mod rest;
pub mod state;

pub use state::AppState;

#[cfg(test)]
test_r::enable!();

/// Wraps every request/response pair with a `gateway_http_requests_total`/
/// `gateway_http_request_duration_seconds` observation, labeled by the
/// route's pattern rather than the raw path (so `/rawGetAccountState?...`
/// and friends don't explode cardinality).
async fn track_metrics(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let verb = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().trim_start_matches('/').to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let started_at = Instant::now();
    let response = next.run(request).await;
    state.metrics.observe_request(&verb, response.status().as_u16(), started_at);
    response
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(rest::root))
        .route("/healthz", get(rest::healthz))
        .route("/metrics", get(metrics::metrics_handler))
        .route("/getMasterchainInfo", get(rest::get_masterchain_info))
        .route("/rawGetAccountState", get(rest::raw_get_account_state))
        .route("/genericGetAccountState", get(rest::generic_get_account_state))
        .route("/rawGetTransactions", get(rest::raw_get_transactions))
        .route("/getTransactions", get(rest::get_transactions))
        .route("/rawRunMethod", post(rest::raw_run_method))
        .route("/rawEstimateFees", post(rest::raw_estimate_fees))
        .route("/lookupBlock", get(rest::lookup_block))
        .route("/getShards", get(rest::get_shards))
        .route("/getBlockHeader", get(rest::get_block_header))
        .route("/rawGetBlockTransactions", get(rest::raw_get_block_transactions))
        .route("/getBlockTransactions", get(rest::get_block_transactions))
        .route("/getBlockTransactionsExt", get(rest::get_block_transactions_ext))
        .route("/getConfigParam", get(rest::get_config_param))
        .route("/getTokenData", get(rest::get_token_data))
        .route("/tryLocateTxByIncomingMessage", get(rest::try_locate_tx_by_incoming_message))
        .route("/tryLocateTxByOutcomingMessage", get(rest::try_locate_tx_by_outcoming_message))
        .route("/rawSendMessage", post(rest::raw_send_message))
        .route("/rawSendMessageReturnHash", post(rest::raw_send_message_return_hash))
        .route("/rawCreateAndSendQuery", post(rest::raw_create_and_send_query))
        .route("/rawCreateAndSendMessage", post(rest::raw_create_and_send_message))
        .route("/getConsensusBlock", get(rest::get_consensus_block))
        .route("/getWorkersState", get(rest::get_workers_state))
        .route("/jsonRPC", post(jrpc::jsonrpc_route))
        .route_layer(middleware::from_fn_with_state(state.clone(), track_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Binds and serves the router until the process is signaled to stop.
/// Mirrors the teacher's `run_debug_server` bootstrap shape
/// (`cloud-debugging-service::lib::run_debug_server`): bind, log the bound
/// address, serve.
pub async fn serve(manager: Arc<Manager>, address: &str, port: u16) -> anyhow::Result<()> {
    let metrics = Arc::new(metrics::Metrics::new());
    let state = AppState::new(manager, metrics);
    let app = build_router(state);

    let addr = format!("{address}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!("gateway HTTP/JSON-RPC front end listening on {local_addr}");

    axum::serve(listener, app).await?;
    Ok(())
}
