//! JSON-RPC 2.0 front end mounted at `POST /jsonRPC`. Method-name dispatch
//! mirrors the teacher's `jrpc_handler` shape: match on the request's
//! `method`, parse params into a typed struct, call the matching verb,
//! convert the verb's `Result` into a `JsonRpcResponse`.

use std::sync::Arc;

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use axum_jrpc::error::{JsonRpcError, JsonRpcErrorReason};
use axum_jrpc::{Id, JsonRpcRequest, JsonRpcResponse};
use gateway_common::error::GatewayError;
use gateway_common::SafeDisplay;
use gateway_core::Manager;
use gateway_liteclient::model::BlockIdExt;
use serde::Deserialize;
use serde_json::Value;

use crate::state::AppState;

pub struct JrpcHandlerError {
    jrpc_id: Id,
    error_type: JrpcHandlerErrorType,
}

enum JrpcHandlerErrorType {
    Gateway(GatewayError),
    InvalidParams { error: String },
    MethodNotFound { method: String },
}

impl JrpcHandlerError {
    fn gateway(jrpc_id: Id, error: GatewayError) -> Self {
        JrpcHandlerError { jrpc_id, error_type: JrpcHandlerErrorType::Gateway(error) }
    }

    fn invalid_params(jrpc_id: Id, error: String) -> Self {
        JrpcHandlerError { jrpc_id, error_type: JrpcHandlerErrorType::InvalidParams { error } }
    }

    fn method_not_found(jrpc_id: Id, method: &str) -> Self {
        JrpcHandlerError { jrpc_id, error_type: JrpcHandlerErrorType::MethodNotFound { method: method.to_string() } }
    }

    fn to_jrpc_response(&self) -> JsonRpcResponse {
        match &self.error_type {
            JrpcHandlerErrorType::Gateway(err) => JsonRpcResponse::error(
                self.jrpc_id.clone(),
                JsonRpcError::new(JsonRpcErrorReason::ApplicationError(err.status_code() as i32), err.to_safe_string(), Value::Null),
            ),
            JrpcHandlerErrorType::InvalidParams { error } => JsonRpcResponse::error(
                self.jrpc_id.clone(),
                JsonRpcError::new(JsonRpcErrorReason::InvalidParams, error.clone(), Value::Null),
            ),
            JrpcHandlerErrorType::MethodNotFound { method } => JsonRpcResponse::error(
                self.jrpc_id.clone(),
                JsonRpcError::new(JsonRpcErrorReason::MethodNotFound, format!("method not found: {method}"), Value::Null),
            ),
        }
    }
}

type JsonRpcResult = Result<JsonRpcResponse, JrpcHandlerError>;

fn parse_params<T: serde::de::DeserializeOwned>(jrpc_id: &Id, value: Value) -> Result<T, JrpcHandlerError> {
    serde_json::from_value(value).map_err(|err| JrpcHandlerError::invalid_params(jrpc_id.clone(), err.to_string()))
}

fn to_result<T: serde::Serialize>(jrpc_id: &Id, result: Result<T, GatewayError>) -> JsonRpcResult {
    result
        .map(|value| JsonRpcResponse::success(jrpc_id.clone(), value))
        .map_err(|err| JrpcHandlerError::gateway(jrpc_id.clone(), err))
}

/// The original source and several clients call verbs in camelCase; the
/// canonical verb names (and `LiteMethod::name()`) are snake_case. Normalize
/// once here rather than doubling every match arm.
fn normalize_method(method: &str) -> String {
    let mut out = String::with_capacity(method.len() + 4);
    for ch in method.chars() {
        if ch.is_ascii_uppercase() {
            out.push('_');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

#[derive(Deserialize)]
struct AddressParams {
    address: String,
}

#[derive(Deserialize)]
struct RawGetTransactionsParams {
    address: String,
    from_lt: i64,
    from_hash: String,
    #[serde(default)]
    archival: bool,
}

#[derive(Deserialize)]
struct GetTransactionsParams {
    address: String,
    limit: u32,
    from_lt: Option<i64>,
    from_hash: Option<String>,
    #[serde(default)]
    to_lt: i64,
    #[serde(default)]
    archival: bool,
}

#[derive(Deserialize)]
struct RunMethodParams {
    address: String,
    method: String,
    #[serde(default)]
    stack: Vec<Value>,
}

#[derive(Deserialize)]
struct EstimateFeesParams {
    destination: String,
    body: String,
    init_code: Option<String>,
    init_data: Option<String>,
    #[serde(default)]
    ignore_chksig: bool,
}

#[derive(Deserialize)]
struct LookupBlockParams {
    workchain: i32,
    shard: i64,
    seqno: Option<i32>,
    lt: Option<i64>,
    utime: Option<i64>,
}

#[derive(Deserialize)]
struct SeqnoParams {
    seqno: i32,
}

#[derive(Deserialize)]
struct BlockIdParams {
    workchain: i32,
    shard: i64,
    seqno: i32,
    root_hash: String,
    file_hash: String,
}

impl From<BlockIdParams> for BlockIdExt {
    fn from(p: BlockIdParams) -> Self {
        BlockIdExt { workchain: p.workchain, shard: p.shard, seqno: p.seqno, root_hash: p.root_hash, file_hash: p.file_hash }
    }
}

#[derive(Deserialize)]
struct BlockTransactionsParams {
    #[serde(flatten)]
    block: BlockIdParams,
    count: i32,
    after_lt: Option<i64>,
}

#[derive(Deserialize)]
struct ConfigParamParams {
    param: i32,
    seqno: Option<i32>,
}

#[derive(Deserialize)]
struct LocateTxParams {
    source: String,
    destination: String,
    created_lt: i64,
}

#[derive(Deserialize)]
struct BocParams {
    boc: String,
}

#[derive(Deserialize)]
struct CreateAndSendQueryParams {
    destination: String,
    body: String,
    init_code: Option<String>,
    init_data: Option<String>,
}

#[derive(Deserialize)]
struct CreateAndSendMessageParams {
    destination: String,
    body: String,
    init_state: Option<String>,
}

async fn jrpc_handler(manager: Arc<Manager>, request: JsonRpcRequest) -> JsonRpcResult {
    let jrpc_id = request.id.clone();
    let params = request.params;

    match normalize_method(&request.method).as_str() {
        "get_masterchain_info" => to_result(&jrpc_id, manager.get_masterchain_info().await),
        "raw_get_account_state" => {
            let p: AddressParams = parse_params(&jrpc_id, params)?;
            to_result(&jrpc_id, manager.raw_get_account_state(&p.address).await)
        }
        "generic_get_account_state" => {
            let p: AddressParams = parse_params(&jrpc_id, params)?;
            to_result(&jrpc_id, manager.generic_get_account_state(&p.address).await)
        }
        "raw_get_transactions" => {
            let p: RawGetTransactionsParams = parse_params(&jrpc_id, params)?;
            to_result(&jrpc_id, manager.raw_get_transactions(&p.address, p.from_lt, &p.from_hash, p.archival).await)
        }
        "get_transactions" => {
            let p: GetTransactionsParams = parse_params(&jrpc_id, params)?;
            to_result(&jrpc_id, manager.get_transactions(p.address, p.limit, p.from_lt, p.from_hash, p.to_lt, p.archival).await)
        }
        "raw_run_method" => {
            let p: RunMethodParams = parse_params(&jrpc_id, params)?;
            to_result(&jrpc_id, manager.raw_run_method(&p.address, &p.method, p.stack).await)
        }
        "raw_estimate_fees" => {
            let p: EstimateFeesParams = parse_params(&jrpc_id, params)?;
            to_result(&jrpc_id, manager.raw_estimate_fees(&p.destination, &p.body, p.init_code, p.init_data, p.ignore_chksig).await)
        }
        "lookup_block" => {
            let p: LookupBlockParams = parse_params(&jrpc_id, params)?;
            to_result(&jrpc_id, manager.lookup_block(p.workchain, p.shard, p.seqno, p.lt, p.utime).await)
        }
        "get_shards" => {
            let p: SeqnoParams = parse_params(&jrpc_id, params)?;
            to_result(&jrpc_id, manager.get_shards(p.seqno).await)
        }
        "get_block_header" => {
            let p: BlockIdParams = parse_params(&jrpc_id, params)?;
            to_result(&jrpc_id, manager.get_block_header(p.into()).await)
        }
        "raw_get_block_transactions" => {
            let p: BlockTransactionsParams = parse_params(&jrpc_id, params)?;
            to_result(&jrpc_id, manager.raw_get_block_transactions(p.block.into(), p.count, p.after_lt).await)
        }
        "get_block_transactions" => {
            let p: BlockTransactionsParams = parse_params(&jrpc_id, params)?;
            to_result(&jrpc_id, manager.get_block_transactions(p.block.into(), p.count, p.after_lt, false).await)
        }
        "get_block_transactions_ext" => {
            let p: BlockTransactionsParams = parse_params(&jrpc_id, params)?;
            to_result(&jrpc_id, manager.get_block_transactions(p.block.into(), p.count, p.after_lt, true).await)
        }
        "get_config_param" => {
            let p: ConfigParamParams = parse_params(&jrpc_id, params)?;
            to_result(&jrpc_id, manager.get_config_param(p.param, p.seqno).await)
        }
        "get_token_data" => {
            let p: AddressParams = parse_params(&jrpc_id, params)?;
            to_result(&jrpc_id, manager.get_token_data(&p.address).await)
        }
        "try_locate_tx_by_incoming_message" => {
            let p: LocateTxParams = parse_params(&jrpc_id, params)?;
            to_result(&jrpc_id, manager.try_locate_tx_by_incoming_message(&p.source, &p.destination, p.created_lt).await)
        }
        "try_locate_tx_by_outcoming_message" => {
            let p: LocateTxParams = parse_params(&jrpc_id, params)?;
            to_result(&jrpc_id, manager.try_locate_tx_by_outcoming_message(&p.source, &p.destination, p.created_lt).await)
        }
        "raw_send_message" => {
            let p: BocParams = parse_params(&jrpc_id, params)?;
            to_result(&jrpc_id, manager.raw_send_message(&p.boc).await)
        }
        "raw_send_message_return_hash" => {
            let p: BocParams = parse_params(&jrpc_id, params)?;
            to_result(&jrpc_id, manager.raw_send_message_return_hash(&p.boc).await)
        }
        "raw_create_and_send_query" => {
            let p: CreateAndSendQueryParams = parse_params(&jrpc_id, params)?;
            to_result(&jrpc_id, manager.raw_create_and_send_query(&p.destination, &p.body, p.init_code, p.init_data).await)
        }
        "raw_create_and_send_message" => {
            let p: CreateAndSendMessageParams = parse_params(&jrpc_id, params)?;
            to_result(&jrpc_id, manager.raw_create_and_send_message(&p.destination, &p.body, p.init_state).await)
        }
        "get_consensus_block" => Ok(JsonRpcResponse::success(jrpc_id, manager.get_consensus_block())),
        "get_workers_state" => Ok(JsonRpcResponse::success(jrpc_id, manager.get_workers_state())),

        method => Err(JrpcHandlerError::method_not_found(jrpc_id, method)),
    }
}

pub async fn jsonrpc_route(State(state): State<AppState>, Json(body): Json<Value>) -> Response {
    let request: JsonRpcRequest = match serde_json::from_value(body) {
        Ok(request) => request,
        Err(err) => {
            let response = JsonRpcResponse::error(
                Id::None(()),
                JsonRpcError::new(JsonRpcErrorReason::ParseError, err.to_string(), Value::Null),
            );
            return Json(response).into_response();
        }
    };

    match jrpc_handler(state.manager.clone(), request).await {
        Ok(response) => Json(response).into_response(),
        Err(handler_error) => {
            tracing::warn!("jsonrpc call failed for method");
            Json(handler_error.to_jrpc_response()).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_camel_case_to_snake_case() {
        assert_eq!(normalize_method("getMasterchainInfo"), "get_masterchain_info");
        assert_eq!(normalize_method("raw_get_account_state"), "raw_get_account_state");
        assert_eq!(normalize_method("tryLocateTxByIncomingMessage"), "try_locate_tx_by_incoming_message");
    }
}
