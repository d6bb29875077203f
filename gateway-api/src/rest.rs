//! One handler per REST route in the public verb surface, each: parse query
//! or JSON body params, call the matching `Manager` verb, render the
//! `ok`/`error`/`code` envelope.

use axum::extract::{Query, State};
use axum::Json;
use gateway_liteclient::model::BlockIdExt;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::envelope::{ApiOk, ApiResult};
use crate::state::AppState;

fn default_false() -> bool {
    false
}

#[derive(Debug, Deserialize)]
pub struct AddressQuery {
    pub address: String,
}

#[derive(Debug, Deserialize)]
pub struct RawGetTransactionsQuery {
    pub address: String,
    pub from_lt: i64,
    pub from_hash: String,
    #[serde(default = "default_false")]
    pub archival: bool,
}

#[derive(Debug, Deserialize)]
pub struct GetTransactionsQuery {
    pub address: String,
    pub limit: u32,
    pub from_lt: Option<i64>,
    pub from_hash: Option<String>,
    #[serde(default)]
    pub to_lt: i64,
    #[serde(default = "default_false")]
    pub archival: bool,
}

#[derive(Debug, Deserialize)]
pub struct RunMethodBody {
    pub address: String,
    pub method: String,
    #[serde(default)]
    pub stack: Vec<Value>,
}

#[derive(Debug, Deserialize)]
pub struct EstimateFeesBody {
    pub destination: String,
    pub body: String,
    pub init_code: Option<String>,
    pub init_data: Option<String>,
    #[serde(default = "default_false")]
    pub ignore_chksig: bool,
}

#[derive(Debug, Deserialize)]
pub struct LookupBlockQuery {
    pub workchain: i32,
    pub shard: i64,
    pub seqno: Option<i32>,
    pub lt: Option<i64>,
    pub utime: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SeqnoQuery {
    pub seqno: i32,
}

#[derive(Debug, Deserialize)]
pub struct BlockIdQuery {
    pub workchain: i32,
    pub shard: i64,
    pub seqno: i32,
    pub root_hash: String,
    pub file_hash: String,
}

impl From<BlockIdQuery> for BlockIdExt {
    fn from(q: BlockIdQuery) -> Self {
        BlockIdExt { workchain: q.workchain, shard: q.shard, seqno: q.seqno, root_hash: q.root_hash, file_hash: q.file_hash }
    }
}

#[derive(Debug, Deserialize)]
pub struct BlockTransactionsQuery {
    #[serde(flatten)]
    pub block: BlockIdQuery,
    pub count: i32,
    pub after_lt: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ConfigParamQuery {
    pub param: i32,
    pub seqno: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct LocateTxQuery {
    pub source: String,
    pub destination: String,
    pub created_lt: i64,
}

#[derive(Debug, Deserialize)]
pub struct BocBody {
    pub boc: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateAndSendQueryBody {
    pub destination: String,
    pub body: String,
    pub init_code: Option<String>,
    pub init_data: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateAndSendMessageBody {
    pub destination: String,
    pub body: String,
    pub init_state: Option<String>,
}

pub async fn root() -> Json<Value> {
    Json(json!({ "ok": true, "service": "ton-gateway" }))
}

pub async fn healthz(State(state): State<AppState>) -> Json<Value> {
    let workers = state.manager.get_workers_state();
    let healthy = workers.iter().any(|w| w.is_enabled && w.is_working);
    let quarantined: Vec<usize> = workers.iter().filter(|w| !w.is_enabled).map(|w| w.index).collect();
    Json(json!({
        "ok": healthy,
        "consensus": state.manager.get_consensus_block(),
        "quarantined_slots": quarantined,
    }))
}

pub async fn get_masterchain_info(State(state): State<AppState>) -> ApiResult {
    Ok(ApiOk(state.manager.get_masterchain_info().await?))
}

pub async fn raw_get_account_state(State(state): State<AppState>, Query(q): Query<AddressQuery>) -> ApiResult {
    Ok(ApiOk(state.manager.raw_get_account_state(&q.address).await?))
}

pub async fn generic_get_account_state(State(state): State<AppState>, Query(q): Query<AddressQuery>) -> ApiResult {
    Ok(ApiOk(state.manager.generic_get_account_state(&q.address).await?))
}

pub async fn raw_get_transactions(State(state): State<AppState>, Query(q): Query<RawGetTransactionsQuery>) -> ApiResult {
    Ok(ApiOk(state.manager.raw_get_transactions(&q.address, q.from_lt, &q.from_hash, q.archival).await?))
}

pub async fn get_transactions(State(state): State<AppState>, Query(q): Query<GetTransactionsQuery>) -> ApiResult {
    Ok(ApiOk(state.manager.get_transactions(q.address, q.limit, q.from_lt, q.from_hash, q.to_lt, q.archival).await?))
}

pub async fn raw_run_method(State(state): State<AppState>, Json(body): Json<RunMethodBody>) -> ApiResult {
    Ok(ApiOk(state.manager.raw_run_method(&body.address, &body.method, body.stack).await?))
}

pub async fn raw_estimate_fees(State(state): State<AppState>, Json(body): Json<EstimateFeesBody>) -> ApiResult {
    Ok(ApiOk(
        state
            .manager
            .raw_estimate_fees(&body.destination, &body.body, body.init_code, body.init_data, body.ignore_chksig)
            .await?,
    ))
}

pub async fn lookup_block(State(state): State<AppState>, Query(q): Query<LookupBlockQuery>) -> ApiResult {
    Ok(ApiOk(state.manager.lookup_block(q.workchain, q.shard, q.seqno, q.lt, q.utime).await?))
}

pub async fn get_shards(State(state): State<AppState>, Query(q): Query<SeqnoQuery>) -> ApiResult {
    Ok(ApiOk(state.manager.get_shards(q.seqno).await?))
}

pub async fn get_block_header(State(state): State<AppState>, Query(q): Query<BlockIdQuery>) -> ApiResult {
    Ok(ApiOk(state.manager.get_block_header(q.into()).await?))
}

pub async fn raw_get_block_transactions(State(state): State<AppState>, Query(q): Query<BlockTransactionsQuery>) -> ApiResult {
    Ok(ApiOk(state.manager.raw_get_block_transactions(q.block.into(), q.count, q.after_lt).await?))
}

pub async fn get_block_transactions(State(state): State<AppState>, Query(q): Query<BlockTransactionsQuery>) -> ApiResult {
    Ok(ApiOk(state.manager.get_block_transactions(q.block.into(), q.count, q.after_lt, false).await?))
}

pub async fn get_block_transactions_ext(State(state): State<AppState>, Query(q): Query<BlockTransactionsQuery>) -> ApiResult {
    Ok(ApiOk(state.manager.get_block_transactions(q.block.into(), q.count, q.after_lt, true).await?))
}

pub async fn get_config_param(State(state): State<AppState>, Query(q): Query<ConfigParamQuery>) -> ApiResult {
    Ok(ApiOk(state.manager.get_config_param(q.param, q.seqno).await?))
}

pub async fn get_token_data(State(state): State<AppState>, Query(q): Query<AddressQuery>) -> ApiResult {
    Ok(ApiOk(state.manager.get_token_data(&q.address).await?))
}

pub async fn try_locate_tx_by_incoming_message(State(state): State<AppState>, Query(q): Query<LocateTxQuery>) -> ApiResult {
    Ok(ApiOk(state.manager.try_locate_tx_by_incoming_message(&q.source, &q.destination, q.created_lt).await?))
}

pub async fn try_locate_tx_by_outcoming_message(State(state): State<AppState>, Query(q): Query<LocateTxQuery>) -> ApiResult {
    Ok(ApiOk(state.manager.try_locate_tx_by_outcoming_message(&q.source, &q.destination, q.created_lt).await?))
}

pub async fn raw_send_message(State(state): State<AppState>, Json(body): Json<BocBody>) -> ApiResult {
    Ok(ApiOk(state.manager.raw_send_message(&body.boc).await?))
}

pub async fn raw_send_message_return_hash(State(state): State<AppState>, Json(body): Json<BocBody>) -> ApiResult {
    Ok(ApiOk(state.manager.raw_send_message_return_hash(&body.boc).await?))
}

pub async fn raw_create_and_send_query(State(state): State<AppState>, Json(body): Json<CreateAndSendQueryBody>) -> ApiResult {
    Ok(ApiOk(
        state
            .manager
            .raw_create_and_send_query(&body.destination, &body.body, body.init_code, body.init_data)
            .await?,
    ))
}

pub async fn raw_create_and_send_message(State(state): State<AppState>, Json(body): Json<CreateAndSendMessageBody>) -> ApiResult {
    Ok(ApiOk(state.manager.raw_create_and_send_message(&body.destination, &body.body, body.init_state).await?))
}

pub async fn get_consensus_block(State(state): State<AppState>) -> ApiResult {
    Ok(ApiOk(serde_json::to_value(state.manager.get_consensus_block()).expect("ConsensusBlock always serializes")))
}

pub async fn get_workers_state(State(state): State<AppState>) -> ApiResult {
    Ok(ApiOk(serde_json::to_value(state.manager.get_workers_state()).expect("WorkerInfo always serializes")))
}
