//! Decoded shapes returned by the native capability. These mirror the
//! liteserver JSON schema closely enough for the gateway's public verbs, but
//! are not a complete tonlib binding — fields the gateway never inspects are
//! carried as opaque `serde_json::Value` rather than modeled.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlockIdExt {
    pub workchain: i32,
    pub shard: i64,
    pub seqno: i32,
    pub root_hash: String,
    pub file_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasterchainInfo {
    pub last: BlockIdExt,
    pub state_root_hash: String,
    pub init: BlockIdExt,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransactionId {
    pub lt: i64,
    pub hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountState {
    pub address: String,
    pub balance: i64,
    pub code: Option<String>,
    pub data: Option<String>,
    pub last_transaction_id: Option<TransactionId>,
    pub sync_utime: i64,
    pub frozen_hash: Option<String>,
}

/// The `msg_data` tag of a message body, either a raw BOC or plain text,
/// both base64-encoded on the wire. `Unknown` covers any tag this gateway
/// does not recognize.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "@type")]
pub enum MsgData {
    #[serde(rename = "msg.dataRaw")]
    Raw { body: String },
    #[serde(rename = "msg.dataText")]
    Text { text: String },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMessage {
    pub source: Option<String>,
    pub destination: Option<String>,
    pub value: i64,
    pub fwd_fee: i64,
    pub ihr_fee: i64,
    pub created_lt: i64,
    pub body_hash: String,
    pub msg_data: Option<MsgData>,
    /// Present once a `get_transactions` caller decodes `msg_data` into a
    /// plain body; absent on the raw wire shape.
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTransaction {
    pub address: String,
    pub utime: i64,
    pub data: String,
    pub transaction_id: TransactionId,
    pub fee: i64,
    pub storage_fee: i64,
    pub other_fee: i64,
    pub in_msg: Option<RawMessage>,
    pub out_msgs: Vec<RawMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTransactions {
    pub transactions: Vec<RawTransaction>,
    pub previous_transaction_id: Option<TransactionId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMethodResult {
    pub exit_code: i32,
    pub stack: Vec<serde_json::Value>,
    pub block_id: BlockIdExt,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageResult {
    pub sent: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageReturnHashResult {
    pub sent: bool,
    pub message_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fees {
    pub in_fwd_fee: i64,
    pub storage_fee: i64,
    pub gas_fee: i64,
    pub fwd_fee: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimateFeesResult {
    pub source_fees: Fees,
    pub destination_fees: Vec<Fees>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardsResult {
    pub shards: Vec<BlockIdExt>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockHeader {
    pub id: BlockIdExt,
    pub global_id: i32,
    pub version: u32,
    pub after_merge: bool,
    pub after_split: bool,
    pub before_split: bool,
    pub want_merge: bool,
    pub want_split: bool,
    pub validator_list_hash_short: i32,
    pub catchain_seqno: i32,
    pub min_ref_mc_seqno: i32,
    pub is_key_block: bool,
    pub prev_key_block_seqno: i32,
    pub start_lt: i64,
    pub end_lt: i64,
    pub gen_utime: i64,
    pub prev_blocks: Vec<BlockIdExt>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockTransactions {
    pub id: BlockIdExt,
    pub req_count: i32,
    pub incomplete: bool,
    pub transactions: Vec<TransactionId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocateTxResult {
    pub transaction_id: TransactionId,
}
