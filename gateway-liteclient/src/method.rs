//! The closed set of operations a worker may invoke on its native
//! capability. The original gateway selected these by string name
//! (reflection); here the callable set is a sum type and dispatch is an
//! exhaustive match, so adding an upstream operation is a compile error
//! until every call site accounts for it.

use crate::model::BlockIdExt;
use serde_json::Value;

#[derive(Debug, Clone)]
pub enum LiteMethod {
    GetMasterchainInfo,
    GetMasterchainBlockSignatures { seqno: i32 },
    GetShardBlockProof { block: BlockIdExt },
    LookupBlock {
        workchain: i32,
        shard: i64,
        seqno: Option<i32>,
        lt: Option<i64>,
        utime: Option<i64>,
    },
    GetShards { seqno: i32 },
    GetBlockHeader { block: BlockIdExt },
    GetBlockTransactions { block: BlockIdExt, count: i32, after_lt: Option<i64> },
    GetBlockTransactionsExt { block: BlockIdExt, count: i32, after_lt: Option<i64> },
    RawGetBlockTransactions { block: BlockIdExt, count: i32, after_lt: Option<i64> },
    RawGetAccountState { address: String },
    GenericGetAccountState { address: String },
    RawGetTransactions { address: String, from_lt: i64, from_hash: String },
    GetTransactions {
        address: String,
        limit: u32,
        from_lt: Option<i64>,
        from_hash: Option<String>,
        to_lt: i64,
    },
    RawRunMethod { address: String, method: String, stack: Vec<Value> },
    RawSendMessage { boc: String },
    RawSendMessageReturnHash { boc: String },
    RawCreateAndSendQuery { destination: String, body: String, init_code: Option<String>, init_data: Option<String> },
    RawCreateAndSendMessage { destination: String, body: String, init_state: Option<String> },
    RawEstimateFees { destination: String, body: String, init_code: Option<String>, init_data: Option<String>, ignore_chksig: bool },
    GetConfigParam { param: i32, seqno: Option<i32> },
    GetTokenData { address: String },
    TryLocateTxByIncomingMessage { source: String, destination: String, created_lt: i64 },
    TryLocateTxByOutcomingMessage { source: String, destination: String, created_lt: i64 },
}

impl LiteMethod {
    /// Canonical name, matching the wire name used by the original gateway
    /// and the name clients send over JSON-RPC/REST.
    pub fn name(&self) -> &'static str {
        match self {
            LiteMethod::GetMasterchainInfo => "get_masterchain_info",
            LiteMethod::GetMasterchainBlockSignatures { .. } => "get_masterchain_block_signatures",
            LiteMethod::GetShardBlockProof { .. } => "get_shard_block_proof",
            LiteMethod::LookupBlock { .. } => "lookup_block",
            LiteMethod::GetShards { .. } => "get_shards",
            LiteMethod::GetBlockHeader { .. } => "get_block_header",
            LiteMethod::GetBlockTransactions { .. } => "get_block_transactions",
            LiteMethod::GetBlockTransactionsExt { .. } => "get_block_transactions_ext",
            LiteMethod::RawGetBlockTransactions { .. } => "raw_get_block_transactions",
            LiteMethod::RawGetAccountState { .. } => "raw_get_account_state",
            LiteMethod::GenericGetAccountState { .. } => "generic_get_account_state",
            LiteMethod::RawGetTransactions { .. } => "raw_get_transactions",
            LiteMethod::GetTransactions { .. } => "get_transactions",
            LiteMethod::RawRunMethod { .. } => "raw_run_method",
            LiteMethod::RawSendMessage { .. } => "raw_send_message",
            LiteMethod::RawSendMessageReturnHash { .. } => "raw_send_message_return_hash",
            LiteMethod::RawCreateAndSendQuery { .. } => "raw_create_and_send_query",
            LiteMethod::RawCreateAndSendMessage { .. } => "raw_create_and_send_message",
            LiteMethod::RawEstimateFees { .. } => "raw_estimate_fees",
            LiteMethod::GetConfigParam { .. } => "get_config_param",
            LiteMethod::GetTokenData { .. } => "get_token_data",
            LiteMethod::TryLocateTxByIncomingMessage { .. } => "try_locate_tx_by_incoming_message",
            LiteMethod::TryLocateTxByOutcomingMessage { .. } => "try_locate_tx_by_outcoming_message",
        }
    }

    /// Whether this method mutates network state (sends a message). Such
    /// methods are never cached and never retried.
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            LiteMethod::RawSendMessage { .. }
                | LiteMethod::RawSendMessageReturnHash { .. }
                | LiteMethod::RawCreateAndSendQuery { .. }
                | LiteMethod::RawCreateAndSendMessage { .. }
        )
    }
}
