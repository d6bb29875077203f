use async_trait::async_trait;
use gateway_common::error::GatewayError;
use serde_json::Value;

use crate::method::LiteMethod;
use crate::model::*;

/// One connection to one upstream liteserver. Not `Send + Sync` by
/// contract even though the trait bound below requires it for object
/// safety inside a worker's task: a real tonlib-backed implementation must
/// serialize every call internally (e.g. behind its own mutex), because the
/// underlying native library is not safe to call concurrently.
#[async_trait]
pub trait LiteClient: Send + Sync {
    async fn get_masterchain_info(&self) -> Result<MasterchainInfo, GatewayError>;
    async fn get_masterchain_block_signatures(&self, seqno: i32) -> Result<Value, GatewayError>;
    async fn get_shard_block_proof(&self, block: &BlockIdExt) -> Result<Value, GatewayError>;
    async fn lookup_block(
        &self,
        workchain: i32,
        shard: i64,
        seqno: Option<i32>,
        lt: Option<i64>,
        utime: Option<i64>,
    ) -> Result<BlockIdExt, GatewayError>;
    async fn get_shards(&self, seqno: i32) -> Result<ShardsResult, GatewayError>;
    async fn get_block_header(&self, block: &BlockIdExt) -> Result<BlockHeader, GatewayError>;
    async fn get_block_transactions(
        &self,
        block: &BlockIdExt,
        count: i32,
        after_lt: Option<i64>,
    ) -> Result<BlockTransactions, GatewayError>;
    async fn raw_get_block_transactions(
        &self,
        block: &BlockIdExt,
        count: i32,
        after_lt: Option<i64>,
    ) -> Result<BlockTransactions, GatewayError>;
    async fn raw_get_account_state(&self, address: &str) -> Result<AccountState, GatewayError>;
    async fn generic_get_account_state(&self, address: &str) -> Result<AccountState, GatewayError>;
    async fn raw_get_transactions(
        &self,
        address: &str,
        from_lt: i64,
        from_hash: &str,
    ) -> Result<RawTransactions, GatewayError>;
    async fn raw_run_method(
        &self,
        address: &str,
        method: &str,
        stack: &[Value],
    ) -> Result<RunMethodResult, GatewayError>;
    async fn raw_send_message(&self, boc: &str) -> Result<SendMessageResult, GatewayError>;
    async fn raw_send_message_return_hash(
        &self,
        boc: &str,
    ) -> Result<SendMessageReturnHashResult, GatewayError>;
    async fn raw_create_and_send_query(
        &self,
        destination: &str,
        body: &str,
        init_code: Option<&str>,
        init_data: Option<&str>,
    ) -> Result<SendMessageResult, GatewayError>;
    async fn raw_create_and_send_message(
        &self,
        destination: &str,
        body: &str,
        init_state: Option<&str>,
    ) -> Result<SendMessageResult, GatewayError>;
    async fn raw_estimate_fees(
        &self,
        destination: &str,
        body: &str,
        init_code: Option<&str>,
        init_data: Option<&str>,
        ignore_chksig: bool,
    ) -> Result<EstimateFeesResult, GatewayError>;
    async fn get_config_param(&self, param: i32, seqno: Option<i32>) -> Result<Value, GatewayError>;
    async fn get_token_data(&self, address: &str) -> Result<Value, GatewayError>;
    async fn try_locate_tx_by_incoming_message(
        &self,
        source: &str,
        destination: &str,
        created_lt: i64,
    ) -> Result<LocateTxResult, GatewayError>;
    async fn try_locate_tx_by_outcoming_message(
        &self,
        source: &str,
        destination: &str,
        created_lt: i64,
    ) -> Result<LocateTxResult, GatewayError>;

    /// Attempt a random historical block-transactions fetch, used by the
    /// archival probe. Returns `Ok(true)` if the block was found (archival),
    /// `Ok(false)` if the liteserver reported "block not found" (not
    /// archival), and `Err` for any other failure (state left unchanged).
    async fn probe_archival(&self) -> Result<bool, GatewayError>;
}

/// Exhaustively matches `method` onto the capability trait and serializes
/// the typed result back into a JSON value, so the worker's task loop never
/// has to know about per-method result types.
pub async fn dispatch(client: &dyn LiteClient, method: &LiteMethod) -> Result<Value, GatewayError> {
    let value = match method {
        LiteMethod::GetMasterchainInfo => to_value(client.get_masterchain_info().await?),
        LiteMethod::GetMasterchainBlockSignatures { seqno } => {
            client.get_masterchain_block_signatures(*seqno).await?
        }
        LiteMethod::GetShardBlockProof { block } => client.get_shard_block_proof(block).await?,
        LiteMethod::LookupBlock { workchain, shard, seqno, lt, utime } => to_value(
            client
                .lookup_block(*workchain, *shard, *seqno, *lt, *utime)
                .await?,
        ),
        LiteMethod::GetShards { seqno } => to_value(client.get_shards(*seqno).await?),
        LiteMethod::GetBlockHeader { block } => to_value(client.get_block_header(block).await?),
        LiteMethod::GetBlockTransactions { block, count, after_lt } => {
            to_value(client.get_block_transactions(block, *count, *after_lt).await?)
        }
        LiteMethod::GetBlockTransactionsExt { block, count, after_lt } => {
            to_value(client.get_block_transactions(block, *count, *after_lt).await?)
        }
        LiteMethod::RawGetBlockTransactions { block, count, after_lt } => {
            to_value(client.raw_get_block_transactions(block, *count, *after_lt).await?)
        }
        LiteMethod::RawGetAccountState { address } => {
            to_value(client.raw_get_account_state(address).await?)
        }
        LiteMethod::GenericGetAccountState { address } => {
            to_value(client.generic_get_account_state(address).await?)
        }
        LiteMethod::RawGetTransactions { address, from_lt, from_hash } => to_value(
            client
                .raw_get_transactions(address, *from_lt, from_hash)
                .await?,
        ),
        LiteMethod::GetTransactions { .. } => {
            // `get_transactions` is a manager-level pagination loop over
            // `raw_get_transactions`, not a single capability call; the
            // dispatcher never routes this variant to a worker directly.
            return Err(GatewayError::Validation(
                "get_transactions must be paginated by the manager, not dispatched directly"
                    .to_string(),
            ));
        }
        LiteMethod::RawRunMethod { address, method, stack } => {
            to_value(client.raw_run_method(address, method, stack).await?)
        }
        LiteMethod::RawSendMessage { boc } => to_value(client.raw_send_message(boc).await?),
        LiteMethod::RawSendMessageReturnHash { boc } => {
            to_value(client.raw_send_message_return_hash(boc).await?)
        }
        LiteMethod::RawCreateAndSendQuery { destination, body, init_code, init_data } => to_value(
            client
                .raw_create_and_send_query(
                    destination,
                    body,
                    init_code.as_deref(),
                    init_data.as_deref(),
                )
                .await?,
        ),
        LiteMethod::RawCreateAndSendMessage { destination, body, init_state } => to_value(
            client
                .raw_create_and_send_message(destination, body, init_state.as_deref())
                .await?,
        ),
        LiteMethod::RawEstimateFees { destination, body, init_code, init_data, ignore_chksig } => {
            to_value(
                client
                    .raw_estimate_fees(
                        destination,
                        body,
                        init_code.as_deref(),
                        init_data.as_deref(),
                        *ignore_chksig,
                    )
                    .await?,
            )
        }
        LiteMethod::GetConfigParam { param, seqno } => {
            client.get_config_param(*param, *seqno).await?
        }
        LiteMethod::GetTokenData { address } => client.get_token_data(address).await?,
        LiteMethod::TryLocateTxByIncomingMessage { source, destination, created_lt } => to_value(
            client
                .try_locate_tx_by_incoming_message(source, destination, *created_lt)
                .await?,
        ),
        LiteMethod::TryLocateTxByOutcomingMessage { source, destination, created_lt } => to_value(
            client
                .try_locate_tx_by_outcoming_message(source, destination, *created_lt)
                .await?,
        ),
    };
    Ok(value)
}

fn to_value<T: serde::Serialize>(value: T) -> Value {
    serde_json::to_value(value).expect("capability result types always serialize")
}
