//! A deterministic stand-in for the native capability. Used both as the
//! gateway's default implementation (there is no bundled tonlib binding in
//! this repo — see the capability trait seam in `LiteClient`) and as the
//! test double for worker/dispatcher/consensus tests.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use gateway_common::error::GatewayError;
use serde_json::{json, Value};

use crate::client::LiteClient;
use crate::model::*;

pub struct StubLiteClient {
    last_block: AtomicI64,
    is_archival: AtomicBool,
    delays: Mutex<HashMap<&'static str, Duration>>,
    failing: Mutex<HashSet<&'static str>>,
    keystore_path: Option<PathBuf>,
}

impl StubLiteClient {
    pub fn new(initial_seqno: i64, is_archival: bool) -> Self {
        StubLiteClient {
            last_block: AtomicI64::new(initial_seqno),
            is_archival: AtomicBool::new(is_archival),
            delays: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            keystore_path: None,
        }
    }

    /// Records the per-worker keystore directory this client was resolved
    /// against. The stub has no keys to load, but a real tonlib-backed
    /// client would read its liteserver public key material from here.
    pub fn with_keystore_path(mut self, path: PathBuf) -> Self {
        self.keystore_path = Some(path);
        self
    }

    pub fn keystore_path(&self) -> Option<&PathBuf> {
        self.keystore_path.as_ref()
    }

    pub fn set_last_block(&self, seqno: i64) {
        self.last_block.store(seqno, Ordering::SeqCst);
    }

    /// Makes every call to `method` sleep for `delay` before producing its
    /// (otherwise normal) response, for exercising timeouts and fan-out
    /// races deterministically.
    pub fn with_delay(self, method: &'static str, delay: Duration) -> Self {
        self.delays.lock().unwrap().insert(method, delay);
        self
    }

    /// Makes every call to `method` fail with `UpstreamError`.
    pub fn fail(self, method: &'static str) -> Self {
        self.failing.lock().unwrap().insert(method);
        self
    }

    async fn simulate(&self, method: &'static str) -> Result<(), GatewayError> {
        let delay = self.delays.lock().unwrap().get(method).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().unwrap().contains(method) {
            return Err(GatewayError::UpstreamError(format!("stub: {method} configured to fail")));
        }
        Ok(())
    }

    fn block_id(&self, seqno: i32) -> BlockIdExt {
        BlockIdExt {
            workchain: -1,
            shard: -9_223_372_036_854_775_808,
            seqno,
            root_hash: format!("root_hash_{seqno}"),
            file_hash: format!("file_hash_{seqno}"),
        }
    }
}

#[async_trait]
impl LiteClient for StubLiteClient {
    async fn get_masterchain_info(&self) -> Result<MasterchainInfo, GatewayError> {
        self.simulate("get_masterchain_info").await?;
        let seqno = self.last_block.load(Ordering::SeqCst) as i32;
        Ok(MasterchainInfo {
            last: self.block_id(seqno),
            state_root_hash: "state_root_hash".to_string(),
            init: self.block_id(1),
        })
    }

    async fn get_masterchain_block_signatures(&self, seqno: i32) -> Result<Value, GatewayError> {
        self.simulate("get_masterchain_block_signatures").await?;
        Ok(json!({ "seqno": seqno, "signatures": [] }))
    }

    async fn get_shard_block_proof(&self, block: &BlockIdExt) -> Result<Value, GatewayError> {
        self.simulate("get_shard_block_proof").await?;
        Ok(json!({ "masterchain_id": block, "links": [] }))
    }

    async fn lookup_block(
        &self,
        workchain: i32,
        _shard: i64,
        seqno: Option<i32>,
        _lt: Option<i64>,
        _utime: Option<i64>,
    ) -> Result<BlockIdExt, GatewayError> {
        self.simulate("lookup_block").await?;
        let mut block = self.block_id(seqno.unwrap_or(1));
        block.workchain = workchain;
        Ok(block)
    }

    async fn get_shards(&self, seqno: i32) -> Result<ShardsResult, GatewayError> {
        self.simulate("get_shards").await?;
        Ok(ShardsResult { shards: vec![self.block_id(seqno)] })
    }

    async fn get_block_header(&self, block: &BlockIdExt) -> Result<BlockHeader, GatewayError> {
        self.simulate("get_block_header").await?;
        Ok(BlockHeader {
            id: block.clone(),
            global_id: -239,
            version: 0,
            after_merge: false,
            after_split: false,
            before_split: false,
            want_merge: false,
            want_split: false,
            validator_list_hash_short: 0,
            catchain_seqno: 0,
            min_ref_mc_seqno: 0,
            is_key_block: false,
            prev_key_block_seqno: 0,
            start_lt: 0,
            end_lt: 0,
            gen_utime: 0,
            prev_blocks: vec![],
        })
    }

    async fn get_block_transactions(
        &self,
        block: &BlockIdExt,
        _count: i32,
        _after_lt: Option<i64>,
    ) -> Result<BlockTransactions, GatewayError> {
        self.simulate("get_block_transactions").await?;
        Ok(BlockTransactions {
            id: block.clone(),
            req_count: 0,
            incomplete: false,
            transactions: vec![],
        })
    }

    async fn raw_get_block_transactions(
        &self,
        block: &BlockIdExt,
        count: i32,
        after_lt: Option<i64>,
    ) -> Result<BlockTransactions, GatewayError> {
        self.simulate("raw_get_block_transactions").await?;
        if block.seqno < 0 {
            return Err(GatewayError::NotFound("block not found".to_string()));
        }
        self.get_block_transactions(block, count, after_lt).await
    }

    async fn raw_get_account_state(&self, address: &str) -> Result<AccountState, GatewayError> {
        self.simulate("raw_get_account_state").await?;
        Ok(AccountState {
            address: address.to_string(),
            balance: 1_000_000_000,
            code: Some("code_boc".to_string()),
            data: Some("data_boc".to_string()),
            last_transaction_id: Some(TransactionId { lt: 1, hash: "tx_hash".to_string() }),
            sync_utime: 0,
            frozen_hash: None,
        })
    }

    async fn generic_get_account_state(&self, address: &str) -> Result<AccountState, GatewayError> {
        self.simulate("generic_get_account_state").await?;
        self.raw_get_account_state(address).await
    }

    async fn raw_get_transactions(
        &self,
        address: &str,
        from_lt: i64,
        from_hash: &str,
    ) -> Result<RawTransactions, GatewayError> {
        self.simulate("raw_get_transactions").await?;
        let _ = from_hash;
        if from_lt <= 0 {
            return Ok(RawTransactions { transactions: vec![], previous_transaction_id: None });
        }
        let tx = RawTransaction {
            address: address.to_string(),
            utime: 0,
            data: "tx_boc".to_string(),
            transaction_id: TransactionId { lt: from_lt, hash: format!("hash_{from_lt}") },
            fee: 1000,
            storage_fee: 0,
            other_fee: 1000,
            in_msg: None,
            out_msgs: vec![],
        };
        Ok(RawTransactions {
            transactions: vec![tx],
            previous_transaction_id: if from_lt > 1 {
                Some(TransactionId { lt: from_lt - 1, hash: format!("hash_{}", from_lt - 1) })
            } else {
                None
            },
        })
    }

    async fn raw_run_method(
        &self,
        _address: &str,
        _method: &str,
        _stack: &[Value],
    ) -> Result<RunMethodResult, GatewayError> {
        self.simulate("raw_run_method").await?;
        Ok(RunMethodResult { exit_code: 0, stack: vec![], block_id: self.block_id(1) })
    }

    async fn raw_send_message(&self, _boc: &str) -> Result<SendMessageResult, GatewayError> {
        self.simulate("raw_send_message").await?;
        Ok(SendMessageResult { sent: true })
    }

    async fn raw_send_message_return_hash(
        &self,
        boc: &str,
    ) -> Result<SendMessageReturnHashResult, GatewayError> {
        self.simulate("raw_send_message_return_hash").await?;
        Ok(SendMessageReturnHashResult { sent: true, message_hash: format!("hash_of_{}", boc.len()) })
    }

    async fn raw_create_and_send_query(
        &self,
        _destination: &str,
        _body: &str,
        _init_code: Option<&str>,
        _init_data: Option<&str>,
    ) -> Result<SendMessageResult, GatewayError> {
        self.simulate("raw_create_and_send_query").await?;
        Ok(SendMessageResult { sent: true })
    }

    async fn raw_create_and_send_message(
        &self,
        _destination: &str,
        _body: &str,
        _init_state: Option<&str>,
    ) -> Result<SendMessageResult, GatewayError> {
        self.simulate("raw_create_and_send_message").await?;
        Ok(SendMessageResult { sent: true })
    }

    async fn raw_estimate_fees(
        &self,
        _destination: &str,
        _body: &str,
        _init_code: Option<&str>,
        _init_data: Option<&str>,
        _ignore_chksig: bool,
    ) -> Result<EstimateFeesResult, GatewayError> {
        self.simulate("raw_estimate_fees").await?;
        Ok(EstimateFeesResult {
            source_fees: Fees { in_fwd_fee: 0, storage_fee: 0, gas_fee: 1000, fwd_fee: 0 },
            destination_fees: vec![],
        })
    }

    async fn get_config_param(&self, param: i32, _seqno: Option<i32>) -> Result<Value, GatewayError> {
        self.simulate("get_config_param").await?;
        Ok(json!({ "param": param, "config": {} }))
    }

    async fn get_token_data(&self, address: &str) -> Result<Value, GatewayError> {
        self.simulate("get_token_data").await?;
        Ok(json!({ "address": address, "type": "jetton_master" }))
    }

    async fn try_locate_tx_by_incoming_message(
        &self,
        _source: &str,
        _destination: &str,
        created_lt: i64,
    ) -> Result<LocateTxResult, GatewayError> {
        self.simulate("try_locate_tx_by_incoming_message").await?;
        Ok(LocateTxResult { transaction_id: TransactionId { lt: created_lt, hash: "located_hash".to_string() } })
    }

    async fn try_locate_tx_by_outcoming_message(
        &self,
        _source: &str,
        _destination: &str,
        created_lt: i64,
    ) -> Result<LocateTxResult, GatewayError> {
        self.simulate("try_locate_tx_by_outcoming_message").await?;
        Ok(LocateTxResult { transaction_id: TransactionId { lt: created_lt, hash: "located_hash".to_string() } })
    }

    async fn probe_archival(&self) -> Result<bool, GatewayError> {
        self.simulate("probe_archival").await?;
        Ok(self.is_archival.load(Ordering::SeqCst))
    }
}
