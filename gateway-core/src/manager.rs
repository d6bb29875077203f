//! The liteserver client pool's public face: wires supervisor, consensus
//! tracker, dispatcher and cache together and exposes one async method per
//! verb the HTTP/JSON-RPC front end calls.

use std::sync::Arc;
use std::time::Duration;

use gateway_common::config::{CacheConfig, SupervisorConfig};
use gateway_common::error::GatewayError;
use gateway_common::model::{ConsensusBlock, LiteserverConfig, WorkerInfo};
use gateway_liteclient::model::{AccountState, BlockIdExt};
use gateway_liteclient::LiteMethod;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cache::{build_cache, Cache, CacheKey};
use crate::consensus::{self, ConsensusTracker};
use crate::dispatcher::{DispatchResult, Dispatcher};
use crate::get_transactions::{self, PaginateParams};
use crate::supervisor::{ClientFactory, Supervisor};

const TTL_MASTERCHAIN_INFO: Duration = Duration::from_secs(1);
const TTL_ACCOUNT_STATE: Duration = Duration::from_secs(5);
const TTL_GET_TRANSACTIONS: Duration = Duration::from_secs(15);
const TTL_BLOCK_LOOKUP: Duration = Duration::from_secs(600);
const TTL_LOCATE_TX: Duration = Duration::from_secs(600);
const TTL_TOKEN_DATA: Duration = Duration::from_secs(15);
const RECENCY_WINDOW: i64 = 2000;
const SEND_MESSAGE_FANOUT: usize = 4;

pub struct Manager {
    supervisor: Arc<Supervisor>,
    dispatcher: Arc<Dispatcher>,
    consensus: Arc<ConsensusTracker>,
    cache: Box<dyn Cache>,
    strict_message_decoding: bool,
    shutdown: CancellationToken,
}

impl Manager {
    pub fn start(
        liteservers: Vec<LiteserverConfig>,
        factory: ClientFactory,
        queue_capacity: usize,
        supervisor_config: SupervisorConfig,
        request_timeout: Duration,
        cache_config: &CacheConfig,
        strict_message_decoding: bool,
    ) -> Result<Arc<Manager>, GatewayError> {
        let (supervisor, mut event_rx) = Supervisor::start(liteservers, factory, queue_capacity, supervisor_config);
        let dispatcher = Dispatcher::new(supervisor.clone(), request_timeout);
        let consensus = Arc::new(ConsensusTracker::new());
        let cache = build_cache(cache_config)?;
        let shutdown = CancellationToken::new();

        let manager = Arc::new(Manager {
            supervisor: supervisor.clone(),
            dispatcher: dispatcher.clone(),
            consensus: consensus.clone(),
            cache,
            strict_message_decoding,
            shutdown: shutdown.clone(),
        });

        tokio::spawn({
            let supervisor = supervisor.clone();
            let dispatcher = dispatcher.clone();
            let shutdown = shutdown.clone();
            async move {
                loop {
                    tokio::select! {
                        _ = shutdown.cancelled() => return,
                        maybe_event = event_rx.recv() => {
                            let Some((index, event)) = maybe_event else { return };
                            match event {
                                gateway_worker::WorkerEvent::TaskResult(result) => {
                                    supervisor.record_task_result(index, &result);
                                    dispatcher.resolve(result);
                                }
                                gateway_worker::WorkerEvent::LastBlockUpdate(seqno) => {
                                    supervisor.record_last_block(index, seqno);
                                }
                                gateway_worker::WorkerEvent::ArchivalUpdate(archival) => {
                                    supervisor.record_archival(index, archival);
                                }
                                gateway_worker::WorkerEvent::DeadReport { reason } => {
                                    supervisor.handle_dead(index, &reason).await;
                                }
                            }
                        }
                    }
                }
            }
        });

        tokio::spawn({
            let supervisor = supervisor.clone();
            let consensus = consensus.clone();
            let shutdown = shutdown.clone();
            async move {
                let mut ticker = tokio::time::interval(Duration::from_secs(1));
                loop {
                    tokio::select! {
                        _ = shutdown.cancelled() => return,
                        _ = ticker.tick() => {
                            let snapshots = supervisor.all_snapshots();
                            let seqno = consensus.recompute(&snapshots);
                            for worker in &snapshots {
                                supervisor.set_is_working(worker.index, consensus::is_working(worker.last_block, seqno));
                            }
                            supervisor.check_liveness().await;
                        }
                    }
                }
            }
        });

        Ok(manager)
    }

    pub async fn shutdown(&self) {
        info!("manager shutting down");
        self.shutdown.cancel();
        self.supervisor.shutdown().await;
    }

    pub fn get_consensus_block(&self) -> ConsensusBlock {
        self.consensus.snapshot()
    }

    pub fn get_workers_state(&self) -> Vec<WorkerInfo> {
        self.supervisor.all_snapshots()
    }

    pub async fn get_masterchain_info(&self) -> Result<Value, GatewayError> {
        self.cached(CacheKey::new("get_masterchain_info", ""), TTL_MASTERCHAIN_INFO, || {
            self.dispatcher.dispatch_any(LiteMethod::GetMasterchainInfo)
        })
        .await
    }

    pub async fn raw_get_account_state(&self, address: &str) -> Result<Value, GatewayError> {
        let key = CacheKey::new("raw_get_account_state", address);
        self.cached(key, TTL_ACCOUNT_STATE, || {
            self.dispatcher
                .dispatch_any_then_archival(LiteMethod::RawGetAccountState { address: address.to_string() })
        })
        .await
    }

    pub async fn generic_get_account_state(&self, address: &str) -> Result<Value, GatewayError> {
        let key = CacheKey::new("generic_get_account_state", address);
        self.cached(key, TTL_ACCOUNT_STATE, || {
            self.dispatcher
                .dispatch_any_then_archival(LiteMethod::GenericGetAccountState { address: address.to_string() })
        })
        .await
    }

    pub async fn raw_get_transactions(
        &self,
        address: &str,
        from_lt: i64,
        from_hash: &str,
        archival: bool,
    ) -> Result<Value, GatewayError> {
        let key = CacheKey::new("raw_get_transactions", &format!("{address}:{from_lt}:{from_hash}"));
        let method = LiteMethod::RawGetTransactions {
            address: address.to_string(),
            from_lt,
            from_hash: from_hash.to_string(),
        };
        self.cached(key, TTL_ACCOUNT_STATE, || async {
            if archival {
                self.dispatcher.dispatch_archival_preferred(method).await
            } else {
                self.dispatcher.dispatch_any(method).await
            }
        })
        .await
    }

    /// Paginated transaction history. If `from_lt`/`from_hash` are not
    /// supplied, the walk starts from the account's own last transaction.
    pub async fn get_transactions(
        &self,
        address: String,
        limit: u32,
        from_lt: Option<i64>,
        from_hash: Option<String>,
        to_lt: i64,
        archival: bool,
    ) -> Result<Value, GatewayError> {
        let fingerprint = format!("{address}:{limit}:{from_lt:?}:{from_hash:?}:{to_lt}:{archival}");
        let key = CacheKey::new("get_transactions", &fingerprint);
        if let Some(cached) = self.cache.get(&key).await {
            return Ok(cached);
        }

        let (start_lt, start_hash) = match (from_lt, from_hash) {
            (Some(lt), Some(hash)) => (lt, hash),
            _ => {
                let (state_value, _worker_info) = self
                    .dispatcher
                    .dispatch_any_then_archival(LiteMethod::RawGetAccountState { address: address.clone() })
                    .await?;
                let state: AccountState = serde_json::from_value(state_value)
                    .map_err(|err| GatewayError::UpstreamError(err.to_string()))?;
                match get_transactions::starting_point(&state) {
                    Some(point) => point,
                    None => return Ok(json!({ "transactions": Vec::<Value>::new() })),
                }
            }
        };

        let result = get_transactions::paginate(
            &self.dispatcher,
            PaginateParams { address, limit, start_lt, start_hash, to_lt, archival },
            self.strict_message_decoding,
        )
        .await?;
        self.cache.put(key, result.clone(), TTL_GET_TRANSACTIONS).await;
        Ok(result)
    }

    pub async fn raw_run_method(&self, address: &str, method: &str, stack: Vec<Value>) -> Result<Value, GatewayError> {
        let key = CacheKey::new("raw_run_method", &format!("{address}:{method}:{stack:?}"));
        self.cached(key, TTL_ACCOUNT_STATE, || {
            self.dispatcher.dispatch_any_then_archival(LiteMethod::RawRunMethod {
                address: address.to_string(),
                method: method.to_string(),
                stack,
            })
        })
        .await
    }

    pub async fn raw_estimate_fees(
        &self,
        destination: &str,
        body: &str,
        init_code: Option<String>,
        init_data: Option<String>,
        ignore_chksig: bool,
    ) -> Result<Value, GatewayError> {
        let key = CacheKey::new("raw_estimate_fees", &format!("{destination}:{body}:{init_code:?}:{init_data:?}"));
        self.cached(key, TTL_ACCOUNT_STATE, || {
            self.dispatcher.dispatch_any(LiteMethod::RawEstimateFees {
                destination: destination.to_string(),
                body: body.to_string(),
                init_code,
                init_data,
                ignore_chksig,
            })
        })
        .await
    }

    pub async fn lookup_block(
        &self,
        workchain: i32,
        shard: i64,
        seqno: Option<i32>,
        lt: Option<i64>,
        utime: Option<i64>,
    ) -> Result<Value, GatewayError> {
        let target = seqno.map(|s| s as i64).unwrap_or_else(|| self.consensus.current());
        let key = CacheKey::new("lookup_block", &format!("{workchain}:{shard}:{seqno:?}:{lt:?}:{utime:?}"));
        self.cached_by_recency(key, TTL_BLOCK_LOOKUP, target, || {
            self.dispatcher.dispatch_any(LiteMethod::LookupBlock { workchain, shard, seqno, lt, utime })
        }, || {
            self.dispatcher.dispatch_archival_preferred(LiteMethod::LookupBlock { workchain, shard, seqno, lt, utime })
        })
        .await
    }

    pub async fn get_shards(&self, seqno: i32) -> Result<Value, GatewayError> {
        let key = CacheKey::new("get_shards", &seqno.to_string());
        self.cached_by_recency(
            key,
            TTL_BLOCK_LOOKUP,
            seqno as i64,
            || self.dispatcher.dispatch_any(LiteMethod::GetShards { seqno }),
            || self.dispatcher.dispatch_archival_preferred(LiteMethod::GetShards { seqno }),
        )
        .await
    }

    pub async fn get_block_header(&self, block: BlockIdExt) -> Result<Value, GatewayError> {
        let target = block.seqno as i64;
        let key = CacheKey::new("get_block_header", &format!("{block:?}"));
        self.cached_by_recency(
            key,
            TTL_BLOCK_LOOKUP,
            target,
            || self.dispatcher.dispatch_any(LiteMethod::GetBlockHeader { block: block.clone() }),
            || self.dispatcher.dispatch_archival_preferred(LiteMethod::GetBlockHeader { block: block.clone() }),
        )
        .await
    }

    pub async fn raw_get_block_transactions(
        &self,
        block: BlockIdExt,
        count: i32,
        after_lt: Option<i64>,
    ) -> Result<Value, GatewayError> {
        let key = CacheKey::new("raw_get_block_transactions", &format!("{block:?}:{count}:{after_lt:?}"));
        self.cached(key, TTL_BLOCK_LOOKUP, || {
            self.dispatcher
                .dispatch_archival_preferred(LiteMethod::RawGetBlockTransactions { block, count, after_lt })
        })
        .await
    }

    pub async fn get_block_transactions(
        &self,
        block: BlockIdExt,
        count: i32,
        after_lt: Option<i64>,
        extended: bool,
    ) -> Result<Value, GatewayError> {
        let key = CacheKey::new("get_block_transactions", &format!("{block:?}:{count}:{after_lt:?}:{extended}"));
        self.cached(key, TTL_BLOCK_LOOKUP, || {
            let method = if extended {
                LiteMethod::GetBlockTransactionsExt { block, count, after_lt }
            } else {
                LiteMethod::GetBlockTransactions { block, count, after_lt }
            };
            self.dispatcher.dispatch_archival_preferred(method)
        })
        .await
    }

    pub async fn get_config_param(&self, param: i32, seqno: Option<i32>) -> Result<Value, GatewayError> {
        let target = seqno.map(|s| s as i64).unwrap_or_else(|| self.consensus.current());
        let key = CacheKey::new("get_config_param", &format!("{param}:{seqno:?}"));
        self.cached_by_recency(
            key,
            TTL_ACCOUNT_STATE,
            target,
            || self.dispatcher.dispatch_any(LiteMethod::GetConfigParam { param, seqno }),
            || self.dispatcher.dispatch_archival_preferred(LiteMethod::GetConfigParam { param, seqno }),
        )
        .await
    }

    pub async fn get_token_data(&self, address: &str) -> Result<Value, GatewayError> {
        let key = CacheKey::new("get_token_data", address);
        self.cached(key, TTL_TOKEN_DATA, || {
            self.dispatcher.dispatch_any(LiteMethod::GetTokenData { address: address.to_string() })
        })
        .await
    }

    pub async fn try_locate_tx_by_incoming_message(
        &self,
        source: &str,
        destination: &str,
        created_lt: i64,
    ) -> Result<Value, GatewayError> {
        let key = CacheKey::new("try_locate_tx_by_incoming_message", &format!("{source}:{destination}:{created_lt}"));
        self.cached(key, TTL_LOCATE_TX, || {
            self.dispatcher.dispatch_archival_preferred(LiteMethod::TryLocateTxByIncomingMessage {
                source: source.to_string(),
                destination: destination.to_string(),
                created_lt,
            })
        })
        .await
    }

    pub async fn try_locate_tx_by_outcoming_message(
        &self,
        source: &str,
        destination: &str,
        created_lt: i64,
    ) -> Result<Value, GatewayError> {
        let key = CacheKey::new("try_locate_tx_by_outcoming_message", &format!("{source}:{destination}:{created_lt}"));
        self.cached(key, TTL_LOCATE_TX, || {
            self.dispatcher.dispatch_archival_preferred(LiteMethod::TryLocateTxByOutcomingMessage {
                source: source.to_string(),
                destination: destination.to_string(),
                created_lt,
            })
        })
        .await
    }

    /// Never cached: mutates network state. Fanned out to several workers
    /// at once to maximize the odds the message actually propagates.
    pub async fn raw_send_message(&self, boc: &str) -> Result<Value, GatewayError> {
        let (value, _worker_info) = self
            .dispatcher
            .dispatch_fanout(LiteMethod::RawSendMessage { boc: boc.to_string() }, SEND_MESSAGE_FANOUT)
            .await?;
        Ok(value)
    }

    pub async fn raw_send_message_return_hash(&self, boc: &str) -> Result<Value, GatewayError> {
        let (value, _worker_info) = self
            .dispatcher
            .dispatch_fanout(LiteMethod::RawSendMessageReturnHash { boc: boc.to_string() }, SEND_MESSAGE_FANOUT)
            .await?;
        Ok(value)
    }

    pub async fn raw_create_and_send_query(
        &self,
        destination: &str,
        body: &str,
        init_code: Option<String>,
        init_data: Option<String>,
    ) -> Result<Value, GatewayError> {
        let (value, _worker_info) = self
            .dispatcher
            .dispatch_any(LiteMethod::RawCreateAndSendQuery {
                destination: destination.to_string(),
                body: body.to_string(),
                init_code,
                init_data,
            })
            .await?;
        Ok(value)
    }

    pub async fn raw_create_and_send_message(
        &self,
        destination: &str,
        body: &str,
        init_state: Option<String>,
    ) -> Result<Value, GatewayError> {
        let (value, _worker_info) = self
            .dispatcher
            .dispatch_any(LiteMethod::RawCreateAndSendMessage {
                destination: destination.to_string(),
                body: body.to_string(),
                init_state,
            })
            .await?;
        Ok(value)
    }

    async fn cached<F, Fut>(&self, key: CacheKey, ttl: Duration, dispatch: F) -> Result<Value, GatewayError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = DispatchResult>,
    {
        if let Some(value) = self.cache.get(&key).await {
            return Ok(value);
        }
        let (value, _worker_info) = dispatch().await?;
        self.cache.put(key, value.clone(), ttl).await;
        Ok(value)
    }

    /// Same as `cached`, but picks between an "any working" and an
    /// "archival preferred" dispatch based on how far `target_seqno` is
    /// from the current consensus height.
    async fn cached_by_recency<FAny, FutAny, FArchival, FutArchival>(
        &self,
        key: CacheKey,
        ttl: Duration,
        target_seqno: i64,
        dispatch_any: FAny,
        dispatch_archival: FArchival,
    ) -> Result<Value, GatewayError>
    where
        FAny: FnOnce() -> FutAny,
        FutAny: std::future::Future<Output = DispatchResult>,
        FArchival: FnOnce() -> FutArchival,
        FutArchival: std::future::Future<Output = DispatchResult>,
    {
        if let Some(value) = self.cache.get(&key).await {
            return Ok(value);
        }
        let recent = (self.consensus.current() - target_seqno).abs() <= RECENCY_WINDOW;
        let (value, _worker_info) = if recent { dispatch_any().await? } else { dispatch_archival().await? };
        self.cache.put(key, value.clone(), ttl).await;
        Ok(value)
    }
}
