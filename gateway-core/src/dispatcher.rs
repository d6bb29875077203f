//! Picks which worker slot serves a given call, enforces the per-call
//! deadline, and resolves a worker's asynchronous `TaskResult` back to the
//! caller awaiting it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use gateway_common::error::GatewayError;
use gateway_common::model::{TaskId, WorkerInfo};
use gateway_liteclient::LiteMethod;
use gateway_worker::{Task, TaskResult};
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::warn;

use crate::supervisor::Supervisor;

/// One verb's answer, paired with the worker that produced it so callers
/// can report which slot served a request.
pub type DispatchResult = Result<(Value, WorkerInfo), GatewayError>;

pub struct Dispatcher {
    supervisor: Arc<Supervisor>,
    pending: DashMap<TaskId, oneshot::Sender<TaskResult>>,
    request_timeout: Duration,
}

impl Dispatcher {
    pub fn new(supervisor: Arc<Supervisor>, request_timeout: Duration) -> Arc<Self> {
        Arc::new(Dispatcher { supervisor, pending: DashMap::new(), request_timeout })
    }

    /// Called by the manager's event loop when a worker publishes a
    /// `TaskResult`. Delivers it to whichever `dispatch_*` call is awaiting
    /// that task id, if any (the caller may already have timed out and
    /// stopped waiting).
    pub fn resolve(&self, result: TaskResult) {
        if let Some((_, tx)) = self.pending.remove(&result.task_id) {
            let _ = tx.send(result);
        }
    }

    /// Picks any enabled, caught-up worker at random.
    pub fn select_any_working(&self) -> Option<usize> {
        let candidates: Vec<usize> = self
            .supervisor
            .all_snapshots()
            .into_iter()
            .filter(|w| w.is_enabled && w.is_working)
            .map(|w| w.index)
            .collect();
        pick_one(&candidates)
    }

    /// Prefers an archival-capable worker; falls back to any working worker
    /// if none are archival.
    pub fn select_archival_preferred(&self) -> Option<usize> {
        let snapshots = self.supervisor.all_snapshots();
        let archival: Vec<usize> = snapshots
            .iter()
            .filter(|w| w.is_enabled && w.is_working && w.is_archival)
            .map(|w| w.index)
            .collect();
        if let Some(index) = pick_one(&archival) {
            return Some(index);
        }
        self.select_any_working()
    }

    /// Dispatches to a specific slot, bypassing selection. Used when a
    /// caller needs repeat calls pinned to the same worker (e.g. paginating
    /// `get_transactions` against a consistent view).
    pub async fn dispatch_sticky(&self, index: usize, method: LiteMethod) -> DispatchResult {
        self.dispatch_to_index(index, method).await
    }

    /// Dispatches to any working worker. Single-shot: per spec.md's error
    /// handling design, only the account-state/run-method verbs get a
    /// local-recovery retry (`dispatch_any_then_archival`); every other
    /// verb surfaces its error unchanged.
    pub async fn dispatch_any(&self, method: LiteMethod) -> DispatchResult {
        let index = self.select_any_working().ok_or(GatewayError::NoWorkerAvailable)?;
        self.dispatch_to_index(index, method).await
    }

    /// Dispatches preferring an archival worker. Single-shot, same rationale
    /// as `dispatch_any`.
    pub async fn dispatch_archival_preferred(&self, method: LiteMethod) -> DispatchResult {
        let index = self.select_archival_preferred().ok_or(GatewayError::NoWorkerAvailable)?;
        self.dispatch_to_index(index, method).await
    }

    /// Fans a mutating call out to up to `n` distinct working workers and
    /// races them, returning as soon as one succeeds. Every candidate's task
    /// is submitted up front so they genuinely run concurrently; once a
    /// winner is found (or the deadline elapses), every candidate still
    /// outstanding is dropped from the pending registry before returning, so
    /// none of the losing requests is left occupying a registry slot.
    pub async fn dispatch_fanout(&self, method: LiteMethod, n: usize) -> DispatchResult {
        let mut candidates: Vec<usize> = self
            .supervisor
            .all_snapshots()
            .into_iter()
            .filter(|w| w.is_enabled && w.is_working)
            .map(|w| w.index)
            .collect();
        if candidates.is_empty() {
            return Err(GatewayError::NoWorkerAvailable);
        }
        candidates.truncate(n.max(1));

        let deadline = Instant::now() + self.request_timeout;
        let mut task_ids = Vec::with_capacity(candidates.len());
        let mut receivers = FuturesUnordered::new();
        let mut last_err = GatewayError::NoWorkerAvailable;

        for index in candidates {
            let task_id = TaskId::new();
            let (tx, rx) = oneshot::channel();
            self.pending.insert(task_id, tx);
            let task = Task { task_id, deadline, method: method.clone() };
            match self.supervisor.try_submit(index, task) {
                Ok(()) => {
                    task_ids.push(task_id);
                    receivers.push(async move { rx.await });
                }
                Err(err) => {
                    self.pending.remove(&task_id);
                    last_err = err;
                }
            }
        }

        let winner = if receivers.is_empty() {
            None
        } else {
            match tokio::time::timeout(self.request_timeout, async {
                loop {
                    match receivers.next().await {
                        Some(Ok(result)) => match result.outcome {
                            Ok(value) => break Some((value, result.worker_info)),
                            Err(err) => last_err = err,
                        },
                        Some(Err(_)) => {}
                        None => break None,
                    }
                }
            })
            .await
            {
                Ok(won) => won,
                Err(_) => {
                    last_err = GatewayError::Timeout;
                    None
                }
            }
        };

        for task_id in task_ids {
            self.pending.remove(&task_id);
        }

        winner.map(Ok).unwrap_or(Err(last_err))
    }

    /// Local-recovery fallback used by account-state and run-method verbs:
    /// a single retry on an archival worker (rather than just any other
    /// working worker) when the first attempt fails retriably.
    pub async fn dispatch_any_then_archival(&self, method: LiteMethod) -> DispatchResult {
        let first = self.select_any_working().ok_or(GatewayError::NoWorkerAvailable)?;
        let result = self.dispatch_to_index(first, method.clone()).await;
        let needs_fallback = matches!(&result, Err(err) if err.is_retriable());
        if !needs_fallback {
            return result;
        }
        match self.select_archival_preferred() {
            Some(index) if index != first => {
                warn!(first, retry = index, "falling back to an archival worker");
                self.dispatch_to_index(index, method).await
            }
            _ => result,
        }
    }

    async fn dispatch_to_index(&self, index: usize, method: LiteMethod) -> DispatchResult {
        let task_id = TaskId::new();
        let (tx, rx) = oneshot::channel();
        self.pending.insert(task_id, tx);

        let task = Task { task_id, deadline: Instant::now() + self.request_timeout, method };
        if let Err(err) = self.supervisor.try_submit(index, task) {
            self.pending.remove(&task_id);
            return Err(err);
        }

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(result)) => result.outcome.map(|value| (value, result.worker_info)),
            Ok(Err(_)) => Err(GatewayError::Fatal { index }),
            Err(_) => {
                self.pending.remove(&task_id);
                Err(GatewayError::Timeout)
            }
        }
    }
}

fn pick_one(candidates: &[usize]) -> Option<usize> {
    if candidates.is_empty() {
        return None;
    }
    let offset = (rand::random::<u64>() as usize) % candidates.len();
    Some(candidates[offset])
}

#[cfg(test)]
impl Dispatcher {
    fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_common::config::SupervisorConfig;
    use gateway_common::model::LiteserverConfig;
    use gateway_liteclient::StubLiteClient;
    use std::time::Duration;

    fn liteservers(n: usize) -> Vec<LiteserverConfig> {
        (0..n)
            .map(|index| LiteserverConfig {
                index,
                address: "127.0.0.1".to_string(),
                port: 4000 + index as u16,
                archival_hint: false,
                parallel_requests: 10,
            })
            .collect()
    }

    fn supervisor_config() -> SupervisorConfig {
        SupervisorConfig {
            restart_threshold: 3,
            restart_window: Duration::from_secs(600),
            quarantine: Duration::from_secs(600),
        }
    }

    async fn spawn_ready_supervisor(n: usize) -> (Arc<Supervisor>, tokio::sync::mpsc::UnboundedReceiver<(usize, gateway_worker::WorkerEvent)>) {
        let factory: crate::supervisor::ClientFactory = Arc::new(|_ls| Arc::new(StubLiteClient::new(100, false)));
        let (supervisor, events) = Supervisor::start(liteservers(n), factory, 8, supervisor_config());
        // Let init complete and mark every slot as caught-up, mirroring what
        // the consensus ticker would normally do.
        tokio::time::sleep(Duration::from_millis(50)).await;
        for index in 0..n {
            supervisor.record_last_block(index, 100);
            supervisor.set_is_working(index, true);
        }
        (supervisor, events)
    }

    #[test_r::test]
    #[tokio::test]
    async fn dispatch_any_resolves_via_the_event_loop() {
        let (supervisor, mut events) = spawn_ready_supervisor(2).await;
        let dispatcher = Dispatcher::new(supervisor.clone(), Duration::from_secs(5));

        let relay = tokio::spawn({
            let dispatcher = dispatcher.clone();
            async move {
                while let Some((index, event)) = events.recv().await {
                    if let gateway_worker::WorkerEvent::TaskResult(result) = event {
                        supervisor.record_task_result(index, &result);
                        dispatcher.resolve(result);
                    }
                }
            }
        });

        let (value, worker_info) = dispatcher.dispatch_any(LiteMethod::GetMasterchainInfo).await.unwrap();
        assert!(value.is_object());
        assert!(worker_info.index < 2);
        relay.abort();
    }

    #[test_r::test]
    #[tokio::test]
    async fn no_worker_available_when_nothing_is_working() {
        let factory: crate::supervisor::ClientFactory = Arc::new(|_ls| Arc::new(StubLiteClient::new(-1, false)));
        let (supervisor, _events) = Supervisor::start(liteservers(1), factory, 8, supervisor_config());
        let dispatcher = Dispatcher::new(supervisor, Duration::from_secs(1));
        let result = dispatcher.dispatch_any(LiteMethod::GetMasterchainInfo).await;
        assert!(matches!(result, Err(GatewayError::NoWorkerAvailable)));
    }

    fn relay_events(
        dispatcher: Arc<Dispatcher>,
        supervisor: Arc<Supervisor>,
        mut events: tokio::sync::mpsc::UnboundedReceiver<(usize, gateway_worker::WorkerEvent)>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            while let Some((index, event)) = events.recv().await {
                if let gateway_worker::WorkerEvent::TaskResult(result) = event {
                    supervisor.record_task_result(index, &result);
                    dispatcher.resolve(result);
                }
            }
        })
    }

    #[test_r::test]
    #[tokio::test]
    async fn fan_out_races_candidates_and_clears_losers_from_the_registry() {
        let factory: crate::supervisor::ClientFactory = Arc::new(|ls| {
            let delay = if ls.index == 0 { Duration::from_millis(20) } else { Duration::from_millis(400) };
            Arc::new(StubLiteClient::new(100, false).with_delay("raw_send_message", delay))
        });
        let (supervisor, events) = Supervisor::start(liteservers(4), factory, 8, supervisor_config());
        tokio::time::sleep(Duration::from_millis(50)).await;
        for index in 0..4 {
            supervisor.record_last_block(index, 100);
            supervisor.set_is_working(index, true);
        }

        let dispatcher = Dispatcher::new(supervisor.clone(), Duration::from_secs(5));
        let relay = relay_events(dispatcher.clone(), supervisor, events);

        let started = Instant::now();
        let (value, _worker_info) = dispatcher
            .dispatch_fanout(LiteMethod::RawSendMessage { boc: "boc".to_string() }, 4)
            .await
            .unwrap();
        let elapsed = started.elapsed();

        assert_eq!(value["sent"], true);
        assert!(elapsed < Duration::from_millis(200), "fan-out took {elapsed:?}, expected it to return once the fastest candidate won");
        assert_eq!(dispatcher.pending_len(), 0, "losing candidates must be cleared from the registry before the call returns");

        relay.abort();
    }

    #[test_r::test]
    #[tokio::test]
    async fn dispatch_archival_preferred_does_not_retry_onto_a_non_archival_worker() {
        let factory: crate::supervisor::ClientFactory = Arc::new(|ls| {
            let client = StubLiteClient::new(100, ls.index == 0);
            if ls.index == 0 {
                Arc::new(client.fail("get_block_header"))
            } else {
                Arc::new(client)
            }
        });
        let (supervisor, events) = Supervisor::start(liteservers(2), factory, 8, supervisor_config());
        tokio::time::sleep(Duration::from_millis(50)).await;
        for index in 0..2 {
            supervisor.record_last_block(index, 100);
            supervisor.set_is_working(index, true);
        }
        supervisor.record_archival(0, true);

        let dispatcher = Dispatcher::new(supervisor.clone(), Duration::from_secs(5));
        let relay = relay_events(dispatcher.clone(), supervisor, events);

        let block = gateway_liteclient::model::BlockIdExt {
            workchain: -1,
            shard: -9_223_372_036_854_775_808,
            seqno: 1,
            root_hash: "root_hash".to_string(),
            file_hash: "file_hash".to_string(),
        };
        let result = dispatcher.dispatch_archival_preferred(LiteMethod::GetBlockHeader { block }).await;
        assert!(
            matches!(result, Err(GatewayError::UpstreamError(_))),
            "archival-preferred dispatch must surface the error unchanged rather than falling back to a non-archival worker, got {result:?}"
        );

        relay.abort();
    }
}
