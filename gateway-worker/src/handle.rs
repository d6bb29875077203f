use std::sync::Arc;
use std::time::Instant;

use gateway_common::error::GatewayError;
use gateway_common::model::WorkerInfo;
use gateway_liteclient::LiteClient;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::model::{Task, TaskResult, WorkerEvent};
use crate::probes::{ARCHIVAL_PROBE_INTERVAL, LAST_BLOCK_PROBE_INTERVAL, MAX_CONSECUTIVE_FAILURES};

/// The manager's handle to one running worker. Owns the sending half of the
/// task queue and the means to tear the worker down; never touches the
/// native capability directly.
pub struct WorkerHandle {
    pub index: usize,
    task_tx: mpsc::Sender<Task>,
    cancel: CancellationToken,
    join_handle: JoinHandle<()>,
}

impl WorkerHandle {
    /// Spawns a worker owning `client` onto its own `tokio` task and
    /// returns a handle plus the event stream it will publish on.
    pub fn spawn(
        index: usize,
        client: Arc<dyn LiteClient>,
        queue_capacity: usize,
    ) -> (Self, mpsc::UnboundedReceiver<WorkerEvent>) {
        let (task_tx, task_rx) = mpsc::channel(queue_capacity.max(1));
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let join_handle = tokio::spawn(run_worker(index, client, task_rx, event_tx, cancel.clone()));
        (
            WorkerHandle { index, task_tx, cancel, join_handle },
            event_rx,
        )
    }

    /// Enqueues a task without blocking. A full queue is surfaced as
    /// `Overloaded` rather than backing up the HTTP hot path.
    pub fn try_submit(&self, task: Task) -> Result<(), GatewayError> {
        self.task_tx.try_send(task).map_err(|_| GatewayError::Overloaded)
    }

    /// Requests orderly shutdown: cancels the worker's loops, drops the
    /// sending half of the task queue so no further tasks can arrive, and
    /// awaits the worker's own task to completion.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        drop(self.task_tx);
        let _ = self.join_handle.await;
    }
}

fn partial_snapshot(index: usize, last_block: i64, is_archival: bool, tasks_count: u64) -> WorkerInfo {
    WorkerInfo {
        index,
        last_block,
        is_archival,
        is_working: false,
        is_enabled: true,
        restart_count: 0,
        quarantine_until: None,
        tasks_count,
    }
}

async fn run_worker(
    index: usize,
    client: Arc<dyn LiteClient>,
    mut task_rx: mpsc::Receiver<Task>,
    event_tx: mpsc::UnboundedSender<WorkerEvent>,
    cancel: CancellationToken,
) {
    let mut last_block: i64 = -1;
    let mut is_archival = false;
    let mut tasks_count: u64 = 0;

    // Capability init + sync step: a worker that cannot reach its upstream
    // at all never enters the running state.
    match client.get_masterchain_info().await {
        Ok(info) => last_block = info.last.seqno as i64,
        Err(err) => {
            warn!(worker = index, error = %err, "worker init failed");
            let _ = event_tx.send(WorkerEvent::DeadReport {
                reason: format!("init failed: {err}"),
            });
            return;
        }
    }
    let _ = event_tx.send(WorkerEvent::LastBlockUpdate(last_block));

    let mut consecutive_failures: u32 = 0;
    let mut last_block_interval = tokio::time::interval(LAST_BLOCK_PROBE_INTERVAL);
    let mut archival_interval = tokio::time::interval(ARCHIVAL_PROBE_INTERVAL);
    last_block_interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!(worker = index, "worker shutting down");
                return;
            }
            _ = last_block_interval.tick() => {
                match client.get_masterchain_info().await {
                    Ok(info) => {
                        last_block = info.last.seqno as i64;
                        consecutive_failures = 0;
                    }
                    Err(_) => {
                        consecutive_failures += 1;
                    }
                }
                let _ = event_tx.send(WorkerEvent::LastBlockUpdate(last_block));
                if consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                    warn!(worker = index, "worker declaring itself dead after repeated probe failures");
                    let _ = event_tx.send(WorkerEvent::DeadReport {
                        reason: format!("{consecutive_failures} consecutive last-block probe failures"),
                    });
                    return;
                }
            }
            _ = archival_interval.tick() => {
                if let Ok(archival) = client.probe_archival().await {
                    is_archival = archival;
                }
                let _ = event_tx.send(WorkerEvent::ArchivalUpdate(is_archival));
            }
            maybe_task = task_rx.recv() => {
                let Some(task) = maybe_task else {
                    info!(worker = index, "task queue closed, shutting down");
                    return;
                };
                tasks_count += 1;
                let started = Instant::now();
                let method_name = task.method.name();
                let outcome = if Instant::now() > task.deadline {
                    Err(GatewayError::Timeout)
                } else {
                    gateway_liteclient::dispatch(client.as_ref(), &task.method).await
                };
                let result = TaskResult {
                    task_id: task.task_id,
                    method_name,
                    elapsed: started.elapsed(),
                    outcome,
                    worker_info: partial_snapshot(index, last_block, is_archival, tasks_count),
                };
                if event_tx.send(WorkerEvent::TaskResult(result)).is_err() {
                    return;
                }
            }
        }
    }
}
