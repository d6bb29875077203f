//! Owns the fixed set of worker slots: spawning, restarting on death, and
//! quarantining a slot that keeps dying. One slot corresponds to one
//! upstream liteserver for the lifetime of the process; only the worker
//! occupying it comes and goes.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::{DateTime, Utc};
use gateway_common::config::SupervisorConfig;
use gateway_common::error::GatewayError;
use gateway_common::model::{LiteserverConfig, WorkerInfo};
use gateway_liteclient::LiteClient;
use gateway_worker::{Task, TaskResult, WorkerEvent, WorkerHandle};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Builds the native capability for a given liteserver entry. Boxed so the
/// manager can hand the supervisor a closure over its keystore/timeout
/// config without the supervisor knowing about them.
pub type ClientFactory = Arc<dyn Fn(&LiteserverConfig) -> Arc<dyn LiteClient> + Send + Sync>;

struct Slot {
    liteserver: LiteserverConfig,
    handle: Option<WorkerHandle>,
    forwarder: Option<JoinHandle<()>>,
    info: WorkerInfo,
    restart_times: Vec<Instant>,
    quarantine_until: Option<Instant>,
}

pub struct Supervisor {
    slots: Vec<Mutex<Slot>>,
    config: SupervisorConfig,
    factory: ClientFactory,
    queue_capacity: usize,
    event_tx: mpsc::UnboundedSender<(usize, WorkerEvent)>,
}

impl Supervisor {
    /// Spawns one worker per liteserver entry and returns the supervisor
    /// alongside the merged event stream every worker publishes onto,
    /// tagged with its slot index.
    pub fn start(
        liteservers: Vec<LiteserverConfig>,
        factory: ClientFactory,
        queue_capacity: usize,
        config: SupervisorConfig,
    ) -> (Arc<Supervisor>, mpsc::UnboundedReceiver<(usize, WorkerEvent)>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let mut slots = Vec::with_capacity(liteservers.len());
        for liteserver in &liteservers {
            slots.push(Mutex::new(Slot {
                liteserver: liteserver.clone(),
                handle: None,
                forwarder: None,
                info: WorkerInfo::new_unknown(liteserver.index),
                restart_times: Vec::new(),
                quarantine_until: None,
            }));
        }
        let supervisor = Arc::new(Supervisor { slots, config, factory, queue_capacity, event_tx });
        for liteserver in &liteservers {
            let supervisor = supervisor.clone();
            let index = liteserver.index;
            tokio::spawn(async move { supervisor.spawn_worker(index).await });
        }
        (supervisor, event_rx)
    }

    pub fn worker_count(&self) -> usize {
        self.slots.len()
    }

    pub fn snapshot(&self, index: usize) -> Option<WorkerInfo> {
        self.slots.get(index).map(|slot| slot.lock().unwrap().info.clone())
    }

    pub fn all_snapshots(&self) -> Vec<WorkerInfo> {
        self.slots.iter().map(|slot| slot.lock().unwrap().info.clone()).collect()
    }

    pub fn try_submit(&self, index: usize, task: Task) -> Result<(), GatewayError> {
        let slot = self.slots.get(index).ok_or(GatewayError::Fatal { index })?;
        let slot = slot.lock().unwrap();
        if slot.quarantine_until.is_some() {
            return Err(GatewayError::Fatal { index });
        }
        slot.handle.as_ref().ok_or(GatewayError::Fatal { index })?.try_submit(task)
    }

    pub fn set_is_working(&self, index: usize, working: bool) {
        if let Some(slot) = self.slots.get(index) {
            slot.lock().unwrap().info.is_working = working;
        }
    }

    pub fn record_last_block(&self, index: usize, seqno: i64) {
        if let Some(slot) = self.slots.get(index) {
            slot.lock().unwrap().info.last_block = seqno;
        }
    }

    pub fn record_archival(&self, index: usize, archival: bool) {
        if let Some(slot) = self.slots.get(index) {
            slot.lock().unwrap().info.is_archival = archival;
        }
    }

    pub fn record_task_result(&self, index: usize, result: &TaskResult) {
        if let Some(slot) = self.slots.get(index) {
            let mut slot = slot.lock().unwrap();
            slot.info.last_block = result.worker_info.last_block;
            slot.info.is_archival = result.worker_info.is_archival;
            slot.info.tasks_count = result.worker_info.tasks_count;
        }
    }

    /// Tears the dead worker's handle down, books the restart against the
    /// slot's sliding window, and either respawns it or quarantines the
    /// slot if it has died too many times too quickly.
    pub async fn handle_dead(self: &Arc<Self>, index: usize, reason: &str) {
        warn!(worker = index, reason, "worker reported itself dead");
        self.teardown_slot(index).await;

        let now = Instant::now();
        let should_quarantine = {
            let mut slot = self.slots[index].lock().unwrap();
            slot.restart_times.retain(|&t| now.duration_since(t) < self.config.restart_window);
            slot.restart_times.push(now);
            slot.info.restart_count += 1;
            slot.restart_times.len() as u32 >= self.config.restart_threshold
        };

        if should_quarantine {
            let until = now + self.config.quarantine;
            let mut slot = self.slots[index].lock().unwrap();
            slot.quarantine_until = Some(until);
            slot.info.quarantine_until = Some(instant_to_datetime(until));
            slot.info.is_enabled = false;
            error!(worker = index, "quarantined after repeated restarts");
            return;
        }

        self.spawn_worker(index).await;
    }

    /// Re-enables and respawns any slot whose quarantine window has
    /// elapsed. Meant to be polled at a low frequency by the manager.
    pub async fn check_liveness(self: &Arc<Self>) {
        let now = Instant::now();
        let mut to_respawn = Vec::new();
        for (index, slot) in self.slots.iter().enumerate() {
            let mut slot = slot.lock().unwrap();
            if let Some(until) = slot.quarantine_until {
                if now >= until {
                    slot.quarantine_until = None;
                    slot.info.quarantine_until = None;
                    slot.info.is_enabled = true;
                    slot.restart_times.clear();
                    to_respawn.push(index);
                }
            }
        }
        for index in to_respawn {
            info!(worker = index, "quarantine expired, restarting worker");
            self.spawn_worker(index).await;
        }
    }

    pub async fn shutdown(&self) {
        for index in 0..self.slots.len() {
            self.teardown_slot(index).await;
        }
    }

    async fn teardown_slot(&self, index: usize) {
        let (handle, forwarder) = {
            let mut slot = self.slots[index].lock().unwrap();
            (slot.handle.take(), slot.forwarder.take())
        };
        if let Some(forwarder) = forwarder {
            forwarder.abort();
        }
        if let Some(handle) = handle {
            handle.shutdown().await;
        }
    }

    async fn spawn_worker(self: &Arc<Self>, index: usize) {
        let liteserver = self.slots[index].lock().unwrap().liteserver.clone();
        let client = (self.factory)(&liteserver);
        let (handle, mut event_rx) = WorkerHandle::spawn(index, client, self.queue_capacity);
        let event_tx = self.event_tx.clone();
        let forwarder = tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                if event_tx.send((index, event)).is_err() {
                    return;
                }
            }
        });
        let mut slot = self.slots[index].lock().unwrap();
        slot.handle = Some(handle);
        slot.forwarder = Some(forwarder);
    }
}

fn instant_to_datetime(instant: Instant) -> DateTime<Utc> {
    let now_instant = Instant::now();
    let now_dt = Utc::now();
    if instant >= now_instant {
        now_dt + chrono::Duration::from_std(instant - now_instant).unwrap_or_default()
    } else {
        now_dt - chrono::Duration::from_std(now_instant - instant).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_liteclient::StubLiteClient;
    use std::time::Duration;

    fn test_liteservers(n: usize) -> Vec<LiteserverConfig> {
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

    fn permissive_config() -> SupervisorConfig {
        SupervisorConfig {
            restart_threshold: 3,
            restart_window: Duration::from_secs(600),
            quarantine: Duration::from_secs(600),
        }
    }

    #[test_r::test]
    #[tokio::test]
    async fn spawned_slots_eventually_report_their_seeded_block() {
        let factory: ClientFactory = Arc::new(|_ls| Arc::new(StubLiteClient::new(7, false)));
        let (supervisor, mut events) = Supervisor::start(test_liteservers(2), factory, 8, permissive_config());

        let mut seen = [false; 2];
        for _ in 0..10 {
            if seen.iter().all(|s| *s) {
                break;
            }
            if let Ok(Some((index, WorkerEvent::LastBlockUpdate(seqno)))) =
                tokio::time::timeout(Duration::from_millis(500), events.recv()).await
            {
                if seqno == 7 {
                    seen[index] = true;
                }
            }
        }
        assert!(seen.iter().all(|s| *s));
        supervisor.shutdown().await;
    }

    #[test_r::test]
    #[tokio::test]
    async fn repeated_deaths_quarantine_the_slot() {
        let factory: ClientFactory =
            Arc::new(|_ls| Arc::new(StubLiteClient::new(0, false).fail("get_masterchain_info")));
        let config = SupervisorConfig {
            restart_threshold: 2,
            restart_window: Duration::from_secs(600),
            quarantine: Duration::from_secs(600),
        };
        let (supervisor, mut events) = Supervisor::start(test_liteservers(1), factory, 8, config);

        // Drain two DeadReport events and act on them as the manager's event
        // loop would.
        for _ in 0..2 {
            let (index, event) = tokio::time::timeout(Duration::from_secs(1), events.recv())
                .await
                .unwrap()
                .unwrap();
            if let WorkerEvent::DeadReport { reason } = event {
                supervisor.handle_dead(index, &reason).await;
            }
        }

        let info = supervisor.snapshot(0).unwrap();
        assert!(info.quarantine_until.is_some());
        assert!(!info.is_enabled);
        supervisor.shutdown().await;
    }
}
