use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Immutable description of one upstream liteserver, as parsed out of the
/// TON global config document. Never mutated once the worker pool starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiteserverConfig {
    pub index: usize,
    pub address: String,
    pub port: u16,
    /// Hint only: the archival probe is what actually determines
    /// `is_archival` at runtime.
    pub archival_hint: bool,
    pub parallel_requests: u32,
}

/// A read-only snapshot of one worker's state, as seen by the dispatcher.
/// `is_working` is always derived by the consensus tracker, never written
/// independently.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkerInfo {
    pub index: usize,
    pub last_block: i64,
    pub is_archival: bool,
    pub is_working: bool,
    pub is_enabled: bool,
    pub restart_count: u32,
    pub quarantine_until: Option<DateTime<Utc>>,
    pub tasks_count: u64,
}

impl WorkerInfo {
    pub fn new_unknown(index: usize) -> Self {
        WorkerInfo {
            index,
            last_block: -1,
            is_archival: false,
            is_working: false,
            is_enabled: true,
            restart_count: 0,
            quarantine_until: None,
            tasks_count: 0,
        }
    }
}

/// Unique identifier of one in-flight task, realized as a time-ordered UUID
/// so it doubles as a natural sort key for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub Uuid);

impl TaskId {
    pub fn new() -> Self {
        TaskId(Uuid::now_v7())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cluster-derived freshness mark: the height a supermajority of workers
/// agree the network has reached.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConsensusBlock {
    pub seqno: i64,
    pub timestamp_unix_ms: i64,
}

impl ConsensusBlock {
    pub fn genesis() -> Self {
        ConsensusBlock {
            seqno: 0,
            timestamp_unix_ms: 0,
        }
    }
}
