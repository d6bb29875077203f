use std::time::{Duration, Instant};

use gateway_common::error::GatewayError;
use gateway_common::model::{TaskId, WorkerInfo};
use gateway_liteclient::LiteMethod;
use serde_json::Value;

/// One outstanding request to a worker, already resolved to a concrete
/// `LiteMethod` by the dispatcher — the worker never parses a method name.
#[derive(Debug)]
pub struct Task {
    pub task_id: TaskId,
    pub deadline: Instant,
    pub method: LiteMethod,
}

/// Outcome of a task, as published by the worker on the event stream. The
/// `worker_info` snapshot only carries the fields the worker itself knows
/// (`last_block`, `is_archival`, `tasks_count`); the manager fills in
/// `is_working`/`restart_count`/`quarantine_until` before handing the
/// snapshot to a caller.
#[derive(Debug)]
pub struct TaskResult {
    pub task_id: TaskId,
    pub method_name: &'static str,
    pub elapsed: Duration,
    pub outcome: Result<Value, GatewayError>,
    pub worker_info: WorkerInfo,
}

/// Messages flowing on the worker -> manager event stream.
#[derive(Debug)]
pub enum WorkerEvent {
    TaskResult(TaskResult),
    LastBlockUpdate(i64),
    ArchivalUpdate(bool),
    DeadReport { reason: String },
}
