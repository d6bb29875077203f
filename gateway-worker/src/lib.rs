pub mod handle;
pub mod model;
pub mod probes;

pub use handle::WorkerHandle;
pub use model::{Task, TaskResult, WorkerEvent};

#[cfg(test)]
test_r::enable!();

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_common::model::TaskId;
    use gateway_liteclient::{LiteMethod, StubLiteClient};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    #[test_r::test]
    #[tokio::test]
    async fn happy_path_reports_last_block_and_serves_task() {
        let client = Arc::new(StubLiteClient::new(12345, false));
        let (handle, mut events) = WorkerHandle::spawn(0, client, 8);

        // init: worker should announce its seeded last-block promptly
        let mut saw_seeded_block = false;
        for _ in 0..5 {
            match tokio::time::timeout(Duration::from_millis(500), events.recv()).await {
                Ok(Some(WorkerEvent::LastBlockUpdate(seqno))) if seqno == 12345 => {
                    saw_seeded_block = true;
                    break;
                }
                Ok(Some(_)) => continue,
                _ => break,
            }
        }
        assert!(saw_seeded_block);

        handle
            .try_submit(Task {
                task_id: TaskId::new(),
                deadline: Instant::now() + Duration::from_secs(5),
                method: LiteMethod::GetMasterchainInfo,
            })
            .unwrap();

        let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .unwrap()
            .unwrap();
        match event {
            WorkerEvent::TaskResult(result) => {
                assert!(result.outcome.is_ok());
                assert_eq!(result.worker_info.last_block, 12345);
            }
            other => panic!("expected a task result, got {other:?}"),
        }

        handle.shutdown().await;
    }

    #[test_r::test]
    #[tokio::test]
    async fn stale_deadline_short_circuits_without_touching_capability() {
        let client = Arc::new(StubLiteClient::new(1, false).fail("raw_get_account_state"));
        let (handle, mut events) = WorkerHandle::spawn(0, client, 8);

        // drain the init LastBlockUpdate event
        let _ = tokio::time::timeout(Duration::from_millis(500), events.recv()).await;

        handle
            .try_submit(Task {
                task_id: TaskId::new(),
                deadline: Instant::now() - Duration::from_secs(1),
                method: LiteMethod::RawGetAccountState { address: "0:00".to_string() },
            })
            .unwrap();

        let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .unwrap()
            .unwrap();
        match event {
            WorkerEvent::TaskResult(result) => {
                assert!(matches!(
                    result.outcome,
                    Err(gateway_common::error::GatewayError::Timeout)
                ));
            }
            other => panic!("expected a task result, got {other:?}"),
        }

        handle.shutdown().await;
    }

    #[test_r::test]
    #[tokio::test]
    async fn init_failure_reports_dead_without_entering_running_state() {
        let client = Arc::new(StubLiteClient::new(0, false).fail("get_masterchain_info"));
        let (handle, mut events) = WorkerHandle::spawn(0, client, 8);

        let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(event, WorkerEvent::DeadReport { .. }));

        handle.shutdown().await;
    }
}
