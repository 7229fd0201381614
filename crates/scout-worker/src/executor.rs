//! Task execution.
//!
//! Each accepted request runs as its own tokio task, registered with the
//! session's [`TaskTracker`] before it starts. The task fetches the target,
//! maps the outcome onto a [`TaskResult`] and submits the encoded result to
//! the [`OutputQueue`].

use std::sync::Arc;

use bytes::Bytes;
use scout_core::{
    CorrelationId, MAX_PAYLOAD_SIZE, Payload, TaskRequest, TaskResult, encode_message,
};
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, warn};

use crate::fetch::{FetchError, Fetcher};
use crate::gate::Admission;
use crate::queue::OutputQueue;

/// Largest body carried in a result. Leaves room for the other result fields
/// inside one payload.
pub const MAX_RESULT_BODY: usize = MAX_PAYLOAD_SIZE - 1024;

/// Spawns task units and delivers their results.
#[derive(Clone)]
pub struct TaskExecutor {
    fetcher: Arc<dyn Fetcher>,
    queue: OutputQueue,
    tracker: TaskTracker,
}

impl TaskExecutor {
    /// Create an executor submitting results to `queue`.
    pub fn new(fetcher: Arc<dyn Fetcher>, queue: OutputQueue, tracker: TaskTracker) -> Self {
        Self {
            fetcher,
            queue,
            tracker,
        }
    }

    /// Start one task unit. The admission slot is released when it finishes.
    pub fn spawn(
        &self,
        correlation_id: CorrelationId,
        request: TaskRequest,
        admission: Admission,
    ) -> JoinHandle<()> {
        let fetcher = Arc::clone(&self.fetcher);
        let queue = self.queue.clone();
        debug!(%correlation_id, url = %request.target_url, "task started");
        self.tracker.spawn(async move {
            let _admission = admission;
            let result = run_task(fetcher.as_ref(), &request.target_url).await;
            let status = result.status;
            if deliver(&queue, correlation_id, &result).await {
                debug!(%correlation_id, ?status, "task result submitted");
            }
        })
    }

    /// Number of task units still running.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }
}

/// Fetch `target_url` and map the outcome onto a result.
///
/// A transport failure means the target could not be accessed; a failure
/// while reading the body means the response could not be read. The HTTP
/// status code does not affect the outcome.
pub async fn run_task(fetcher: &dyn Fetcher, target_url: &str) -> TaskResult {
    match fetcher.fetch(target_url).await {
        Ok(body) if body.len() > MAX_RESULT_BODY => {
            warn!(url = %target_url, len = body.len(), "response body too large to deliver");
            TaskResult::failed_to_read()
        }
        Ok(body) => TaskResult::success(body),
        Err(FetchError::Read(e)) => {
            warn!(url = %target_url, error = %e, "failed to read response body");
            TaskResult::failed_to_read()
        }
        Err(e) => {
            warn!(url = %target_url, error = %e, "failed to access target");
            TaskResult::failed_to_access(target_url)
        }
    }
}

/// Encode `result` under `correlation_id` and submit it.
///
/// Waits while the queue is full. Returns `false` when the writer has
/// already stopped and the result is lost.
pub async fn deliver(
    queue: &OutputQueue,
    correlation_id: CorrelationId,
    result: &TaskResult,
) -> bool {
    let frame = encode_or_abort(correlation_id, result);
    match queue.submit(frame).await {
        Ok(()) => true,
        Err(e) => {
            warn!(%correlation_id, error = %e, "writer stopped, task result lost");
            false
        }
    }
}

/// Encode an outgoing message. Failing to encode our own message is a
/// defect, so the process aborts.
pub(crate) fn encode_or_abort<T: Payload>(correlation_id: CorrelationId, payload: &T) -> Bytes {
    match encode_message(correlation_id, payload) {
        Ok(frame) => frame,
        Err(e) => {
            error!(
                %correlation_id,
                kind = %T::KIND,
                error = %e,
                "failed to encode outgoing message"
            );
            std::process::abort();
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::time::Duration;

    use async_trait::async_trait;
    use scout_core::logging::capture_logs;
    use scout_core::{MessageKind, TaskStatus, decode_envelope};
    use tracing::Level;

    use super::*;
    use crate::gate::AdmissionGate;
    use crate::queue::Outbound;

    /// Fetcher returning canned outcomes keyed by URL prefix.
    struct ScriptedFetcher;

    #[async_trait]
    impl Fetcher for ScriptedFetcher {
        async fn fetch(&self, url: &str) -> Result<Bytes, FetchError> {
            if url.starts_with("down://") {
                Err(FetchError::Access {
                    url: url.to_owned(),
                    message: "connection refused".into(),
                })
            } else if url.starts_with("broken://") {
                Err(FetchError::Read("connection reset".into()))
            } else if url.starts_with("slow://") {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok(Bytes::from(url.to_owned()))
            } else {
                Ok(Bytes::from(format!("body of {url}")))
            }
        }
    }

    fn decode_result(entry: Option<Outbound>) -> (CorrelationId, TaskResult) {
        let Some(Outbound::Frame(frame)) = entry else {
            panic!("expected a frame, got {entry:?}");
        };
        let envelope = decode_envelope(&frame).unwrap();
        assert_eq!(envelope.kind, MessageKind::TaskResult);
        (envelope.correlation_id, envelope.open().unwrap())
    }

    #[tokio::test]
    async fn success_carries_body() {
        let result = run_task(&ScriptedFetcher, "http://a").await;
        assert_eq!(result.status, TaskStatus::Success);
        assert_eq!(result.result, Bytes::from_static(b"body of http://a"));
        assert_eq!(result.description, "OK");
    }

    #[tokio::test]
    async fn access_failure_mentions_url() {
        let (logs, _guard) = capture_logs();
        let result = run_task(&ScriptedFetcher, "down://x").await;
        assert_eq!(result.status, TaskStatus::FailedToAccessTarget);
        assert!(result.result.is_empty());
        assert_eq!(result.description, "Failed to access url: down://x");
        assert!(logs.has_event(Level::WARN, "failed to access target"));
    }

    #[tokio::test]
    async fn read_failure_maps_to_read_status() {
        let result = run_task(&ScriptedFetcher, "broken://x").await;
        assert_eq!(result.status, TaskStatus::FailedToReadResponse);
        assert_eq!(result.description, "Failed to read from http response");
    }

    #[tokio::test]
    async fn access_failure_on_oversized_url_still_encodes() {
        let url = format!("down://{}", "a".repeat(MAX_PAYLOAD_SIZE - 37));
        let result = run_task(&ScriptedFetcher, &url).await;
        assert_eq!(result.status, TaskStatus::FailedToAccessTarget);
        assert!(encode_message(CorrelationId::new(1), &result).is_ok());
    }

    #[tokio::test]
    async fn spawned_task_submits_result_under_request_id() {
        let (queue, mut rx) = OutputQueue::new(4, Duration::from_secs(1));
        let tracker = TaskTracker::new();
        let executor = TaskExecutor::new(Arc::new(ScriptedFetcher), queue, tracker.clone());
        let gate = AdmissionGate::unbounded();

        let _handle = executor.spawn(
            CorrelationId::new(7),
            TaskRequest::new("down://x"),
            gate.admit().await.unwrap(),
        );

        let (id, result) = decode_result(rx.recv().await);
        assert_eq!(id, CorrelationId::new(7));
        assert_eq!(result.status, TaskStatus::FailedToAccessTarget);

        tracker.close();
        tracker.wait().await;
        assert_eq!(executor.in_flight(), 0);
    }

    #[tokio::test]
    async fn concurrent_tasks_each_produce_one_result() {
        let (queue, mut rx) = OutputQueue::new(16, Duration::from_secs(1));
        let tracker = TaskTracker::new();
        let executor = TaskExecutor::new(Arc::new(ScriptedFetcher), queue, tracker.clone());
        let gate = AdmissionGate::new(2);

        for id in 1..=5 {
            let admission = gate.admit().await.unwrap();
            let _handle = executor.spawn(
                CorrelationId::new(id),
                TaskRequest::new(format!("slow://{id}")),
                admission,
            );
        }
        tracker.close();
        tracker.wait().await;

        let mut ids = HashSet::new();
        while let Ok(entry) = rx.try_recv() {
            let (id, result) = decode_result(Some(entry));
            assert_eq!(result.status, TaskStatus::Success);
            assert!(ids.insert(id.get()));
        }
        assert_eq!(ids, (1..=5).collect::<HashSet<i64>>());
    }

    #[tokio::test]
    async fn delivery_after_writer_stopped_is_logged() {
        let (logs, _guard) = capture_logs();
        let (queue, rx) = OutputQueue::new(1, Duration::from_secs(1));
        drop(rx);

        let delivered = deliver(&queue, CorrelationId::new(3), &TaskResult::failed_to_read()).await;
        assert!(!delivered);
        assert!(logs.has_event(Level::WARN, "task result lost"));
    }
}
