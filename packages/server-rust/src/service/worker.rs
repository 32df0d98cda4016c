//! Request-processing workers with scheduler-owned fault isolation.
//!
//! Each worker drains a bounded mpsc queue of boxed processors. Every
//! execution runs inside [`safe_execute`], which converts a panic into a
//! logged diagnostic: one malformed or buggy request must never take down the
//! worker that serves everyone else's.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures_util::FutureExt;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use super::config::ServerConfig;
use super::processor::RequestProcessor;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from handing a processor to a worker.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("worker queue is full")]
    QueueFull,
    #[error("worker is not running")]
    NotRunning,
}

// ---------------------------------------------------------------------------
// safe_execute
// ---------------------------------------------------------------------------

/// Run one processor inside the fault-isolation boundary.
///
/// A panic in `execute` is caught here, at the scheduler level, and logged
/// with the operation key and peer identity. The faulted request sends no
/// response and records no stats event; that is a latent bug to fix, not an
/// error path to recover.
pub async fn safe_execute(processor: Box<dyn RequestProcessor>) {
    let op = processor.op_key();
    let peer = processor.peer();

    if let Err(panic) = AssertUnwindSafe(processor.execute()).catch_unwind().await {
        let panic_msg = panic
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
            .unwrap_or("<non-string panic payload>")
            .to_string();
        tracing::error!(
            op = %op,
            peer = %peer,
            panic = %panic_msg,
            "request processor panicked, request dropped"
        );
    }
}

// ---------------------------------------------------------------------------
// ProcessorWorker
// ---------------------------------------------------------------------------

/// Single worker: a tokio task draining a bounded processor queue.
///
/// The worker runs each processor via [`safe_execute`] and stops when it is
/// told to shut down or the submission side is dropped. Tasks still queued at
/// shutdown are dropped; in-flight work is the only thing a stop waits for.
pub struct ProcessorWorker {
    tx: Option<mpsc::Sender<Box<dyn RequestProcessor>>>,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl ProcessorWorker {
    /// Start a worker with the given queue capacity.
    #[must_use]
    pub fn start(queue_capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<Box<dyn RequestProcessor>>(queue_capacity.max(1));
        let (shutdown_tx, mut shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    task = rx.recv() => {
                        match task {
                            Some(processor) => safe_execute(processor).await,
                            None => break, // Channel closed.
                        }
                    }
                    _ = &mut shutdown_rx => {
                        break;
                    }
                }
            }
        });

        Self {
            tx: Some(tx),
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    /// Submit a processor, waiting for queue space if necessary.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError::NotRunning`] if the worker has been stopped.
    pub async fn submit(&self, processor: Box<dyn RequestProcessor>) -> Result<(), SubmitError> {
        match &self.tx {
            Some(tx) => tx
                .send(processor)
                .await
                .map_err(|_| SubmitError::NotRunning),
            None => Err(SubmitError::NotRunning),
        }
    }

    /// Submit a processor without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError::QueueFull`] when the queue is at capacity, or
    /// [`SubmitError::NotRunning`] if the worker has been stopped.
    pub fn try_submit(&self, processor: Box<dyn RequestProcessor>) -> Result<(), SubmitError> {
        match &self.tx {
            Some(tx) => tx.try_send(processor).map_err(|err| match err {
                TrySendError::Full(_) => SubmitError::QueueFull,
                TrySendError::Closed(_) => SubmitError::NotRunning,
            }),
            None => Err(SubmitError::NotRunning),
        }
    }

    /// Stop the worker gracefully, waiting for the in-flight task to finish.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

// ---------------------------------------------------------------------------
// WorkerPool
// ---------------------------------------------------------------------------

/// Fixed pool of workers with round-robin submission.
///
/// No task ever waits on another task: each submission lands on exactly one
/// worker's queue and the workers run independently.
pub struct WorkerPool {
    workers: Vec<ProcessorWorker>,
    next: AtomicUsize,
}

impl WorkerPool {
    /// Start `worker_count` workers (at least one), each with its own queue.
    #[must_use]
    pub fn start(worker_count: usize, queue_capacity: usize) -> Self {
        let workers = (0..worker_count.max(1))
            .map(|_| ProcessorWorker::start(queue_capacity))
            .collect();
        Self {
            workers,
            next: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn from_config(config: &ServerConfig) -> Self {
        Self::start(config.worker_count, config.worker_queue_capacity)
    }

    /// Submit a processor to the next worker in round-robin order.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError::NotRunning`] if the chosen worker has stopped.
    pub async fn submit(&self, processor: Box<dyn RequestProcessor>) -> Result<(), SubmitError> {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.workers.len();
        self.workers[index].submit(processor).await
    }

    /// Stop every worker, waiting for in-flight tasks to finish.
    pub async fn stop(&mut self) {
        for worker in &mut self.workers {
            worker.stop().await;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use quill_core::{OpCode, Request, Response, StatusCode};

    use super::*;
    use crate::network::ResponseChannel;
    use crate::service::processor::{ProcessorBase, StorageBackend};
    use crate::service::version::VersionGate;
    use crate::stats::{OpKey, StatsRegistry};

    struct CountingProcessor {
        run_count: Arc<AtomicU32>,
    }

    #[async_trait]
    impl RequestProcessor for CountingProcessor {
        fn op_key(&self) -> OpKey {
            OpKey::AddEntry
        }

        fn peer(&self) -> String {
            "test-peer".to_string()
        }

        async fn execute(self: Box<Self>) {
            self.run_count.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct PanickingProcessor;

    #[async_trait]
    impl RequestProcessor for PanickingProcessor {
        fn op_key(&self) -> OpKey {
            OpKey::AddEntry
        }

        fn peer(&self) -> String {
            "bad-peer".to_string()
        }

        async fn execute(self: Box<Self>) {
            panic!("malformed request tripped a latent bug");
        }
    }

    #[tokio::test]
    async fn worker_runs_submitted_processors() {
        let run_count = Arc::new(AtomicU32::new(0));
        let mut worker = ProcessorWorker::start(16);

        for _ in 0..3 {
            worker
                .submit(Box::new(CountingProcessor {
                    run_count: Arc::clone(&run_count),
                }))
                .await
                .unwrap();
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(run_count.load(Ordering::SeqCst), 3);

        worker.stop().await;
    }

    #[tokio::test]
    async fn panicking_processor_does_not_kill_the_worker() {
        let run_count = Arc::new(AtomicU32::new(0));
        let mut worker = ProcessorWorker::start(16);

        worker.submit(Box::new(PanickingProcessor)).await.unwrap();
        worker
            .submit(Box::new(CountingProcessor {
                run_count: Arc::clone(&run_count),
            }))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        // The worker survived the panic and ran the next task.
        assert_eq!(run_count.load(Ordering::SeqCst), 1);

        worker.stop().await;
    }

    #[tokio::test]
    async fn faulted_task_records_no_stats_event() {
        let stats = Arc::new(StatsRegistry::new(Duration::from_secs(60), 1));
        let mut worker = ProcessorWorker::start(16);

        worker.submit(Box::new(PanickingProcessor)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let snapshot = stats.op_stats(OpKey::AddEntry).snapshot();
        assert_eq!(snapshot.success_count, 0);
        assert_eq!(snapshot.failure_count, 0);

        worker.stop().await;
    }

    #[tokio::test]
    async fn submit_after_stop_returns_not_running() {
        let mut worker = ProcessorWorker::start(4);
        worker.stop().await;

        let result = worker
            .submit(Box::new(CountingProcessor {
                run_count: Arc::new(AtomicU32::new(0)),
            }))
            .await;
        assert!(matches!(result, Err(SubmitError::NotRunning)));
    }

    #[tokio::test]
    async fn try_submit_reports_a_full_queue() {
        // Queue of 1 with a processor that blocks forever keeps the queue full.
        struct BlockedProcessor;

        #[async_trait]
        impl RequestProcessor for BlockedProcessor {
            fn op_key(&self) -> OpKey {
                OpKey::ReadEntry
            }
            fn peer(&self) -> String {
                "slow-peer".to_string()
            }
            async fn execute(self: Box<Self>) {
                std::future::pending::<()>().await;
            }
        }

        let worker = ProcessorWorker::start(1);
        worker.try_submit(Box::new(BlockedProcessor)).unwrap();
        // First task is in flight; fill the single queue slot.
        tokio::time::sleep(Duration::from_millis(20)).await;
        worker.try_submit(Box::new(BlockedProcessor)).unwrap();

        let result = worker.try_submit(Box::new(BlockedProcessor));
        assert!(matches!(result, Err(SubmitError::QueueFull)));
    }

    #[tokio::test]
    async fn pool_spreads_work_across_workers() {
        let run_count = Arc::new(AtomicU32::new(0));
        let mut pool = WorkerPool::start(3, 16);

        for _ in 0..9 {
            pool.submit(Box::new(CountingProcessor {
                run_count: Arc::clone(&run_count),
            }))
            .await
            .unwrap();
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(run_count.load(Ordering::SeqCst), 9);

        pool.stop().await;
    }

    // -----------------------------------------------------------------------
    // End-to-end: decode -> processor -> worker -> response + stats
    // -----------------------------------------------------------------------

    struct StubBackend;
    impl StorageBackend for StubBackend {}

    struct RecordingChannel {
        peer: String,
        received: Mutex<Vec<Response>>,
    }

    impl ResponseChannel for RecordingChannel {
        fn write(&self, response: Response) {
            self.received.lock().push(response);
        }
        fn peer(&self) -> &str {
            &self.peer
        }
    }

    struct EchoProcessor {
        base: ProcessorBase,
    }

    #[async_trait]
    impl RequestProcessor for EchoProcessor {
        fn op_key(&self) -> OpKey {
            OpKey::ReadEntry
        }

        fn peer(&self) -> String {
            self.base.peer()
        }

        async fn execute(self: Box<Self>) {
            if !self.base.is_version_compatible() {
                let response = Response::for_request(
                    self.base.request(),
                    StatusCode::BadVersion,
                    Vec::new(),
                );
                self.base
                    .send_response(StatusCode::BadVersion, OpKey::ReadEntry, response);
                return;
            }
            let response = Response::for_request(self.base.request(), StatusCode::Ok, Vec::new());
            self.base
                .send_response(StatusCode::Ok, OpKey::ReadEntry, response);
        }
    }

    #[tokio::test]
    async fn full_pipeline_delivers_response_and_stats() {
        let stats = Arc::new(StatsRegistry::new(Duration::from_secs(60), 1));
        let channel = Arc::new(RecordingChannel {
            peer: "10.2.2.2:3181".to_string(),
            received: Mutex::new(Vec::new()),
        });

        let mut pool = WorkerPool::start(2, 16);

        let request = Request::new(3, OpCode::ReadEntry, 11, 22, Vec::new());
        let processor = Box::new(EchoProcessor {
            base: ProcessorBase::new(
                request,
                Arc::clone(&channel) as Arc<dyn ResponseChannel>,
                Arc::new(StubBackend),
                VersionGate::new(1, 3),
                Arc::clone(&stats),
            ),
        });

        pool.submit(processor).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let received = channel.received.lock();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].status, StatusCode::Ok);
        assert_eq!(received[0].ledger_id, 11);
        assert_eq!(received[0].entry_id, 22);
        drop(received);

        let snapshot = stats.op_stats(OpKey::ReadEntry).snapshot();
        assert_eq!(snapshot.success_count, 1);

        pool.stop().await;
    }
}
