//! Long-lived worker pool.
//!
//! # Responsibilities
//! - Spawn a fixed number of workers once, at construction
//! - Feed them index-tagged jobs through a shared queue
//! - Reassemble results into input order
//!
//! # Design Decisions
//! - Workers share one receiver behind an async mutex; whichever worker is
//!   idle takes the next job
//! - Results come back over a per-batch channel sized to the batch, so a
//!   worker never blocks on reporting
//! - Dropping the pool closes the queue and the workers exit

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{future::BoxFuture, FutureExt};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, Mutex};

use super::{panic_message, DispatchFn, Executor, ExecutorError};
use crate::batch::envelope::ResponseEnvelope;
use crate::batch::synthetic::SyntheticRequest;

type Job = BoxFuture<'static, ()>;

/// Fixed-size pool of dispatch workers.
#[derive(Debug)]
pub struct WorkerPool {
    queue: mpsc::Sender<Job>,
    workers: usize,
}

impl WorkerPool {
    /// Spawn `workers` tasks on the current runtime.
    pub fn new(workers: usize) -> Result<Self, ExecutorError> {
        if workers == 0 {
            return Err(ExecutorError::ZeroWorkers);
        }
        let runtime = Handle::try_current().map_err(|_| ExecutorError::NoRuntime)?;

        let (queue, receiver) = mpsc::channel::<Job>(workers * 4);
        let receiver = Arc::new(Mutex::new(receiver));
        for id in 0..workers {
            runtime.spawn(worker_loop(id, receiver.clone()));
        }

        tracing::debug!(workers, "Worker pool started");
        Ok(Self { queue, workers })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }
}

async fn worker_loop(id: usize, receiver: Arc<Mutex<mpsc::Receiver<Job>>>) {
    loop {
        let job = {
            let mut receiver = receiver.lock().await;
            receiver.recv().await
        };
        let Some(job) = job else {
            break;
        };
        // Jobs catch their own panics; this only guards the worker itself.
        if let Err(panic) = AssertUnwindSafe(job).catch_unwind().await {
            tracing::error!(worker = id, panic_msg = %panic_message(&*panic), "Worker job panicked");
        }
    }
    tracing::debug!(worker = id, "Worker exiting, queue closed");
}

#[async_trait]
impl Executor for WorkerPool {
    fn name(&self) -> &'static str {
        "worker_pool"
    }

    async fn execute(
        &self,
        requests: Vec<SyntheticRequest>,
        dispatch: DispatchFn,
    ) -> Result<Vec<ResponseEnvelope>, ExecutorError> {
        let total = requests.len();
        let (results_tx, mut results_rx) = mpsc::channel::<(usize, ResponseEnvelope)>(total.max(1));

        for (index, request) in requests.into_iter().enumerate() {
            let dispatch = dispatch.clone();
            let results_tx = results_tx.clone();
            let job: Job = async move {
                let path = request.path.clone();
                let envelope = match AssertUnwindSafe(async { dispatch(request).await })
                    .catch_unwind()
                    .await
                {
                    Ok(envelope) => envelope,
                    Err(panic) => {
                        tracing::error!(path = %path, panic_msg = %panic_message(&*panic), "Sub-request dispatch panicked");
                        ResponseEnvelope::server_error(&path)
                    }
                };
                if results_tx.send((index, envelope)).await.is_err() {
                    tracing::warn!(index, "Batch caller went away before result delivery");
                }
            }
            .boxed();

            self.queue
                .send(job)
                .await
                .map_err(|_| ExecutorError::PoolClosed)?;
        }
        drop(results_tx);

        let mut slots: Vec<Option<ResponseEnvelope>> = vec![None; total];
        while let Some((index, envelope)) = results_rx.recv().await {
            slots[index] = Some(envelope);
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| slot.ok_or(ExecutorError::MissingResult { index }))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::batch::request::BatchMethod;
    use crate::executor::testing::{paths, requests, reversed_sleeps, tracking};

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_results_in_input_order() {
        let pool = WorkerPool::new(4).unwrap();
        let responses = pool.execute(requests(5), reversed_sleeps(5)).await.unwrap();
        assert_eq!(
            paths(&responses),
            vec!["/item/0", "/item/1", "/item/2", "/item/3", "/item/4"]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrency_capped_by_workers() {
        let pool = WorkerPool::new(2).unwrap();
        let peak = Arc::new(AtomicUsize::new(0));
        let responses = pool
            .execute(requests(6), tracking(Arc::new(AtomicUsize::new(0)), peak.clone()))
            .await
            .unwrap();

        assert_eq!(responses.len(), 6);
        let peak = peak.load(Ordering::SeqCst);
        assert!(peak <= 2, "peak in-flight was {peak}");
        assert!(peak >= 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_items_overlap() {
        let pool = WorkerPool::new(4).unwrap();
        let peak = Arc::new(AtomicUsize::new(0));
        pool.execute(requests(4), tracking(Arc::new(AtomicUsize::new(0)), peak.clone()))
            .await
            .unwrap();
        assert!(peak.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_panic_contained_and_pool_reusable() {
        let pool = WorkerPool::new(2).unwrap();
        let mut batch = requests(2);
        batch.insert(0, SyntheticRequest::new(BatchMethod::Get, "/panic"));

        let responses = pool.execute(batch, reversed_sleeps(2)).await.unwrap();
        assert_eq!(responses[0], ResponseEnvelope::server_error("/panic"));
        assert_eq!(responses[1].status_code, 200);
        assert_eq!(responses[2].status_code, 200);

        let again = pool.execute(requests(3), reversed_sleeps(3)).await.unwrap();
        assert_eq!(paths(&again), vec!["/item/0", "/item/1", "/item/2"]);
        assert_eq!(pool.workers(), 2);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let pool = WorkerPool::new(1).unwrap();
        let responses = pool.execute(Vec::new(), reversed_sleeps(0)).await.unwrap();
        assert!(responses.is_empty());
    }
}
