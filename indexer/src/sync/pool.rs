use super::config::QUEUE_DEPTH_PER_WORKER;
use crate::error::{IndexerError, IndexerResult};
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, warn};

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Long-lived bounded worker pool shared by the fetch and block phases.
///
/// A fixed number of tasks drain one job queue, so at most `workers` jobs
/// run at once no matter how many phases submit. Must be created inside a
/// tokio runtime. Workers exit when the pool is dropped.
pub struct WorkerPool {
    queue: mpsc::Sender<Job>,
    workers: usize,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        let (tx, rx) = mpsc::channel::<Job>(workers * QUEUE_DEPTH_PER_WORKER);
        let shared_rx = Arc::new(Mutex::new(rx));

        for worker in 0..workers {
            let rx = Arc::clone(&shared_rx);
            tokio::spawn(async move {
                loop {
                    let maybe_job = {
                        let mut guard = rx.lock().await;
                        guard.recv().await
                    };
                    let Some(job) = maybe_job else { break };

                    if AssertUnwindSafe(job).catch_unwind().await.is_err() {
                        warn!(worker, "Worker job panicked");
                    }
                }
                debug!(worker, "Worker stopped");
            });
        }

        Self { queue: tx, workers }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run `f` over every item on the pool and wait for all of them.
    ///
    /// Outputs come back in input order, whatever order jobs finish in.
    pub async fn run_all<I, F, Fut, T>(&self, items: I, mut f: F) -> IndexerResult<Vec<T>>
    where
        I: IntoIterator,
        F: FnMut(I::Item) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let mut receivers = Vec::new();
        for item in items {
            let (response_tx, response_rx) = oneshot::channel();
            let fut = f(item);
            let job: Job = Box::pin(async move {
                let _ = response_tx.send(fut.await);
            });
            self.queue
                .send(job)
                .await
                .map_err(|_| IndexerError::WorkerLost("worker queue closed".into()))?;
            receivers.push(response_rx);
        }

        let mut outputs = Vec::with_capacity(receivers.len());
        for response_rx in receivers {
            let output = response_rx
                .await
                .map_err(|_| IndexerError::WorkerLost("job dropped before completing".into()))?;
            outputs.push(output);
        }
        Ok(outputs)
    }
}
