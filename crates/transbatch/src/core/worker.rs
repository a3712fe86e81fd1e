//! Module for the translation worker pool.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use futures::FutureExt;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use crate::backend::{DeviceId, TranslationEngine};
use crate::communication::{Batch, QueueItem};
use crate::error::{EngineError, TranslatorError};
use super::queue::BoundedQueue;

/// A fixed set of worker tasks, each owning one engine, all consuming from
/// the same bounded queue.
///
/// # Example
///
/// ```ignore
/// let queue = Arc::new(BoundedQueue::new(2 * workers));
/// let pool = WorkerPool::start(workers, queue.clone(), |device| model.engine(device, &vocabs)).await?;
///
/// batcher.produce_to(&queue).await;
///
/// // Drains queued batches, then joins every worker
/// pool.stop().await;
/// ```
pub struct WorkerPool {
    /// Queue the workers consume from
    queue: Arc<BoundedQueue<QueueItem>>,

    /// Live workers; emptied by the first `stop`
    handles: Mutex<Vec<JoinHandle<()>>>,

    /// Number of workers the pool was started with
    size: usize,
}

impl WorkerPool {
    /// Spawns `workers` workers on devices `cpu:0..cpu:workers`.
    ///
    /// Each worker initialises its engine on its own task before consuming.
    /// Returns once every engine reports ready. If any fails, the workers
    /// already running are stopped and the failure is returned.
    pub async fn start<E, F>(
        workers: usize,
        queue: Arc<BoundedQueue<QueueItem>>,
        mut make_engine: F,
    ) -> Result<Self, TranslatorError>
    where
        E: TranslationEngine,
        F: FnMut(DeviceId) -> E,
    {
        let mut handles = Vec::with_capacity(workers);
        let mut ready = Vec::with_capacity(workers);
        for cpu in 0..workers {
            let device = DeviceId::cpu(cpu);
            let engine = make_engine(device);
            let (tx, rx) = oneshot::channel();
            handles.push(tokio::spawn(run_worker(device, engine, queue.clone(), tx)));
            ready.push((device, rx));
        }

        let pool = Self {
            queue,
            handles: Mutex::new(handles),
            size: workers,
        };

        for (device, rx) in ready {
            let source = match rx.await {
                Ok(Ok(())) => continue,
                Ok(Err(source)) => source,
                Err(_) => EngineError::Panicked("worker exited during initialization".to_string()),
            };
            warn!(%device, error = %source, "engine failed to initialize");
            pool.stop().await;
            return Err(TranslatorError::EngineInit { device, source });
        }

        info!(workers, "worker pool started");
        Ok(pool)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Workers not yet joined by `stop`
    pub async fn running(&self) -> usize {
        self.handles.lock().await.len()
    }

    /// Sends one poison item per live worker and waits for all of them to
    /// exit. Work queued before the call is translated first. Calling it
    /// again, or concurrently, is a no-op.
    pub async fn stop(&self) {
        let mut handles = self.handles.lock().await;
        if handles.is_empty() {
            return;
        }

        for _ in 0..handles.len() {
            self.queue.produce(QueueItem::Poison).await;
        }
        for handle in handles.drain(..) {
            if let Err(err) = handle.await {
                warn!(error = %err, "worker did not exit cleanly");
            }
        }
        info!("worker pool stopped");
    }
}

impl Drop for WorkerPool {
    /// Shuts the workers down when the pool is dropped without `stop`.
    ///
    /// Needs a running tokio runtime to wait for the workers; without one
    /// they are aborted.
    fn drop(&mut self) {
        let handles = std::mem::take(self.handles.get_mut());
        if handles.is_empty() {
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let queue = self.queue.clone();
                runtime.spawn(async move {
                    for _ in 0..handles.len() {
                        queue.produce(QueueItem::Poison).await;
                    }
                    for handle in handles {
                        let _ = handle.await;
                    }
                });
            }
            Err(_) => handles.iter().for_each(JoinHandle::abort),
        }
    }
}

async fn run_worker<E: TranslationEngine>(
    device: DeviceId,
    mut engine: E,
    queue: Arc<BoundedQueue<QueueItem>>,
    ready: oneshot::Sender<Result<(), EngineError>>,
) {
    let initialized = match AssertUnwindSafe(engine.initialize()).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => Err(EngineError::Panicked(panic_message(panic.as_ref()))),
    };
    let failed = initialized.is_err();
    let _ = ready.send(initialized);
    if failed {
        return;
    }

    debug!(%device, "worker consuming");
    while let Some(item) = queue.consume().await {
        match item {
            QueueItem::Batch(batch) => translate_batch(&mut engine, device, batch).await,
            QueueItem::Poison => break,
        }
    }
    debug!(%device, "worker exited");
}

/// Runs `batch` through `engine` and records the outcome on every request
/// involved.
///
/// A failing or panicking engine fails this batch's segments only; the
/// requests still resolve, carrying the error in their response.
pub(crate) async fn translate_batch<E: TranslationEngine>(engine: &mut E, device: DeviceId, batch: Batch) {
    let result = match AssertUnwindSafe(engine.translate(&batch)).catch_unwind().await {
        Ok(Ok(outputs)) if outputs.len() == batch.len() => Ok(outputs),
        Ok(Ok(outputs)) => Err(EngineError::OutputMismatch {
            expected: batch.len(),
            got: outputs.len(),
        }),
        Ok(Err(err)) => Err(err),
        Err(panic) => Err(EngineError::Panicked(panic_message(panic.as_ref()))),
    };

    match result {
        Ok(outputs) => {
            for (entry, translation) in batch.into_entries().into_iter().zip(outputs) {
                entry.request().translated(entry.index(), translation);
            }
        }
        Err(err) => {
            warn!(%device, segments = batch.len(), error = %err, "batch failed");
            let reason = err.to_string();
            for entry in batch.into_entries() {
                entry.request().failed(entry.index(), &reason);
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
