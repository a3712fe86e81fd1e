//! The translation service: admission control, segmentation, batching and
//! worker management behind one handle.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use tokio::sync::{oneshot, Mutex, Notify};
use tracing::{debug, info, warn};
use crate::backend::{load_vocabularies, DeviceId, TextProcessor, TranslationEngine, TranslationModel, Vocabularies};
use crate::communication::QueueItem;
use crate::config::ServiceConfig;
use crate::core::batcher::{Batcher, Enqueued};
use crate::core::capacity::Capacity;
use crate::core::queue::BoundedQueue;
use crate::core::worker::{translate_batch, WorkerPool};
use crate::error::TranslatorError;
use crate::request::{Request, RequestId, RequestTracker, ResponseFuture, Status, TrackerHandle};
use crate::response::Response;

/// State shared between the service handle and its background jobs.
struct Inner<M: TranslationModel> {
    next_id: AtomicU64,
    capacity: Arc<Capacity>,
    default_priority: i32,
    processor: M::Processor,
    batcher: Batcher,

    /// Present when running workers
    queue: Option<Arc<BoundedQueue<QueueItem>>>,

    /// Present when running without workers
    inline: Option<Mutex<M::Engine>>,

    vocabs: Vocabularies<M::Vocab>,
}

/// Counts background jobs still feeding the batcher, so shutdown can wait
/// for them before poisoning the workers.
#[derive(Default)]
struct InFlight {
    stopping: AtomicBool,
    jobs: AtomicUsize,
    idle: Notify,
}

struct JobGuard(Arc<InFlight>);

impl InFlight {
    /// Registers a new job, or returns `None` once shutdown has begun.
    fn enter(self: &Arc<Self>) -> Option<JobGuard> {
        self.jobs.fetch_add(1, Ordering::SeqCst);
        if self.stopping.load(Ordering::SeqCst) {
            self.leave();
            return None;
        }
        Some(JobGuard(self.clone()))
    }

    fn leave(&self) {
        if self.jobs.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }

    /// Refuses new jobs and waits for the running ones to finish.
    async fn close_and_drain(&self) {
        self.stopping.store(true, Ordering::SeqCst);
        loop {
            let notified = self.idle.notified();
            if self.jobs.load(Ordering::SeqCst) == 0 {
                break;
            }
            notified.await;
        }
    }
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        self.0.leave();
    }
}

/// Everything one admitted request needs to be segmented and queued, owned
/// so it can move into a background task.
struct TranslationJob {
    id: RequestId,
    input: String,
    input_bytes: usize,
    line_number_begin: usize,
    tracker: TrackerHandle,
    promise: oneshot::Sender<Response>,
}

impl TranslationJob {
    /// Segments the input and hands the request to the batcher.
    fn prepare<M: TranslationModel>(self, inner: &Inner<M>) {
        let processed = match inner.processor.process(&self.input) {
            Ok(processed) => processed,
            Err(err) => {
                warn!(request = self.id, error = %err, "text processing failed");
                inner.batcher.forget(self.id);
                inner.capacity.release(self.input_bytes);
                self.tracker.set_status(Status::Failed);
                let _ = self.promise.send(Response::failed(self.input, err.to_string()));
                return;
            }
        };

        let request = Arc::new(Request::new(
            self.id,
            self.line_number_begin,
            inner.default_priority,
            self.input,
            processed,
            self.promise,
        ));

        let capacity = inner.capacity.clone();
        let tracker = self.tracker.clone();
        let bytes = self.input_bytes;
        let id = self.id;
        request.on_complete(move |completion| {
            capacity.release(bytes);
            tracker.set_status(completion.into());
            info!(request = id, ?completion, capacity_bytes = capacity.available(), "request complete");
        });

        match inner.batcher.add_whole_request(request.clone()) {
            Enqueued::Queued => {
                self.tracker.set_status(Status::Queued);
            }
            Enqueued::Empty => request.finish_if_idle(),
            Enqueued::Cancelled => request.cancel_all(),
        }
    }

    /// Prepares the request and translates every pending batch with the
    /// inline engine.
    ///
    /// Batches pulled here may belong to other callers, so this runs on its
    /// own task: a caller that stops waiting must not drop them untranslated.
    async fn run_inline<M: TranslationModel>(self, inner: Arc<Inner<M>>) {
        self.prepare(&inner);
        if let Some(engine) = &inner.inline {
            // batches are only pulled while holding the engine, so once we
            // own it every batch taken by another caller has been translated
            let mut engine = engine.lock().await;
            while let Some(batch) = inner.batcher.next_batch() {
                translate_batch(&mut *engine, DeviceId::cpu(0), batch).await;
            }
        }
    }

    async fn run_in_background<M: TranslationModel>(self, inner: Arc<Inner<M>>, _guard: JobGuard) {
        self.prepare(&inner);
        if let Some(queue) = &inner.queue {
            inner.batcher.produce_to(queue).await;
        }
    }
}

/// # Service
///
/// Accepts translation requests concurrently, admits them against a byte
/// budget, batches their segments across requests by priority and resolves
/// each one once all of its segments are translated.
///
/// With `workers = 0` every call translates inline and returns only when its
/// request is done. With `workers > 0` calls return immediately and a pool
/// of workers, one engine each, translates in the background.
///
/// # Example
///
/// ```ignore
/// let service = Service::new(config, &model).await?;
///
/// let response = service.translate("Hallo Welt".to_string()).await.await?;
///
/// let tracker = service.translate_part(document, 120).await;
/// let handle = tracker.handle();
/// service.amend(&handle, 0);
/// let response = tracker.await?;
///
/// service.stop().await;
/// ```
pub struct Service<M: TranslationModel> {
    inner: Arc<Inner<M>>,
    pool: Option<WorkerPool>,
    in_flight: Arc<InFlight>,
}

impl<M: TranslationModel> Service<M> {
    /// Loads vocabularies, builds the text processor and starts the engines.
    ///
    /// Fails without leaving anything running if the configuration is
    /// invalid, a vocabulary does not load or an engine does not initialise.
    pub async fn new(config: ServiceConfig, model: &M) -> Result<Self, TranslatorError> {
        config.validate()?;
        let vocabs = load_vocabularies(model, &config.vocabs)?;
        let processor = model.text_processor(&vocabs)?;

        let (queue, pool, inline) = if config.workers == 0 {
            let device = DeviceId::cpu(0);
            let mut engine = model.engine(device, &vocabs);
            engine
                .initialize()
                .await
                .map_err(|source| TranslatorError::EngineInit { device, source })?;
            (None, None, Some(Mutex::new(engine)))
        } else {
            let queue = Arc::new(BoundedQueue::new(2 * config.workers));
            let pool = WorkerPool::start(config.workers, queue.clone(), |device| model.engine(device, &vocabs)).await?;
            (Some(queue), Some(pool), None)
        };

        info!(
            workers = config.workers,
            capacity_bytes = config.capacity_bytes,
            vocabs = vocabs.len(),
            "translation service started"
        );

        let inner = Inner {
            next_id: AtomicU64::new(0),
            capacity: Arc::new(Capacity::new(config.capacity_bytes)),
            default_priority: config.batching.default_priority,
            processor,
            batcher: Batcher::new(config.batching),
            queue,
            inline,
            vocabs,
        };

        Ok(Self {
            inner: Arc::new(inner),
            pool,
            in_flight: Arc::new(InFlight::default()),
        })
    }

    /// Submits `input` and returns the future of its response.
    pub async fn translate(&self, input: String) -> ResponseFuture {
        let (_, future) = self.translate_part(input, 0).await.into_parts();
        future
    }

    /// [`Service::translate`] for borrowed input.
    pub async fn translate_with_copy(&self, input: &str) -> ResponseFuture {
        self.translate(input.to_owned()).await
    }

    /// Submits `input`, numbering its lines from `line_number_begin`, and
    /// returns a tracker for awaiting, cancelling or amending it.
    ///
    /// Inputs larger than the capacity currently available are rejected: the
    /// tracker is `RejectedMemory` and already resolved with an empty
    /// response.
    pub async fn translate_part(&self, input: String, line_number_begin: usize) -> RequestTracker {
        let inner = &self.inner;
        let id = inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tracker, promise) = RequestTracker::new(id);
        let input_bytes = input.len();

        let guard = match &self.pool {
            Some(_) => match self.in_flight.enter() {
                Some(guard) => Some(guard),
                None => {
                    debug!(request = id, "service stopped, request not accepted");
                    tracker.as_ref().set_status(Status::Cancelled);
                    let _ = promise.send(Response::empty());
                    return tracker;
                }
            },
            None => None,
        };

        if !inner.capacity.try_reserve(input_bytes) {
            debug!(
                request = id,
                input_bytes,
                capacity_bytes = inner.capacity.available(),
                "request rejected, over capacity"
            );
            tracker.as_ref().set_status(Status::RejectedMemory);
            let _ = promise.send(Response::empty());
            return tracker;
        }
        info!(request = id, input_bytes, capacity_bytes = inner.capacity.available(), "request admitted");

        // nothing below may await until the job owns the reserved bytes
        inner.batcher.reserve(id);
        let job = TranslationJob {
            id,
            input,
            input_bytes,
            line_number_begin,
            tracker: tracker.handle(),
            promise,
        };

        match guard {
            Some(guard) => {
                tokio::spawn(job.run_in_background(inner.clone(), guard));
            }
            None => {
                if let Err(err) = tokio::spawn(job.run_inline(inner.clone())).await {
                    warn!(request = id, error = %err, "inline translation did not finish");
                }
            }
        }
        tracker
    }

    /// Withdraws the tracked request's segments that have not been
    /// dispatched yet. A request left with nothing dispatched resolves
    /// `Cancelled` with an empty response. Cancelling a finished request
    /// does nothing.
    ///
    /// Never waits and needs no runtime: it only takes the batcher's short
    /// lock. A request still being segmented is cancelled when it arrives.
    pub fn cancel<T: AsRef<TrackerHandle>>(&self, tracker: &T) {
        let id = tracker.as_ref().id();
        if let Some((request, indices)) = self.inner.batcher.cancel(id) {
            request.cancel_segments(&indices);
        }
    }

    /// Changes the priority of the tracked request's pending segments.
    ///
    /// Like [`Service::cancel`], never waits and needs no runtime.
    pub fn amend<T: AsRef<TrackerHandle>>(&self, tracker: &T, nice: i32) {
        self.inner.batcher.amend(tracker.as_ref().id(), nice);
    }

    /// Stops the workers after the work already admitted has been queued
    /// and translated. Idempotent; a no-op without workers.
    pub async fn stop(&self) {
        let Some(pool) = &self.pool else {
            return;
        };
        self.in_flight.close_and_drain().await;
        pool.stop().await;
    }

    /// Bytes still available for admission
    pub fn available_capacity(&self) -> usize {
        self.inner.capacity.available()
    }

    pub fn workers(&self) -> usize {
        self.pool.as_ref().map_or(0, WorkerPool::size)
    }

    /// The loaded vocabularies, source first
    pub fn vocabularies(&self) -> &Vocabularies<M::Vocab> {
        &self.inner.vocabs
    }
}

impl<M: TranslationModel> Drop for Service<M> {
    /// Runs the `stop` sequence on a spawned task when dropped inside a
    /// tokio runtime. Outside one, the pool aborts its workers.
    fn drop(&mut self) {
        let Some(pool) = self.pool.take() else {
            return;
        };
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let in_flight = self.in_flight.clone();
            runtime.spawn(async move {
                in_flight.close_and_drain().await;
                pool.stop().await;
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;
    use futures::FutureExt;
    use tokio::sync::Semaphore;
    use tokio::time;
    use crate::backend::mock::MockModel;
    use crate::config::BatchingConfig;

    fn config(workers: usize, capacity_bytes: usize) -> ServiceConfig {
        ServiceConfig {
            workers,
            capacity_bytes,
            vocabs: vec![PathBuf::from("src.spm"), PathBuf::from("trg.spm")],
            batching: BatchingConfig::default(),
        }
    }

    fn one_segment_batches(workers: usize, capacity_bytes: usize) -> ServiceConfig {
        let mut config = config(workers, capacity_bytes);
        config.batching.max_batch_segments = 1;
        config
    }

    async fn settle() {
        time::sleep(Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn test_oversized_input_is_rejected() {
        let service = Service::new(config(0, 10), &MockModel::default()).await.unwrap();

        let tracker = service.translate_part("eleven byte".to_string(), 0).await;
        assert_eq!(tracker.status(), Status::RejectedMemory);
        assert_eq!(service.available_capacity(), 10);

        let response = tracker.into_future().now_or_never().unwrap().unwrap();
        assert!(response.is_empty());
    }

    #[tokio::test]
    async fn test_zero_workers_translate_synchronously() {
        let service = Service::new(config(0, 100), &MockModel::default()).await.unwrap();
        assert_eq!(service.workers(), 0);

        let tracker = service.translate_part("hello\nworld".to_string(), 0).await;
        assert_eq!(tracker.status(), Status::Success);
        assert_eq!(service.available_capacity(), 100);

        let response = tracker.into_future().now_or_never().unwrap().unwrap();
        assert_eq!(response.target(), "HELLO\nWORLD");
    }

    #[tokio::test]
    async fn test_inline_drain_outlives_an_aborted_caller() {
        let gate = Arc::new(Semaphore::new(0));
        let service = Arc::new(Service::new(config(0, 100), &MockModel::gated(gate.clone())).await.unwrap());

        // `a` holds the engine; `b` waits for it with its segment pending
        let a = {
            let service = service.clone();
            tokio::spawn(async move { service.translate_part("aaa".to_string(), 0).await })
        };
        settle().await;
        let b = {
            let service = service.clone();
            tokio::spawn(async move { service.translate_part("bbb".to_string(), 0).await })
        };
        settle().await;

        // `a`'s drain finishes its own batch and picks up `b`'s, then its caller goes away
        gate.add_permits(1);
        settle().await;
        a.abort();
        gate.add_permits(100);

        let b = time::timeout(Duration::from_secs(1), b).await.unwrap().unwrap();
        assert_eq!(b.status(), Status::Success);
        assert_eq!(b.await.unwrap().target(), "BBB");
        assert_eq!(service.available_capacity(), 100);
    }

    #[tokio::test]
    async fn test_admission_completes_without_suspending() {
        let gate = Arc::new(Semaphore::new(0));
        let service = Service::new(config(1, 100), &MockModel::gated(gate.clone())).await.unwrap();

        // a caller dropping the call after its first poll cannot strand reserved bytes
        let tracker = service.translate_part("a".repeat(60), 0).now_or_never().unwrap();
        assert_eq!(service.available_capacity(), 40);

        gate.add_permits(1);
        let handle = tracker.handle();
        time::timeout(Duration::from_secs(1), tracker.into_future()).await.unwrap().unwrap();
        assert_eq!(handle.status(), Status::Success);
        assert_eq!(service.available_capacity(), 100);
        service.stop().await;
    }

    #[tokio::test]
    async fn test_translate_with_copy() {
        let service = Service::new(config(0, 100), &MockModel::default()).await.unwrap();
        let response = service.translate_with_copy("guten tag").await.await.unwrap();
        assert_eq!(response.target(), "GUTEN TAG");
        assert_eq!(response.source(), "guten tag");
    }

    #[tokio::test]
    async fn test_line_numbers_are_offset() {
        let service = Service::new(config(0, 100), &MockModel::default()).await.unwrap();
        let response = service.translate_part("x\n\ny".to_string(), 5).await.await.unwrap();
        let lines = response.sentences().iter().map(|s| s.line).collect::<Vec<_>>();
        assert_eq!(lines, vec![5, 7]);
    }

    #[tokio::test]
    async fn test_empty_input_succeeds() {
        let service = Service::new(config(0, 100), &MockModel::default()).await.unwrap();
        let tracker = service.translate_part(String::new(), 0).await;
        assert_eq!(tracker.status(), Status::Success);
        assert!(tracker.await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_processing_failure_restores_capacity() {
        let service = Service::new(config(0, 100), &MockModel::default()).await.unwrap();
        let tracker = service.translate_part("UNPROCESSABLE".to_string(), 0).await;

        assert_eq!(tracker.status(), Status::Failed);
        assert_eq!(service.available_capacity(), 100);
        let response = tracker.await.unwrap();
        assert_eq!(response.error(), Some("text processing failed: unprocessable input"));
    }

    #[tokio::test]
    async fn test_engine_failure_resolves_with_error() {
        let service = Service::new(config(1, 100), &MockModel::default()).await.unwrap();
        let tracker = service.translate_part("ok\nFAIL".to_string(), 0).await;
        let handle = tracker.handle();

        let response = time::timeout(Duration::from_secs(1), tracker.into_future()).await.unwrap().unwrap();
        assert!(response.error().is_some());
        assert_eq!(handle.status(), Status::Failed);
        assert_eq!(service.available_capacity(), 100);

        // the worker survives the failed batch
        let response = service.translate("still here".to_string()).await.await.unwrap();
        assert_eq!(response.target(), "STILL HERE");
        service.stop().await;
    }

    #[tokio::test]
    async fn test_capacity_is_held_until_completion() {
        let gate = Arc::new(Semaphore::new(0));
        let service = Service::new(config(1, 100), &MockModel::gated(gate.clone())).await.unwrap();

        let first = service.translate_part("a".repeat(60), 0).await;
        assert_eq!(service.available_capacity(), 40);

        let second = service.translate_part("b".repeat(50), 0).await;
        assert_eq!(second.status(), Status::RejectedMemory);
        assert_eq!(service.available_capacity(), 40);

        gate.add_permits(1);
        let handle = first.handle();
        first.await.unwrap();
        assert_eq!(handle.status(), Status::Success);
        assert_eq!(service.available_capacity(), 100);
        service.stop().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_many_requests_all_succeed_in_order() {
        let service = Service::new(config(2, 1 << 20), &MockModel::default()).await.unwrap();

        let inputs = (0..20)
            .map(|i| (0..5).map(|line| format!("request {i} line {line}")).collect::<Vec<_>>().join("\n"))
            .collect::<Vec<_>>();

        let mut trackers = vec![];
        for input in &inputs {
            trackers.push(service.translate_part(input.clone(), 0).await);
        }

        for (tracker, input) in trackers.into_iter().zip(&inputs) {
            let handle = tracker.handle();
            let response = time::timeout(Duration::from_secs(5), tracker.into_future()).await.unwrap().unwrap();
            assert_eq!(handle.status(), Status::Success);
            assert_eq!(response.target(), input.to_uppercase());
            let lines = response.sentences().iter().map(|s| s.line).collect::<Vec<_>>();
            assert_eq!(lines, vec![0, 1, 2, 3, 4]);
        }
        assert_eq!(service.available_capacity(), 1 << 20);
        service.stop().await;
    }

    #[tokio::test]
    async fn test_cancel_after_completion_is_noop() {
        let service = Service::new(config(0, 100), &MockModel::default()).await.unwrap();
        let tracker = service.translate_part("done".to_string(), 0).await;
        let handle = tracker.handle();

        service.cancel(&handle);
        service.amend(&handle, -5);

        assert_eq!(handle.status(), Status::Success);
        assert_eq!(tracker.await.unwrap().target(), "DONE");
        assert_eq!(service.available_capacity(), 100);
    }

    #[tokio::test]
    async fn test_cancel_fully_pending_request() {
        let gate = Arc::new(Semaphore::new(0));
        let model = MockModel::gated(gate.clone());
        let log = model.batch_log();
        let service = Service::new(one_segment_batches(1, 1000), &model).await.unwrap();

        // worker busy with `a`, queue full with b1 b2, producers holding b3 and c1
        let a = service.translate_part("a".to_string(), 0).await;
        settle().await;
        let b = service.translate_part("b1\nb2\nb3".to_string(), 0).await;
        settle().await;
        let c = service.translate_part("c1\nc2".to_string(), 0).await;
        settle().await;
        // d's own job picks up c2, leaving d pending
        let d = service.translate_part("d".to_string(), 0).await;
        settle().await;

        let d_id = d.id();
        service.cancel(&d);
        assert_eq!(d.status(), Status::Cancelled);

        gate.add_permits(100);
        for tracker in [a, b, c] {
            let handle = tracker.handle();
            time::timeout(Duration::from_secs(1), tracker.into_future()).await.unwrap().unwrap();
            assert_eq!(handle.status(), Status::Success);
        }
        assert!(d.await.unwrap().is_empty());
        assert_eq!(service.available_capacity(), 1000);
        assert!(log.lock().unwrap().iter().flatten().all(|(id, _)| *id != d_id));
        service.stop().await;
    }

    #[tokio::test]
    async fn test_cancel_partially_dispatched_request() {
        let gate = Arc::new(Semaphore::new(0));
        let service = Service::new(one_segment_batches(1, 1000), &MockModel::gated(gate.clone())).await.unwrap();

        let a = service.translate_part("a".to_string(), 0).await;
        settle().await;
        // b1 b2 queued, b3 held by the producer, b4 pending
        let b = service.translate_part("b1\nb2\nb3\nb4".to_string(), 0).await;
        settle().await;

        // cancel from a thread outside the runtime
        let handle = b.handle();
        std::thread::scope(|scope| {
            scope.spawn(|| service.cancel(&handle));
        });
        assert_eq!(handle.status(), Status::Queued);
        gate.add_permits(100);

        a.await.unwrap();
        let response = time::timeout(Duration::from_secs(1), b.into_future()).await.unwrap().unwrap();
        assert_eq!(handle.status(), Status::Success);
        assert_eq!(response.target(), "B1\nB2\nB3\n");
        assert_eq!(response.sentences()[3].translation, None);
        service.stop().await;
    }

    #[tokio::test]
    async fn test_amend_moves_pending_segments_forward() {
        let gate = Arc::new(Semaphore::new(0));
        let model = MockModel::gated(gate.clone());
        let log = model.batch_log();
        let service = Service::new(one_segment_batches(1, 1000), &model).await.unwrap();

        let _a = service.translate_part("a".to_string(), 0).await;
        settle().await;
        let _b = service.translate_part("b1\nb2\nb3".to_string(), 0).await;
        settle().await;
        let c = service.translate_part("c1\nc2\nc3".to_string(), 0).await;
        settle().await;
        let d = service.translate_part("d".to_string(), 0).await;
        settle().await;

        // pending: c3, d. After amending, d is taken ahead of c3
        service.amend(&d, 0);
        let _e = service.translate_part("e".to_string(), 0).await;
        settle().await;

        let (c_id, d_id) = (c.id(), d.id());
        gate.add_permits(100);
        c.await.unwrap();
        d.await.unwrap();

        let order = log.lock().unwrap().iter().flatten().copied().collect::<Vec<_>>();
        let position = |key| order.iter().position(|entry| *entry == key).unwrap();
        assert!(position((d_id, 0)) < position((c_id, 2)));
        service.stop().await;
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let service = Service::new(config(2, 100), &MockModel::default()).await.unwrap();
        let response = service.translate("before".to_string()).await.await.unwrap();
        assert_eq!(response.target(), "BEFORE");

        service.stop().await;
        service.stop().await;
        assert_eq!(service.workers(), 2);
        assert_eq!(service.pool.as_ref().unwrap().running().await, 0);
    }

    #[tokio::test]
    async fn test_stop_drains_admitted_work() {
        let service = Service::new(config(1, 1000), &MockModel::default()).await.unwrap();
        let trackers = [
            service.translate_part("one".to_string(), 0).await,
            service.translate_part("two".to_string(), 0).await,
        ];
        service.stop().await;

        for tracker in trackers {
            assert!(tracker.await.unwrap().error().is_none());
        }
    }

    #[tokio::test]
    async fn test_requests_after_stop_are_cancelled() {
        let service = Service::new(config(1, 100), &MockModel::default()).await.unwrap();
        service.stop().await;

        let tracker = service.translate_part("late".to_string(), 0).await;
        assert_eq!(tracker.status(), Status::Cancelled);
        assert_eq!(service.available_capacity(), 100);
        assert!(tracker.await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stop_without_workers_is_noop() {
        let service = Service::new(config(0, 100), &MockModel::default()).await.unwrap();
        service.stop().await;
        let response = service.translate("still works".to_string()).await.await.unwrap();
        assert_eq!(response.target(), "STILL WORKS");
    }

    #[tokio::test]
    async fn test_configuration_errors_abort_startup() {
        let mut single = config(1, 100);
        single.vocabs.truncate(1);
        assert!(matches!(
            Service::new(single, &MockModel::default()).await,
            Err(TranslatorError::InsufficientVocabularies(1))
        ));

        let mut missing = config(1, 100);
        missing.vocabs[1] = PathBuf::from("missing.spm");
        assert!(matches!(
            Service::new(missing, &MockModel::default()).await,
            Err(TranslatorError::VocabularyLoad { .. })
        ));

        assert!(matches!(
            Service::new(config(0, 100), &MockModel::failing_init_on(0)).await,
            Err(TranslatorError::EngineInit { .. })
        ));
        assert!(matches!(
            Service::new(config(2, 100), &MockModel::failing_init_on(1)).await,
            Err(TranslatorError::EngineInit { .. })
        ));
    }

    #[tokio::test]
    async fn test_shared_vocabulary() {
        let mut shared = config(0, 100);
        shared.vocabs = vec![PathBuf::from("joint.spm"), PathBuf::from("joint.spm")];
        let model = MockModel::default();
        let service = Service::new(shared, &model).await.unwrap();

        assert!(Arc::ptr_eq(service.vocabularies().source(), service.vocabularies().target()));
        assert_eq!(model.vocabulary_loads(), 1);
    }

    #[tokio::test]
    async fn test_request_ids_increase() {
        let service = Service::new(config(0, 4), &MockModel::default()).await.unwrap();
        let first = service.translate_part("ab".to_string(), 0).await;
        let rejected = service.translate_part("too long".to_string(), 0).await;
        let third = service.translate_part("cd".to_string(), 0).await;
        assert!(first.id() < rejected.id());
        assert!(rejected.id() < third.id());
    }
}
