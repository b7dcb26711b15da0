//! Asynchronous dispatch engine
//!
//! Each worker pairs a sink with a level threshold, a bounded queue and a
//! consumer thread. Records are shared between workers behind an `Arc`, so
//! fan-out costs one refcount per worker.

use super::backpressure::BackpressurePolicy;
use super::error::{panic_message, ErrorCallback, LoggerError, Result};
use super::log_level::LogLevel;
use super::log_record::LogRecord;
use super::metrics::EngineMetrics;
use crate::sinks::Sink;
use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Default shutdown timeout for draining worker queues (5 seconds)
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

pub const DEFAULT_WORKER_CAPACITY: usize = 1024;

// Evictions attempted under DropOldest before the incoming record is dropped
const MAX_EVICTIONS: usize = 3;

// Longest single wait of a blocked producer between stop checks
const BLOCK_SLICE: Duration = Duration::from_millis(10);

/// Worker description handed to the engine
#[must_use = "builder methods return a new value"]
pub struct WorkerSpec {
    pub capacity: usize,
    pub threshold: LogLevel,
    pub sink: Box<dyn Sink>,
    pub backpressure: BackpressurePolicy,
}

impl WorkerSpec {
    pub fn new(sink: impl Sink + 'static) -> Self {
        Self::boxed(Box::new(sink))
    }

    pub fn boxed(sink: Box<dyn Sink>) -> Self {
        Self {
            capacity: DEFAULT_WORKER_CAPACITY,
            threshold: LogLevel::Print,
            sink,
            backpressure: BackpressurePolicy::default(),
        }
    }

    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn threshold(mut self, threshold: LogLevel) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn backpressure(mut self, policy: BackpressurePolicy) -> Self {
        self.backpressure = policy;
        self
    }
}

// Producer side of one worker
struct WorkerQueue {
    sink_name: String,
    threshold: LogLevel,
    capacity: usize,
    policy: BackpressurePolicy,
    sender: Sender<Arc<LogRecord>>,
    // Used for DropOldest eviction and for reporting leftovers at shutdown
    receiver: Receiver<Arc<LogRecord>>,
}

pub struct DispatchEngine {
    queues: RwLock<Vec<WorkerQueue>>,
    handles: Mutex<Vec<(String, JoinHandle<()>)>>,
    stopped: AtomicBool,
    metrics: Arc<EngineMetrics>,
    on_error: ErrorCallback,
    worker_count: usize,
}

impl DispatchEngine {
    /// Start one consumer thread per worker.
    ///
    /// # Errors
    ///
    /// `InvalidConfiguration` when `workers` is empty or a capacity is 0.
    pub fn new(workers: Vec<WorkerSpec>, on_error: ErrorCallback) -> Result<Self> {
        if workers.is_empty() {
            return Err(LoggerError::config(
                "DispatchEngine",
                "at least one worker is required",
            ));
        }
        if let Some(spec) = workers.iter().find(|w| w.capacity == 0) {
            return Err(LoggerError::config(
                "DispatchEngine",
                format!("worker '{}' has zero queue capacity", spec.sink.name()),
            ));
        }

        let metrics = Arc::new(EngineMetrics::new());
        let worker_count = workers.len();
        let mut queues = Vec::with_capacity(worker_count);
        let mut handles = Vec::with_capacity(worker_count);

        for (index, spec) in workers.into_iter().enumerate() {
            let (sender, receiver) = bounded::<Arc<LogRecord>>(spec.capacity);
            let sink_name = spec.sink.name().to_string();

            let consumer = Consumer {
                receiver: receiver.clone(),
                threshold: spec.threshold,
                sink: spec.sink,
                metrics: Arc::clone(&metrics),
                on_error: Arc::clone(&on_error),
            };
            let spawned = thread::Builder::new()
                .name(format!("log-worker-{}", index))
                .spawn(move || consumer.run());
            let handle = match spawned {
                Ok(handle) => handle,
                Err(e) => {
                    // Disconnect the workers already running so they exit
                    drop(queues);
                    return Err(LoggerError::io_operation(
                        "spawn worker thread",
                        format!("Failed to start worker for '{}'", sink_name),
                        e,
                    ));
                }
            };

            handles.push((sink_name.clone(), handle));
            queues.push(WorkerQueue {
                sink_name,
                threshold: spec.threshold,
                capacity: spec.capacity,
                policy: spec.backpressure,
                sender,
                receiver,
            });
        }

        Ok(Self {
            queues: RwLock::new(queues),
            handles: Mutex::new(handles),
            stopped: AtomicBool::new(false),
            metrics,
            on_error,
            worker_count,
        })
    }

    /// Fan a record out to every worker whose threshold it meets.
    ///
    /// Drops caused by a full queue are reported through the error callback
    /// and also returned. After [`stop`](Self::stop) this returns
    /// `LoggerStopped` without touching the callback.
    pub fn send(&self, record: LogRecord) -> Result<()> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(LoggerError::LoggerStopped);
        }

        let queues = self.queues.read();
        if queues.is_empty() {
            return Err(LoggerError::LoggerStopped);
        }

        let record = Arc::new(record);
        let mut first_error = None;
        for queue in queues.iter().filter(|q| record.level >= q.threshold) {
            if let Err(e) = self.enqueue(queue, Arc::clone(&record)) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn enqueue(&self, queue: &WorkerQueue, record: Arc<LogRecord>) -> Result<()> {
        let record = match queue.sender.try_send(record) {
            Ok(()) => {
                self.metrics.record_enqueued();
                return Ok(());
            }
            Err(TrySendError::Disconnected(_)) => return Err(LoggerError::LoggerStopped),
            Err(TrySendError::Full(record)) => record,
        };
        self.metrics.record_queue_full();

        match queue.policy {
            BackpressurePolicy::DropNewest => self.report_drop(queue),

            BackpressurePolicy::DropOldest => {
                let mut record = record;
                let mut evicted = false;
                for _ in 0..MAX_EVICTIONS {
                    if queue.receiver.try_recv().is_ok() {
                        evicted = true;
                        self.metrics.record_dropped();
                        (self.on_error)(&LoggerError::queue_full(queue.capacity, queue.capacity));
                    }
                    match queue.sender.try_send(record) {
                        Ok(()) => {
                            self.metrics.record_enqueued();
                            return if evicted {
                                Err(LoggerError::queue_full(queue.capacity, queue.capacity))
                            } else {
                                Ok(())
                            };
                        }
                        Err(TrySendError::Full(r)) => record = r,
                        Err(TrySendError::Disconnected(_)) => return Err(LoggerError::LoggerStopped),
                    }
                }
                self.report_drop(queue)
            }

            BackpressurePolicy::Block => self.send_blocking(queue, record, None),

            BackpressurePolicy::BlockWithTimeout(timeout) => {
                self.send_blocking(queue, record, Instant::now().checked_add(timeout))
            }
        }
    }

    // Waits in short slices and gives up once the engine is stopping, so a
    // stuck sink cannot hold the queue lock against stop()
    fn send_blocking(
        &self,
        queue: &WorkerQueue,
        mut record: Arc<LogRecord>,
        deadline: Option<Instant>,
    ) -> Result<()> {
        self.metrics.record_block();
        loop {
            let slice = match deadline {
                Some(deadline) => {
                    let left = deadline.saturating_duration_since(Instant::now());
                    if left.is_zero() {
                        return self.report_drop(queue);
                    }
                    left.min(BLOCK_SLICE)
                }
                None => BLOCK_SLICE,
            };
            match queue.sender.send_timeout(record, slice) {
                Ok(()) => {
                    self.metrics.record_enqueued();
                    return Ok(());
                }
                Err(SendTimeoutError::Disconnected(_)) => return Err(LoggerError::LoggerStopped),
                Err(SendTimeoutError::Timeout(r)) => {
                    if self.stopped.load(Ordering::Acquire) {
                        return Err(LoggerError::LoggerStopped);
                    }
                    record = r;
                }
            }
        }
    }

    fn report_drop(&self, queue: &WorkerQueue) -> Result<()> {
        self.metrics.record_dropped();
        let current = queue.sender.len();
        (self.on_error)(&LoggerError::queue_full(current, queue.capacity));
        Err(LoggerError::queue_full(current, queue.capacity))
    }

    /// Stop with [`DEFAULT_SHUTDOWN_TIMEOUT`]
    pub fn stop(&self) -> bool {
        self.stop_with_timeout(DEFAULT_SHUTDOWN_TIMEOUT)
    }

    /// Close every queue, let the workers drain and close their sinks, and
    /// wait for them up to `timeout`.
    ///
    /// Returns `true` if every worker finished in time. A second call is a
    /// no-op that returns `true`.
    pub fn stop_with_timeout(&self, timeout: Duration) -> bool {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return true;
        }

        // Senders are dropped here; consumers see disconnection once the
        // queues are empty
        let leftovers: Vec<(String, Receiver<Arc<LogRecord>>)> = std::mem::take(&mut *self.queues.write())
            .into_iter()
            .map(|q| (q.sink_name, q.receiver))
            .collect();

        let handles = std::mem::take(&mut *self.handles.lock());
        let start = Instant::now();
        let mut clean = true;

        for (name, handle) in handles {
            loop {
                if handle.is_finished() {
                    if let Err(e) = handle.join() {
                        eprintln!(
                            "[LOGGER ERROR] Worker for '{}' panicked during shutdown: {:?}",
                            name, e
                        );
                        clean = false;
                    }
                    break;
                }

                if start.elapsed() >= timeout {
                    let pending = leftovers
                        .iter()
                        .find(|(n, _)| *n == name)
                        .map(|(_, rx)| rx.len())
                        .unwrap_or(0);
                    eprintln!(
                        "[LOGGER WARNING] Worker for '{}' did not finish within {:?}. \
                         {} queued records may be lost.",
                        name, timeout, pending
                    );
                    clean = false;
                    break;
                }

                thread::sleep(Duration::from_millis(10));
            }
        }

        let dropped = self.metrics.dropped();
        if dropped > 0 {
            eprintln!(
                "[LOGGER WARNING] Engine stopped with {} dropped records (drop rate: {:.2}%)",
                dropped,
                self.metrics.drop_rate()
            );
        }
        clean
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Lowest threshold across workers; records below it reach no sink
    pub fn min_threshold(&self) -> LogLevel {
        self.queues
            .read()
            .iter()
            .map(|q| q.threshold)
            .min()
            .unwrap_or(LogLevel::None)
    }

    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }
}

impl Drop for DispatchEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for DispatchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchEngine")
            .field("workers", &self.worker_count)
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

// Consumer side of one worker, owned by its thread
struct Consumer {
    receiver: Receiver<Arc<LogRecord>>,
    threshold: LogLevel,
    sink: Box<dyn Sink>,
    metrics: Arc<EngineMetrics>,
    on_error: ErrorCallback,
}

impl Consumer {
    fn run(mut self) {
        // recv keeps yielding queued records after disconnection until empty
        while let Ok(record) = self.receiver.recv() {
            self.deliver(&record);
        }

        let sink = &mut self.sink;
        match catch_unwind(AssertUnwindSafe(|| sink.close())) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => (self.on_error)(&e),
            Err(payload) => eprintln!(
                "[LOGGER CRITICAL] Sink '{}' panicked while closing: {}",
                self.sink.name(),
                panic_message(payload.as_ref())
            ),
        }
    }

    fn deliver(&mut self, record: &LogRecord) {
        if record.level < self.threshold {
            return;
        }

        let sink = &mut self.sink;
        match catch_unwind(AssertUnwindSafe(|| sink.emit(record))) {
            Ok(Ok(())) => {
                self.metrics.record_delivered();
            }
            Ok(Err(e)) => {
                self.metrics.record_sink_error();
                (self.on_error)(&e);
            }
            Err(payload) => {
                self.metrics.record_sink_error();
                let err = LoggerError::sink_panicked(self.sink.name(), panic_message(payload.as_ref()));
                eprintln!(
                    "[LOGGER CRITICAL] {}. Other workers continue to function.",
                    err
                );
                (self.on_error)(&err);
            }
        }
    }
}
