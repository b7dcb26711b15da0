//! Engine metrics
//!
//! Counters for monitoring the dispatch engine: how many records were
//! accepted, delivered to sinks, or lost to full queues.

use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters shared by producers and worker threads.
///
/// `record_*` methods return the previous value.
///
/// # Example
///
/// ```
/// use rust_log_engine::EngineMetrics;
///
/// let metrics = EngineMetrics::new();
/// metrics.record_enqueued();
/// metrics.record_dropped();
///
/// assert_eq!(metrics.enqueued(), 1);
/// assert_eq!(metrics.dropped(), 1);
/// assert_eq!(metrics.drop_rate(), 50.0);
/// ```
#[derive(Debug)]
pub struct EngineMetrics {
    /// Records accepted into a worker queue
    enqueued: AtomicU64,

    /// Records handed to a sink without error
    delivered: AtomicU64,

    /// Records lost to a full queue
    dropped: AtomicU64,

    /// Sink emit failures, including caught panics
    sink_errors: AtomicU64,

    /// Times a producer found a queue full
    queue_full_events: AtomicU64,

    /// Times a producer had to wait for queue space
    block_events: AtomicU64,
}

impl EngineMetrics {
    pub const fn new() -> Self {
        Self {
            enqueued: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            sink_errors: AtomicU64::new(0),
            queue_full_events: AtomicU64::new(0),
            block_events: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn sink_errors(&self) -> u64 {
        self.sink_errors.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn queue_full_events(&self) -> u64 {
        self.queue_full_events.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn block_events(&self) -> u64 {
        self.block_events.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn record_enqueued(&self) -> u64 {
        self.enqueued.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_delivered(&self) -> u64 {
        self.delivered.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_dropped(&self) -> u64 {
        self.dropped.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_sink_error(&self) -> u64 {
        self.sink_errors.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_queue_full(&self) -> u64 {
        self.queue_full_events.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_block(&self) -> u64 {
        self.block_events.fetch_add(1, Ordering::Relaxed)
    }

    /// Dropped records as a percentage (0.0 - 100.0) of everything offered
    pub fn drop_rate(&self) -> f64 {
        let dropped = self.dropped() as f64;
        let total = self.enqueued() as f64 + dropped;
        if total == 0.0 {
            0.0
        } else {
            (dropped / total) * 100.0
        }
    }

    pub fn reset(&self) {
        self.enqueued.store(0, Ordering::Relaxed);
        self.delivered.store(0, Ordering::Relaxed);
        self.dropped.store(0, Ordering::Relaxed);
        self.sink_errors.store(0, Ordering::Relaxed);
        self.queue_full_events.store(0, Ordering::Relaxed);
        self.block_events.store(0, Ordering::Relaxed);
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for EngineMetrics {
    /// Snapshot of the current values
    fn clone(&self) -> Self {
        Self {
            enqueued: AtomicU64::new(self.enqueued()),
            delivered: AtomicU64::new(self.delivered()),
            dropped: AtomicU64::new(self.dropped()),
            sink_errors: AtomicU64::new(self.sink_errors()),
            queue_full_events: AtomicU64::new(self.queue_full_events()),
            block_events: AtomicU64::new(self.block_events()),
        }
    }
}
