//! Backpressure policies for worker queues
//!
//! Decide what a producer does when a worker's bounded queue is full.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Per-worker policy applied when the queue has no free slot.
///
/// # Example
///
/// ```
/// use rust_log_engine::BackpressurePolicy;
/// use std::time::Duration;
///
/// let policy = BackpressurePolicy::default();
/// assert!(!policy.may_block());
///
/// let policy = BackpressurePolicy::BlockWithTimeout(Duration::from_millis(100));
/// assert!(policy.may_block());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackpressurePolicy {
    /// Reject the incoming record and report `QueueFull`
    #[default]
    DropNewest,

    /// Evict the oldest queued record to make room; the evicted record is
    /// reported as `QueueFull`
    DropOldest,

    /// Wait for space. The producer stalls while the sink is slow.
    Block,

    /// Wait up to the timeout, then behave like `DropNewest`
    BlockWithTimeout(Duration),
}

impl BackpressurePolicy {
    pub fn may_block(&self) -> bool {
        matches!(
            self,
            BackpressurePolicy::Block | BackpressurePolicy::BlockWithTimeout(_)
        )
    }
}

impl fmt::Display for BackpressurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackpressurePolicy::DropNewest => write!(f, "DropNewest"),
            BackpressurePolicy::DropOldest => write!(f, "DropOldest"),
            BackpressurePolicy::Block => write!(f, "Block"),
            BackpressurePolicy::BlockWithTimeout(d) => write!(f, "BlockWithTimeout({:?})", d),
        }
    }
}
