//! Pure batching abstraction.
//!
//! Groups built traces and decides when to flush based on size/time
//! thresholds. No `Arc`, no atomics: each worker owns its own batcher, so the
//! export path never shares a buffer across tasks.

use crate::span::{SyntheticTrace, TraceBatch};
use std::time::Duration;
use tokio::time::Instant;

/// Accumulates traces until a size or age threshold is reached.
///
/// The caller drains via [`take_batch`](Self::take_batch) and owns delivery;
/// a taken batch is always whole; traces are never split across flushes.
pub struct TraceBatcher {
    pending: Vec<SyntheticTrace>,
    max_traces: usize,
    max_age: Duration,
    last_flush: Instant,
}

impl TraceBatcher {
    pub fn new(max_traces: usize, max_age: Duration) -> Self {
        Self {
            pending: Vec::new(),
            // A zero size limit would never flush by size; treat it as 1.
            max_traces: max_traces.max(1),
            max_age,
            last_flush: Instant::now(),
        }
    }

    pub fn add(&mut self, trace: SyntheticTrace) {
        self.pending.push(trace);
    }

    pub fn pending_traces(&self) -> usize {
        self.pending.len()
    }

    /// Whether the pending batch has reached its size or age threshold.
    pub fn should_flush(&self) -> bool {
        !self.pending.is_empty()
            && (self.pending.len() >= self.max_traces || self.last_flush.elapsed() >= self.max_age)
    }

    /// Takes all pending traces as one batch, or `None` when empty.
    pub fn take_batch(&mut self) -> Option<TraceBatch> {
        if self.pending.is_empty() {
            return None;
        }
        self.last_flush = Instant::now();
        Some(TraceBatch::with_traces(std::mem::take(&mut self.pending)))
    }
}
