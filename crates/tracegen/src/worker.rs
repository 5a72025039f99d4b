//! A single emission worker.
//!
//! Each worker drives its own loop of rate-limit wait, trace build, and
//! export, with its own limiter and batch buffer. The only state shared with
//! other workers is the component table inside the builder and the exporter
//! handle.

use crate::batcher::TraceBatcher;
use crate::component_state::ComponentStateTracker;
use crate::config::ScenarioConfig;
use crate::exporter::{ExportError, TraceExporterBoxed};
use crate::rate_limiter::{IntervalRateLimiter, RateLimiter};
use crate::span::{SpanStatus, TraceBatch};
use crate::trace_builder::SpanTreeBuilder;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, warn};

/// Per-worker lifecycle state.
///
/// Emission happens only in `Running`. `Cancelled` is entered when the
/// run-wide stop signal is observed; `Failed` only on a fatal condition (the
/// consecutive-failure policy). Ordinary delivery failures are counted and
/// keep the worker `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Running,
    Completed,
    Cancelled,
    Failed,
}

/// Outcome counters for one worker.
#[derive(Debug, Clone)]
pub struct WorkerStats {
    pub worker_id: usize,
    pub state: WorkerState,
    /// Traces built and submitted for delivery.
    pub traces_attempted: u64,
    /// Traces confirmed delivered by the exporter.
    pub traces_delivered: u64,
    pub spans_delivered: u64,
    /// Failed export calls (each may cover a whole batch).
    pub delivery_failures: u64,
    pub last_error: Option<String>,
    pub elapsed: Duration,
}

impl WorkerStats {
    pub fn new(worker_id: usize) -> Self {
        Self {
            worker_id,
            state: WorkerState::Idle,
            traces_attempted: 0,
            traces_delivered: 0,
            spans_delivered: 0,
            delivery_failures: 0,
            last_error: None,
            elapsed: Duration::ZERO,
        }
    }
}

pub(crate) struct Worker {
    id: usize,
    builder: SpanTreeBuilder,
    exporter: Arc<dyn TraceExporterBoxed>,
    limiter: IntervalRateLimiter,
    batcher: Option<TraceBatcher>,
    /// Per-worker trace target; zero means unbounded (duration or external
    /// signal stops the run).
    trace_target: u64,
    print_traces: bool,
    max_consecutive_failures: usize,
}

impl Worker {
    pub(crate) fn new(
        id: usize,
        config: &ScenarioConfig,
        status: SpanStatus,
        tracker: Arc<ComponentStateTracker>,
        exporter: Arc<dyn TraceExporterBoxed>,
        trace_target: u64,
    ) -> Self {
        Self {
            id,
            builder: SpanTreeBuilder::new(config, status, tracker),
            exporter,
            limiter: IntervalRateLimiter::from_rate(config.rate),
            batcher: config
                .batch
                .then(|| TraceBatcher::new(config.batch_size, config.batch_timeout)),
            trace_target,
            print_traces: config.print_traces,
            max_consecutive_failures: config.max_consecutive_failures,
        }
    }

    /// Runs the emission loop until the target count is reached or the stop
    /// signal fires, then drains any pending batch.
    pub(crate) async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) -> WorkerStats {
        let start = Instant::now();
        let mut stats = WorkerStats::new(self.id);
        stats.state = WorkerState::Running;
        let mut consecutive_failures = 0usize;
        let mut terminal = WorkerState::Completed;

        debug!(worker = self.id, trace_target = self.trace_target, "worker started");

        loop {
            if *shutdown_rx.borrow_and_update() {
                terminal = WorkerState::Cancelled;
                break;
            }
            if self.trace_target > 0 && stats.traces_attempted >= self.trace_target {
                break;
            }

            // The rate-limit wait must never outlive a stop request.
            tokio::select! {
                () = self.limiter.wait() => {}
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow_and_update() {
                        terminal = WorkerState::Cancelled;
                        break;
                    }
                    continue;
                }
            }

            let trace = self.builder.build(&mut rand::thread_rng());
            if self.print_traces {
                trace.print_summary();
            }
            stats.traces_attempted += 1;

            let ready = match self.batcher.as_mut() {
                Some(batcher) => {
                    batcher.add(trace);
                    if batcher.should_flush() {
                        batcher.take_batch()
                    } else {
                        None
                    }
                }
                None => Some(TraceBatch::from_trace(trace)),
            };

            if let Some(batch) = ready {
                match self.deliver(batch, &mut stats).await {
                    Ok(()) => consecutive_failures = 0,
                    Err(_) => {
                        consecutive_failures += 1;
                        if self.max_consecutive_failures > 0
                            && consecutive_failures >= self.max_consecutive_failures
                        {
                            terminal = WorkerState::Failed;
                            break;
                        }
                    }
                }
            }
        }

        // Drain on every exit path so partial progress is delivered and
        // counted, including on cancellation.
        let pending = self.batcher.as_mut().and_then(TraceBatcher::take_batch);
        if let Some(batch) = pending {
            let _ = self.deliver(batch, &mut stats).await;
        }

        stats.state = terminal;
        stats.elapsed = start.elapsed();
        debug!(
            worker = self.id,
            state = ?stats.state,
            attempted = stats.traces_attempted,
            delivered = stats.traces_delivered,
            failures = stats.delivery_failures,
            "worker stopped"
        );
        stats
    }

    async fn deliver(&self, batch: TraceBatch, stats: &mut WorkerStats) -> Result<(), ExportError> {
        let traces = batch.trace_count() as u64;
        let spans = batch.span_count() as u64;
        match self.exporter.export_boxed(batch).await {
            Ok(()) => {
                stats.traces_delivered += traces;
                stats.spans_delivered += spans;
                Ok(())
            }
            Err(e) => {
                stats.delivery_failures += 1;
                stats.last_error = Some(e.to_string());
                warn!(worker = self.id, error = %e, "trace export failed");
                Err(e)
            }
        }
    }
}
