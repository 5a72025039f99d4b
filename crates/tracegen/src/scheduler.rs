//! Worker pool scheduling and run aggregation.
//!
//! The pool validates the scenario once, spawns N independent workers, arms a
//! deadline for finite durations, and folds per-worker outcomes into a single
//! [`RunReport`] when every worker has stopped. A rejected configuration
//! never spawns a task.

use crate::component_state::ComponentStateTracker;
use crate::config::{ConfigError, ScenarioConfig};
use crate::exporter::{OtlpHttpExporter, TraceExporterBoxed};
use crate::span::SpanStatus;
use crate::worker::{Worker, WorkerState, WorkerStats};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Aggregate result of one run.
///
/// Counts are exact even on cancellation: partial progress is reported, never
/// silently dropped.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub traces_attempted: u64,
    pub traces_delivered: u64,
    pub spans_delivered: u64,
    pub delivery_failures: u64,
    pub elapsed: Duration,
    pub workers: Vec<WorkerStats>,
}

impl RunReport {
    fn from_workers(mut workers: Vec<WorkerStats>, elapsed: Duration) -> Self {
        workers.sort_by_key(|w| w.worker_id);
        Self {
            traces_attempted: workers.iter().map(|w| w.traces_attempted).sum(),
            traces_delivered: workers.iter().map(|w| w.traces_delivered).sum(),
            spans_delivered: workers.iter().map(|w| w.spans_delivered).sum(),
            delivery_failures: workers.iter().map(|w| w.delivery_failures).sum(),
            elapsed,
            workers,
        }
    }

    pub fn all_workers_completed(&self) -> bool {
        self.workers.iter().all(|w| w.state == WorkerState::Completed)
    }

    pub fn any_worker_failed(&self) -> bool {
        self.workers.iter().any(|w| w.state == WorkerState::Failed)
    }

    /// Delivered traces per second of wall time.
    pub fn effective_rate(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.traces_delivered as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }
}

/// Owns N worker loops over one shared scenario.
pub struct WorkerPool {
    config: ScenarioConfig,
    status: SpanStatus,
    tracker: Arc<ComponentStateTracker>,
    exporter: Arc<dyn TraceExporterBoxed>,
}

impl WorkerPool {
    /// Validates the scenario and prepares the pool with the given exporter.
    ///
    /// The status code is parsed here, once; component state is reset for the
    /// run.
    pub fn new(
        config: ScenarioConfig,
        exporter: Arc<dyn TraceExporterBoxed>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let status = config.parsed_status()?;
        let tracker = Arc::new(ComponentStateTracker::new(
            config.component_id_attr_max,
            config.change_probability,
        ));
        Ok(Self {
            config,
            status,
            tracker,
            exporter,
        })
    }

    /// Convenience constructor wiring the scenario's endpoint settings into
    /// an [`OtlpHttpExporter`].
    pub fn with_otlp_http(config: ScenarioConfig) -> Result<Self, ConfigError> {
        let exporter = OtlpHttpExporter::new(
            &config.endpoint,
            &config.http_path,
            config.propagate_context,
            config.export_timeout,
        )
        .map_err(|e| ConfigError::ExporterSetup(e.to_string()))?;
        Self::new(config, Arc::new(exporter))
    }

    /// Runs to completion: until every worker hits its stop condition, or,
    /// for a finite duration, until the deadline fires.
    ///
    /// An infinite scenario with a zero trace count never stops on its own;
    /// use [`run_with_shutdown`](Self::run_with_shutdown) for those.
    pub async fn run(self) -> RunReport {
        self.run_inner(None).await
    }

    /// Runs with an external stop signal in addition to the scenario's own
    /// stop conditions. Send `true` on the paired sender to cancel; every
    /// worker observes the signal at its next suspension point.
    pub async fn run_with_shutdown(self, shutdown: watch::Receiver<bool>) -> RunReport {
        self.run_inner(Some(shutdown)).await
    }

    async fn run_inner(self, external: Option<watch::Receiver<bool>>) -> RunReport {
        let start = Instant::now();
        let workers = self.config.workers.max(1);

        // A finite positive duration governs the run; the per-worker count is
        // ignored in that case.
        let duration_bound = self.config.total_duration.bounds_run();
        let trace_target = if duration_bound.is_some() {
            0
        } else {
            self.config.num_traces as u64
        };

        info!(
            workers,
            rate = self.config.rate,
            trace_target,
            exporter = self.exporter.name(),
            "starting run"
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let shutdown_tx = Arc::new(shutdown_tx);

        let mut tasks: JoinSet<WorkerStats> = JoinSet::new();
        for id in 0..workers {
            let worker = Worker::new(
                id,
                &self.config,
                self.status,
                Arc::clone(&self.tracker),
                Arc::clone(&self.exporter),
                trace_target,
            );
            tasks.spawn(worker.run(shutdown_rx.clone()));
        }
        drop(shutdown_rx);

        let deadline_task = duration_bound.map(|duration| {
            let tx = Arc::clone(&shutdown_tx);
            tokio::spawn(async move {
                tokio::time::sleep(duration).await;
                debug!(?duration, "total duration elapsed, stopping workers");
                let _ = tx.send(true);
            })
        });

        let forward_task = external.map(|mut ext| {
            let tx = Arc::clone(&shutdown_tx);
            tokio::spawn(async move {
                loop {
                    if *ext.borrow_and_update() {
                        let _ = tx.send(true);
                        break;
                    }
                    if ext.changed().await.is_err() {
                        break;
                    }
                }
            })
        });

        let mut stats = Vec::with_capacity(workers);
        while let Some(result) = tasks.join_next().await {
            match result {
                Ok(s) => stats.push(s),
                Err(e) => warn!(error = %e, "worker task panicked"),
            }
        }

        if let Some(task) = deadline_task {
            task.abort();
        }
        if let Some(task) = forward_task {
            task.abort();
        }

        let report = RunReport::from_workers(stats, start.elapsed());
        info!(
            attempted = report.traces_attempted,
            delivered = report.traces_delivered,
            failures = report.delivery_failures,
            elapsed = ?report.elapsed,
            "run finished"
        );
        report
    }
}
