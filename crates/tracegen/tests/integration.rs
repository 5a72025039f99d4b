use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tracegen::exporter::{ExportError, TraceExporter};
use tracegen::{
    AttributeValue, ScenarioConfig, TotalDuration, TraceBatch, WorkerPool, WorkerState,
};

/// Records every exported batch for verification.
struct RecordingExporter {
    batches: Mutex<Vec<TraceBatch>>,
}

impl RecordingExporter {
    fn new() -> Self {
        Self {
            batches: Mutex::new(Vec::new()),
        }
    }

    fn batch_count(&self) -> usize {
        self.batches.lock().unwrap().len()
    }

    fn trace_count(&self) -> usize {
        self.batches.lock().unwrap().iter().map(TraceBatch::trace_count).sum()
    }

    fn all_batches(&self) -> Vec<TraceBatch> {
        self.batches.lock().unwrap().clone()
    }
}

impl TraceExporter for RecordingExporter {
    async fn export(&self, batch: TraceBatch) -> Result<(), ExportError> {
        self.batches.lock().unwrap().push(batch);
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// Fails every export attempt.
struct AlwaysFailingExporter {
    attempts: AtomicU64,
}

impl AlwaysFailingExporter {
    fn new() -> Self {
        Self {
            attempts: AtomicU64::new(0),
        }
    }

    fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }
}

impl TraceExporter for AlwaysFailingExporter {
    async fn export(&self, _batch: TraceBatch) -> Result<(), ExportError> {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        Err(ExportError::Transport("connection refused".into()))
    }

    fn name(&self) -> &str {
        "always-failing"
    }
}

#[tokio::test]
async fn test_five_traces_batched_single_worker() {
    // NumTraces=5, NumChildSpans=2, NumSpanLinks=1, Batch=true on one worker
    let exporter = Arc::new(RecordingExporter::new());
    let config = ScenarioConfig::default()
        .with_workers(1)
        .with_rate(0.0)
        .with_num_traces(5)
        .with_num_child_spans(2)
        .with_num_span_links(1)
        .with_batch(true);

    let report = WorkerPool::new(config, exporter.clone()).unwrap().run().await;

    assert_eq!(report.traces_attempted, 5);
    assert_eq!(report.traces_delivered, 5);
    assert_eq!(report.spans_delivered, 15);
    assert_eq!(report.delivery_failures, 0);
    assert!(report.all_workers_completed());

    // Batched delivery: fewer calls than traces, every batch whole.
    assert!(exporter.batch_count() <= 5);
    assert_eq!(exporter.trace_count(), 5);

    for batch in exporter.all_batches() {
        for trace in &batch.traces {
            assert_eq!(trace.span_count(), 3, "1 root + 2 children");
            let root = trace.root().unwrap();
            assert!(root.is_root());
            for span in &trace.spans {
                assert_eq!(span.trace_id, trace.trace_id);
                assert_eq!(span.links.len(), 1);
                if !span.is_root() {
                    assert_eq!(span.parent_span_id, root.span_id);
                }
            }
        }
    }
}

#[tokio::test]
async fn test_unbatched_sends_one_trace_per_request() {
    let exporter = Arc::new(RecordingExporter::new());
    let config = ScenarioConfig::default()
        .with_rate(0.0)
        .with_num_traces(4)
        .with_batch(false);

    let report = WorkerPool::new(config, exporter.clone()).unwrap().run().await;

    assert_eq!(report.traces_delivered, 4);
    assert_eq!(exporter.batch_count(), 4);
    for batch in exporter.all_batches() {
        assert_eq!(batch.trace_count(), 1);
    }
}

#[tokio::test]
async fn test_multi_worker_counts_and_distinct_trace_ids() {
    let exporter = Arc::new(RecordingExporter::new());
    let config = ScenarioConfig::default()
        .with_workers(3)
        .with_rate(0.0)
        .with_num_traces(2);

    let report = WorkerPool::new(config, exporter.clone()).unwrap().run().await;

    // Per-worker count: 3 workers x 2 traces each
    assert_eq!(report.traces_delivered, 6);
    assert_eq!(exporter.trace_count(), 6);

    let mut ids: Vec<u128> = exporter
        .all_batches()
        .iter()
        .flat_map(|b| b.traces.iter().map(|t| t.trace_id))
        .collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 6, "trace ids must be fresh per build");
}

#[tokio::test]
async fn test_component_attributes_disabled() {
    let exporter = Arc::new(RecordingExporter::new());
    let config = ScenarioConfig::default()
        .with_rate(0.0)
        .with_num_traces(10)
        .with_component_id_attr_max(0);

    WorkerPool::new(config, exporter.clone()).unwrap().run().await;

    for batch in exporter.all_batches() {
        for trace in &batch.traces {
            for span in &trace.spans {
                assert!(!span.attributes.contains_key("componentId"));
                assert!(!span.attributes.contains_key("state"));
            }
        }
    }
}

#[tokio::test]
async fn test_component_state_frozen_without_change_probability() {
    let exporter = Arc::new(RecordingExporter::new());
    let config = ScenarioConfig::default()
        .with_rate(0.0)
        .with_num_traces(200)
        .with_num_child_spans(0)
        .with_component_id_attr_max(5)
        .with_change_probability(0);

    WorkerPool::new(config, exporter.clone()).unwrap().run().await;

    // The paired state value never changes for the same id within a run.
    let mut state_by_id: std::collections::HashMap<i64, i64> = std::collections::HashMap::new();
    let mut seen = 0;
    for batch in exporter.all_batches() {
        for trace in &batch.traces {
            for span in &trace.spans {
                let id = match span.attributes.get("componentId") {
                    Some(AttributeValue::Int(v)) => *v,
                    other => panic!("missing componentId attribute: {:?}", other),
                };
                assert!((0..5).contains(&id));
                let state = match span.attributes.get("state") {
                    Some(AttributeValue::Int(v)) => *v,
                    other => panic!("missing state attribute: {:?}", other),
                };
                let previous = state_by_id.entry(id).or_insert(state);
                assert_eq!(*previous, state, "state evolved for component {}", id);
                seen += 1;
            }
        }
    }
    assert_eq!(seen, 200);
}

#[tokio::test]
async fn test_cancellation_of_infinite_run() {
    let exporter = Arc::new(RecordingExporter::new());
    let config = ScenarioConfig::default()
        .with_workers(2)
        .with_rate(500.0)
        .with_num_traces(0)
        .with_total_duration(TotalDuration::Infinite);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let pool = WorkerPool::new(config, exporter.clone()).unwrap();
    let run = tokio::spawn(pool.run_with_shutdown(shutdown_rx));

    tokio::time::sleep(Duration::from_millis(100)).await;
    shutdown_tx.send(true).unwrap();

    // Workers must observe the signal at their next suspension point.
    let report = tokio::time::timeout(Duration::from_secs(2), run)
        .await
        .expect("workers did not stop promptly")
        .unwrap();

    assert_eq!(report.workers.len(), 2);
    for worker in &report.workers {
        assert_eq!(worker.state, WorkerState::Cancelled);
    }

    // Partial progress is reported exactly: the final drain delivers what was
    // built, and the recorded traces match the aggregate counters.
    assert_eq!(report.traces_delivered as usize, exporter.trace_count());
    assert_eq!(report.traces_attempted, report.traces_delivered);
    assert_eq!(report.delivery_failures, 0);
}

#[tokio::test]
async fn test_deadline_stops_duration_bound_run() {
    let exporter = Arc::new(RecordingExporter::new());
    let config = ScenarioConfig::default()
        .with_rate(100.0)
        .with_num_traces(0)
        .with_batch(false)
        .with_total_duration(TotalDuration::Finite(Duration::from_millis(150)));

    let pool = WorkerPool::new(config, exporter.clone()).unwrap();
    let report = tokio::time::timeout(Duration::from_secs(2), pool.run())
        .await
        .expect("deadline did not stop the run");

    assert!(report.traces_delivered > 0);
    for worker in &report.workers {
        assert_eq!(worker.state, WorkerState::Cancelled);
    }
}

#[tokio::test]
async fn test_delivery_failures_keep_worker_running() {
    let exporter = Arc::new(AlwaysFailingExporter::new());
    let config = ScenarioConfig::default()
        .with_rate(0.0)
        .with_num_traces(3)
        .with_batch(false);

    let report = WorkerPool::new(config, exporter.clone()).unwrap().run().await;

    // Failures are absorbed per-trace: counted, not fatal.
    assert!(report.all_workers_completed());
    assert_eq!(report.traces_attempted, 3);
    assert_eq!(report.traces_delivered, 0);
    assert_eq!(report.delivery_failures, 3);
    assert_eq!(exporter.attempts(), 3);
    assert!(report.workers[0].last_error.is_some());
}

#[tokio::test]
async fn test_consecutive_failures_promote_to_failed() {
    let exporter = Arc::new(AlwaysFailingExporter::new());
    let config = ScenarioConfig::default()
        .with_rate(0.0)
        .with_num_traces(100)
        .with_batch(false)
        .with_max_consecutive_failures(2);

    let report = WorkerPool::new(config, exporter.clone()).unwrap().run().await;

    assert!(report.any_worker_failed());
    assert_eq!(report.workers[0].state, WorkerState::Failed);
    // The worker stops at the threshold, well before the trace target.
    assert_eq!(report.delivery_failures, 2);
    assert_eq!(report.traces_attempted, 2);
}

#[tokio::test]
async fn test_rate_limiter_paces_the_run() {
    let exporter = Arc::new(RecordingExporter::new());
    let config = ScenarioConfig::default()
        .with_rate(50.0)
        .with_num_traces(5)
        .with_batch(false);

    let start = std::time::Instant::now();
    let report = WorkerPool::new(config, exporter).unwrap().run().await;
    let elapsed = start.elapsed();

    assert_eq!(report.traces_delivered, 5);
    // 5 permits at 20ms spacing, first immediate: at least ~80ms minus jitter.
    assert!(
        elapsed >= Duration::from_millis(60),
        "run finished too fast for the configured rate: {:?}",
        elapsed
    );
}
