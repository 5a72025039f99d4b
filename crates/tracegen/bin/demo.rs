//! Trace generation demo.
//!
//! Runs a small scenario against the stdout exporter: four workers emitting
//! an unbounded stream with component-state churn enabled, stopped by
//! Ctrl-C or a ten-second timeout.
//!
//! Run with: `cargo run -p tracegen --bin demo`

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracegen::{
    RetryingExporter, ScenarioConfig, StdoutExporter, TotalDuration, WorkerPool, WorkerState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = ScenarioConfig::default()
        .with_workers(4)
        .with_rate(20.0)
        .with_total_duration(TotalDuration::Infinite)
        .with_num_traces(0)
        .with_num_child_spans(2)
        .with_num_span_links(1)
        .with_component_id_attr_max(8)
        .with_change_probability(10)
        .with_static_attr_value("demo")
        .with_print_traces(false);

    println!("=== Synthetic Trace Generator Demo ===\n");
    println!("Workers: {}", config.workers);
    println!("Rate: {} traces/sec per worker", config.rate);
    println!("Shape: 1 root + {} children, {} links/span\n", config.num_child_spans, config.num_span_links);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let exporter = Arc::new(RetryingExporter::with_defaults(StdoutExporter::new(true)));
    let pool = WorkerPool::new(config, exporter)?;
    let run = tokio::spawn(pool.run_with_shutdown(shutdown_rx));

    println!("Generating. Press Ctrl+C to stop, or wait 10 seconds...\n");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            println!("\nReceived Ctrl+C, stopping workers...");
        }
        () = tokio::time::sleep(Duration::from_secs(10)) => {
            println!("\nTimeout reached, stopping workers...");
        }
    }
    shutdown_tx.send(true)?;

    let report = run.await?;

    println!("\n=== Run Summary ===");
    println!("Traces attempted: {}", report.traces_attempted);
    println!("Traces delivered: {}", report.traces_delivered);
    println!("Spans delivered:  {}", report.spans_delivered);
    println!("Failures:         {}", report.delivery_failures);
    println!("Elapsed:          {:.2}s", report.elapsed.as_secs_f64());
    println!("Throughput:       {:.1} traces/sec", report.effective_rate());
    for worker in &report.workers {
        println!(
            "  worker {}: {:?}, {} attempted, {} delivered in {:.2}s",
            worker.worker_id,
            worker.state,
            worker.traces_attempted,
            worker.traces_delivered,
            worker.elapsed.as_secs_f64()
        );
    }

    if report.workers.iter().all(|w| w.state == WorkerState::Cancelled) {
        println!("\nAll workers stopped cleanly.");
    }
    Ok(())
}
