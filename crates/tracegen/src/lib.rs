//! Synthetic OpenTelemetry Trace Load Generator
//!
//! Produces a controlled stream of synthetic trace data (root spans, child
//! spans, span links, attributes) and delivers it to a collector-style
//! endpoint at a requested rate, for a requested duration or count, across N
//! concurrent workers. Every trace is synthetic and self-contained; the crate
//! is a load generator, not an OTLP SDK.

pub mod batcher;
pub mod component_state;
pub mod config;
pub mod exporter;
pub mod rate_limiter;
pub mod scheduler;
pub mod span;
pub mod trace_builder;
pub mod worker;

// Re-export main types
pub use batcher::TraceBatcher;
pub use component_state::{ComponentSample, ComponentStateTracker};
pub use config::{ConfigError, ScenarioConfig, TotalDuration};
pub use exporter::{
    ExportError, NullExporter, OtlpHttpExporter, RetryConfig, RetryingExporter, StdoutExporter,
    TraceExporter, TraceExporterBoxed,
};
pub use rate_limiter::{IntervalRateLimiter, RateLimiter, RateLimiterBoxed};
pub use scheduler::{RunReport, WorkerPool};
pub use span::{AttributeValue, Span, SpanKind, SpanLink, SpanStatus, SyntheticTrace, TraceBatch};
pub use trace_builder::SpanTreeBuilder;
pub use worker::{WorkerState, WorkerStats};
