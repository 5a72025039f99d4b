//! Scenario configuration and validation.

use crate::span::SpanStatus;
use std::time::Duration;
use thiserror::Error;

/// Errors detected before any worker starts.
///
/// A configuration error is fatal: the run aborts with no partial emission.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The run would have no termination condition and no explicit count.
    #[error("either `num_traces` or `total_duration` must be greater than 0")]
    NoStopCondition,

    /// The status-code string is neither a name nor an equivalent integer.
    #[error("unrecognized status code {0:?}, expected one of (Unset, Error, Ok) or (0, 1, 2)")]
    InvalidStatusCode(String),

    /// The exporter could not be constructed from the scenario's endpoint
    /// settings.
    #[error("exporter setup failed: {0}")]
    ExporterSetup(String),
}

/// Total run duration: a finite bound or "run forever until told to stop".
///
/// A tagged value rather than an overloaded numeric sentinel, so the
/// stop-condition check stays unambiguous.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TotalDuration {
    Finite(Duration),
    Infinite,
}

impl TotalDuration {
    pub fn is_infinite(&self) -> bool {
        matches!(self, Self::Infinite)
    }

    /// Returns the deadline iff this duration bounds the run (finite and
    /// positive). `Finite(0)` bounds nothing and leaves the trace count in
    /// charge.
    pub fn bounds_run(&self) -> Option<Duration> {
        match self {
            Self::Finite(d) if !d.is_zero() => Some(*d),
            _ => None,
        }
    }
}

/// Immutable parameter set for one load-generation run.
///
/// Validated once before any worker starts; a `ScenarioConfig` that fails
/// [`validate`](Self::validate) is never run. Out-of-range numeric inputs are
/// clamped at construction (the setters) rather than rejected, so downstream
/// builders never see negative counts or rates.
#[derive(Debug, Clone)]
pub struct ScenarioConfig {
    /// Number of concurrent workers.
    pub workers: usize,
    /// Traces per second, per worker. Zero means unlimited.
    ///
    /// The rate limiter is replicated per worker, so aggregate throughput
    /// scales as `rate * workers`.
    pub rate: f64,
    /// Total run duration. When finite and positive it governs the run and
    /// `num_traces` is ignored.
    pub total_duration: TotalDuration,
    /// Number of traces to generate in each worker. Zero means "rely on the
    /// duration".
    pub num_traces: usize,
    /// Child spans generated under each root span.
    pub num_child_spans: usize,
    /// Span links generated for each span.
    pub num_span_links: usize,
    /// Elapsed time stamped on every generated span.
    pub span_duration: Duration,
    /// Status code for every span: a name (`Unset`/`Error`/`Ok`) or the
    /// equivalent integer string (`0`/`1`/`2`).
    pub status_code: String,
    /// Accumulate traces and flush them together instead of one request per
    /// trace.
    pub batch: bool,
    /// Marshal trace context into a `traceparent` header on export requests.
    pub propagate_context: bool,
    /// Add the trace id as an attribute to each span.
    pub add_trace_id_attr: bool,
    /// When non-zero, spans carry a `componentId` attribute with a random
    /// integer in `[0, max)`.
    pub component_id_attr_max: u64,
    /// When non-zero, a component's state changes with probability `1/N` per
    /// trace. Zero disables state evolution entirely.
    pub change_probability: u64,
    /// When non-empty, spans carry a `static` attribute with this value.
    pub static_attr_value: String,
    /// Echo every built trace to stdout. Diagnostic only.
    pub print_traces: bool,
    /// Exporter endpoint, e.g. `http://localhost:4318`.
    pub endpoint: String,
    /// URL path appended to the endpoint.
    pub http_path: String,
    /// Per-request export timeout.
    pub export_timeout: Duration,
    /// Traces accumulated before a batch flush.
    pub batch_size: usize,
    /// Maximum age of a pending batch before it is flushed regardless of
    /// size.
    pub batch_timeout: Duration,
    /// When non-zero, a worker that sees this many delivery failures in a row
    /// stops as failed. Zero disables the policy; failures are counted and
    /// the worker keeps running.
    pub max_consecutive_failures: usize,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            rate: 1.0,
            total_duration: TotalDuration::Infinite,
            num_traces: 1,
            num_child_spans: 1,
            num_span_links: 0,
            span_duration: Duration::from_micros(123),
            status_code: "0".to_string(),
            batch: true,
            propagate_context: false,
            add_trace_id_attr: false,
            component_id_attr_max: 0,
            change_probability: 0,
            static_attr_value: String::new(),
            print_traces: false,
            endpoint: "http://localhost:4318".to_string(),
            http_path: "/v1/traces".to_string(),
            export_timeout: Duration::from_secs(5),
            batch_size: 100,
            batch_timeout: Duration::from_secs(5),
            max_consecutive_failures: 0,
        }
    }
}

impl ScenarioConfig {
    /// Validates the scenario parameters.
    ///
    /// Fails when the run would never terminate on its own and has no
    /// explicit count, or when the status-code string does not parse. All
    /// other fields accept any value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.total_duration.is_infinite()
            && self.total_duration.bounds_run().is_none()
            && self.num_traces == 0
        {
            return Err(ConfigError::NoStopCondition);
        }
        self.parsed_status().map(|_| ())
    }

    /// Parses the configured status code, once, at startup.
    pub fn parsed_status(&self) -> Result<SpanStatus, ConfigError> {
        SpanStatus::parse(&self.status_code)
            .ok_or_else(|| ConfigError::InvalidStatusCode(self.status_code.clone()))
    }

    /// Sets the worker count (clamped to at least 1).
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Sets the per-worker rate. Values at or below zero mean unlimited.
    pub fn with_rate(mut self, rate: f64) -> Self {
        self.rate = if rate.is_finite() { rate.max(0.0) } else { 0.0 };
        self
    }

    pub fn with_total_duration(mut self, total_duration: TotalDuration) -> Self {
        self.total_duration = total_duration;
        self
    }

    pub fn with_num_traces(mut self, num_traces: usize) -> Self {
        self.num_traces = num_traces;
        self
    }

    pub fn with_num_child_spans(mut self, num_child_spans: usize) -> Self {
        self.num_child_spans = num_child_spans;
        self
    }

    pub fn with_num_span_links(mut self, num_span_links: usize) -> Self {
        self.num_span_links = num_span_links;
        self
    }

    pub fn with_span_duration(mut self, span_duration: Duration) -> Self {
        self.span_duration = span_duration;
        self
    }

    pub fn with_status_code(mut self, status_code: impl Into<String>) -> Self {
        self.status_code = status_code.into();
        self
    }

    pub fn with_batch(mut self, batch: bool) -> Self {
        self.batch = batch;
        self
    }

    pub fn with_propagate_context(mut self, propagate_context: bool) -> Self {
        self.propagate_context = propagate_context;
        self
    }

    pub fn with_add_trace_id_attr(mut self, add_trace_id_attr: bool) -> Self {
        self.add_trace_id_attr = add_trace_id_attr;
        self
    }

    pub fn with_component_id_attr_max(mut self, max: u64) -> Self {
        self.component_id_attr_max = max;
        self
    }

    pub fn with_change_probability(mut self, change_probability: u64) -> Self {
        self.change_probability = change_probability;
        self
    }

    pub fn with_static_attr_value(mut self, value: impl Into<String>) -> Self {
        self.static_attr_value = value.into();
        self
    }

    pub fn with_print_traces(mut self, print_traces: bool) -> Self {
        self.print_traces = print_traces;
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_http_path(mut self, http_path: impl Into<String>) -> Self {
        self.http_path = http_path.into();
        self
    }

    pub fn with_max_consecutive_failures(mut self, max: usize) -> Self {
        self.max_consecutive_failures = max;
        self
    }
}
