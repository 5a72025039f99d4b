//! Trace delivery.
//!
//! The wire encoding is a collaborator capability: exporters serialize the
//! batch and send it, nothing more. [`OtlpHttpExporter`] posts JSON to a
//! collector-style endpoint; the stdout and null exporters exist for
//! diagnostics and tests.

use crate::span::TraceBatch;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;

/// Error types for trace export operations.
///
/// Every variant is recoverable at the worker level: a failed attempt is
/// counted and the worker keeps running unless a consecutive-failure policy
/// promotes it to fatal.
#[derive(Debug, Error, Clone)]
pub enum ExportError {
    /// Transport-layer error (connection refused, DNS, TLS).
    #[error("transport error: {0}")]
    Transport(String),
    /// The batch could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// The endpoint answered with a non-success status.
    #[error("endpoint rejected batch: HTTP {0}")]
    Rejected(u16),
    /// Export operation timed out.
    #[error("export operation timed out")]
    Timeout,
    /// All retry attempts exhausted.
    #[error("all retry attempts exhausted after {attempts} tries")]
    RetriesExhausted { attempts: u32 },
}

/// Trait for delivering trace batches to a backend.
///
/// # Note on object safety
///
/// The `impl Future` return type is not object-safe. For dynamic dispatch,
/// use [`TraceExporterBoxed`]; the blanket impl covers every exporter.
pub trait TraceExporter: Send + Sync {
    /// Delivers a batch of traces.
    fn export(&self, batch: TraceBatch) -> impl Future<Output = Result<(), ExportError>> + Send;

    /// Returns the exporter name for diagnostics.
    fn name(&self) -> &str;
}

/// Object-safe version of [`TraceExporter`] for dynamic dispatch.
pub trait TraceExporterBoxed: Send + Sync {
    fn export_boxed(
        &self,
        batch: TraceBatch,
    ) -> Pin<Box<dyn Future<Output = Result<(), ExportError>> + Send + '_>>;

    fn name(&self) -> &str;
}

impl<T: TraceExporter> TraceExporterBoxed for T {
    fn export_boxed(
        &self,
        batch: TraceBatch,
    ) -> Pin<Box<dyn Future<Output = Result<(), ExportError>> + Send + '_>> {
        Box::pin(self.export(batch))
    }

    fn name(&self) -> &str {
        TraceExporter::name(self)
    }
}

/// HTTP exporter posting JSON trace batches to `endpoint + path`.
///
/// When context propagation is enabled, the first root span's context is
/// marshalled into a W3C `traceparent` request header so a receiving endpoint
/// can correlate the call; when disabled, no propagation headers are sent.
pub struct OtlpHttpExporter {
    client: reqwest::Client,
    url: String,
    propagate_context: bool,
}

impl OtlpHttpExporter {
    pub fn new(
        endpoint: &str,
        http_path: &str,
        propagate_context: bool,
        timeout: Duration,
    ) -> Result<Self, ExportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExportError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            url: format!("{}{}", endpoint.trim_end_matches('/'), http_path),
            propagate_context,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// W3C trace-context header for the batch, from its first root span.
    fn traceparent(batch: &TraceBatch) -> Option<String> {
        let root = batch.traces.first().and_then(|t| t.root())?;
        Some(format!("00-{:032x}-{:016x}-01", root.trace_id, root.span_id))
    }
}

impl TraceExporter for OtlpHttpExporter {
    async fn export(&self, batch: TraceBatch) -> Result<(), ExportError> {
        let body =
            serde_json::to_vec(&batch).map_err(|e| ExportError::Serialization(e.to_string()))?;

        let mut request = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);

        if self.propagate_context {
            if let Some(header) = Self::traceparent(&batch) {
                request = request.header("traceparent", header);
            }
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ExportError::Timeout
            } else {
                ExportError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExportError::Rejected(status.as_u16()));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "otlp-http"
    }
}

/// Stdout exporter for diagnostics and demos.
pub struct StdoutExporter {
    verbose: bool,
}

impl StdoutExporter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl TraceExporter for StdoutExporter {
    async fn export(&self, batch: TraceBatch) -> Result<(), ExportError> {
        if self.verbose {
            println!(
                "=== Exporting {} traces ({} spans) ===",
                batch.trace_count(),
                batch.span_count()
            );
            for trace in &batch.traces {
                trace.print_summary();
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "stdout"
    }
}

/// Null exporter that discards all traces.
pub struct NullExporter;

impl NullExporter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NullExporter {
    fn default() -> Self {
        Self::new()
    }
}

impl TraceExporter for NullExporter {
    async fn export(&self, _batch: TraceBatch) -> Result<(), ExportError> {
        Ok(())
    }

    fn name(&self) -> &str {
        "null"
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (0 = no retries, just the initial
    /// attempt).
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Cap on the exponential growth of the delay.
    pub max_delay: Duration,
    /// Multiplier applied to the delay on each retry.
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let delay_ms = self.initial_delay.as_millis() as f64
            * self.backoff_multiplier.powi((attempt - 1) as i32);
        Duration::from_millis(delay_ms as u64).min(self.max_delay)
    }
}

/// Wraps any exporter with retry-on-failure and exponential backoff.
///
/// Implements the delivery contract's per-worker "retry" policy; leave it out
/// of the stack for "skip" semantics.
pub struct RetryingExporter<E: TraceExporter> {
    inner: E,
    config: RetryConfig,
}

impl<E: TraceExporter> RetryingExporter<E> {
    pub fn new(inner: E, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    pub fn with_defaults(inner: E) -> Self {
        Self::new(inner, RetryConfig::default())
    }
}

impl<E: TraceExporter> TraceExporter for RetryingExporter<E> {
    async fn export(&self, batch: TraceBatch) -> Result<(), ExportError> {
        let max_attempts = self.config.max_retries + 1;

        for attempt in 0..max_attempts {
            let delay = self.config.delay_for_attempt(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            match self.inner.export(batch.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::debug!(
                        attempt,
                        max_attempts,
                        error = %e,
                        "export attempt failed"
                    );
                }
            }
        }

        Err(ExportError::RetriesExhausted {
            attempts: max_attempts,
        })
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

/// Test exporter that records all exported batches for verification.
#[cfg(test)]
pub struct TestExporter {
    batches: std::sync::Mutex<Vec<TraceBatch>>,
}

#[cfg(test)]
impl TestExporter {
    pub fn new() -> Self {
        Self {
            batches: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn batch_count(&self) -> usize {
        self.batches.lock().unwrap().len()
    }

    pub fn trace_count(&self) -> usize {
        self.batches.lock().unwrap().iter().map(TraceBatch::trace_count).sum()
    }

    pub fn all_batches(&self) -> Vec<TraceBatch> {
        self.batches.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl TraceExporter for TestExporter {
    async fn export(&self, batch: TraceBatch) -> Result<(), ExportError> {
        self.batches.lock().unwrap().push(batch);
        Ok(())
    }

    fn name(&self) -> &str {
        "test"
    }
}
