//! Synthetic span and trace data model.
//!
//! The model is OpenTelemetry-compatible (128-bit trace ids, 64-bit span ids,
//! typed attributes, span links) but carries no SDK machinery: every value is
//! plain serializable data produced by the builder and handed to an exporter.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Span kind, mirroring the OpenTelemetry enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpanKind {
    Internal,
    Server,
    Client,
    Producer,
    Consumer,
}

/// Span status code.
///
/// Parsed once at startup from the scenario's status-code string; never
/// re-parsed per trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SpanStatus {
    #[default]
    Unset,
    Error,
    Ok,
}

impl SpanStatus {
    /// Parses a status code given as a name (`Unset`/`Error`/`Ok`) or the
    /// equivalent integer string (`0`/`1`/`2`). Returns `None` for anything
    /// else.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "0" | "Unset" => Some(Self::Unset),
            "1" | "Error" => Some(Self::Error),
            "2" | "Ok" => Some(Self::Ok),
            _ => None,
        }
    }
}

/// Typed attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    String(String),
    Int(i64),
    Double(f64),
    Bool(bool),
}

/// A reference to another (trace id, span id) pair.
///
/// Link targets are synthetic: they are freshly generated identifiers that do
/// not resolve to real spans, and exist to exercise link-cardinality handling
/// downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanLink {
    pub trace_id: u128,
    pub span_id: u64,
}

/// A single timed operation within a trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub trace_id: u128,
    pub span_id: u64,
    /// Zero for root spans.
    pub parent_span_id: u64,
    pub name: String,
    pub kind: SpanKind,
    pub start_time_unix_nano: u64,
    pub end_time_unix_nano: u64,
    pub status: SpanStatus,
    pub attributes: HashMap<String, AttributeValue>,
    pub links: Vec<SpanLink>,
}

impl Span {
    /// Creates a span starting now with zero elapsed time.
    pub fn new(trace_id: u128, span_id: u64, parent_span_id: u64, name: String, kind: SpanKind) -> Self {
        let now = unix_nanos_now();
        Self {
            trace_id,
            span_id,
            parent_span_id,
            name,
            kind,
            start_time_unix_nano: now,
            end_time_unix_nano: now,
            status: SpanStatus::Unset,
            attributes: HashMap::new(),
            links: Vec::new(),
        }
    }

    /// Sets or replaces an attribute.
    pub fn set_attribute(&mut self, key: String, value: AttributeValue) {
        self.attributes.insert(key, value);
    }

    /// Stamps the span's elapsed time: end = start + `duration`.
    pub fn set_duration(&mut self, duration: Duration) {
        self.end_time_unix_nano = self.start_time_unix_nano + duration.as_nanos() as u64;
    }

    pub fn duration_nanos(&self) -> u64 {
        self.end_time_unix_nano.saturating_sub(self.start_time_unix_nano)
    }

    pub fn is_root(&self) -> bool {
        self.parent_span_id == 0
    }
}

/// One synthetic unit of work: a root span plus its direct children, all
/// sharing a single trace id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticTrace {
    pub trace_id: u128,
    /// Root first, children after.
    pub spans: Vec<Span>,
}

impl SyntheticTrace {
    pub fn root(&self) -> Option<&Span> {
        self.spans.first()
    }

    pub fn span_count(&self) -> usize {
        self.spans.len()
    }

    /// Prints a human-readable summary to stdout.
    ///
    /// Purely diagnostic; does not alter emitted data or timing.
    pub fn print_summary(&self) {
        println!("=== Trace {:032x} ({} spans) ===", self.trace_id, self.spans.len());
        for span in &self.spans {
            println!(
                "Span: trace_id={:032x} span_id={:016x} parent={:016x} name={} duration={}ns status={:?} links={}",
                span.trace_id,
                span.span_id,
                span.parent_span_id,
                span.name,
                span.duration_nanos(),
                span.status,
                span.links.len()
            );
        }
    }
}

/// An ordered group of traces flushed together to reduce transport overhead.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraceBatch {
    pub traces: Vec<SyntheticTrace>,
}

impl TraceBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_traces(traces: Vec<SyntheticTrace>) -> Self {
        Self { traces }
    }

    pub fn from_trace(trace: SyntheticTrace) -> Self {
        Self { traces: vec![trace] }
    }

    pub fn add(&mut self, trace: SyntheticTrace) {
        self.traces.push(trace);
    }

    pub fn trace_count(&self) -> usize {
        self.traces.len()
    }

    pub fn span_count(&self) -> usize {
        self.traces.iter().map(SyntheticTrace::span_count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }
}

fn unix_nanos_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_nanos() as u64)
}
