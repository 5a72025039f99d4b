//! Span-tree construction.
//!
//! One builder invocation produces one complete synthetic trace: a root span,
//! its direct children, and the configured attribute/link decoration. Trace
//! shape is a single-level tree: every child's parent is the root.

use crate::component_state::{ComponentSample, ComponentStateTracker};
use crate::config::ScenarioConfig;
use crate::span::{AttributeValue, Span, SpanKind, SpanLink, SpanStatus, SyntheticTrace};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

const ROOT_SPAN_NAME: &str = "parent";

/// Builds one [`SyntheticTrace`] per invocation from a validated scenario.
///
/// The status code is parsed once at pool construction and passed in here;
/// the builder never re-parses per trace.
pub struct SpanTreeBuilder {
    num_child_spans: usize,
    num_span_links: usize,
    span_duration: Duration,
    status: SpanStatus,
    add_trace_id_attr: bool,
    static_attr_value: Option<String>,
    tracker: Arc<ComponentStateTracker>,
}

impl SpanTreeBuilder {
    pub fn new(
        config: &ScenarioConfig,
        status: SpanStatus,
        tracker: Arc<ComponentStateTracker>,
    ) -> Self {
        Self {
            num_child_spans: config.num_child_spans,
            num_span_links: config.num_span_links,
            span_duration: config.span_duration,
            status,
            add_trace_id_attr: config.add_trace_id_attr,
            static_attr_value: if config.static_attr_value.is_empty() {
                None
            } else {
                Some(config.static_attr_value.clone())
            },
            tracker,
        }
    }

    /// Builds a trace: fresh random trace id, a client-kind root calling
    /// server-kind children, the same attribute policy applied to every span.
    pub fn build<R: Rng>(&self, rng: &mut R) -> SyntheticTrace {
        let trace_id: u128 = rng.gen();
        let root_span_id: u64 = rng.gen();

        // One component sample per trace; all spans in the trace share it.
        let component = self.tracker.sample(rng);
        // Link targets must stay distinct across the whole build round.
        let mut used_links: Vec<SpanLink> = Vec::new();

        let mut spans = Vec::with_capacity(1 + self.num_child_spans);

        let mut root = Span::new(
            trace_id,
            root_span_id,
            0,
            ROOT_SPAN_NAME.to_string(),
            SpanKind::Client,
        );
        self.decorate(&mut root, component, &mut used_links, rng);
        spans.push(root);

        for i in 0..self.num_child_spans {
            let mut child = Span::new(
                trace_id,
                rng.gen(),
                root_span_id,
                format!("child-{i}"),
                SpanKind::Server,
            );
            self.decorate(&mut child, component, &mut used_links, rng);
            spans.push(child);
        }

        SyntheticTrace { trace_id, spans }
    }

    fn decorate<R: Rng>(
        &self,
        span: &mut Span,
        component: Option<ComponentSample>,
        used_links: &mut Vec<SpanLink>,
        rng: &mut R,
    ) {
        span.status = self.status;
        span.set_duration(self.span_duration);

        if self.add_trace_id_attr {
            span.set_attribute(
                "traceId".to_string(),
                AttributeValue::String(format!("{:032x}", span.trace_id)),
            );
        }
        if let Some(value) = &self.static_attr_value {
            span.set_attribute("static".to_string(), AttributeValue::String(value.clone()));
        }
        if let Some(sample) = component {
            span.set_attribute("componentId".to_string(), AttributeValue::Int(sample.id as i64));
            span.set_attribute("state".to_string(), AttributeValue::Int(sample.state as i64));
        }

        for _ in 0..self.num_span_links {
            span.links.push(fresh_link(used_links, rng));
        }
    }
}

/// Synthesizes a link target not seen earlier in this build round.
fn fresh_link<R: Rng>(used: &mut Vec<SpanLink>, rng: &mut R) -> SpanLink {
    loop {
        let link = SpanLink {
            trace_id: rng.gen(),
            span_id: rng.gen(),
        };
        if !used.contains(&link) {
            used.push(link);
            return link;
        }
    }
}
