//! Tools to instrument MongoDB operations with tracing data.
//!
//! Hooks talk to a small [`Tracer`] abstraction rather than to OpenTelemetry directly
//! so any span backend can be plugged in and tests can record what hooks do.
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use opentelemetry::global::BoxedTracer;
use opentelemetry::trace::SpanKind;
use opentelemetry::trace::Status;
use opentelemetry::trace::TraceContextExt;
use opentelemetry::trace::Tracer as _;
use opentelemetry::Context;
use opentelemetry::KeyValue;

use crate::constants::TRACER_NAME;

mod install;
mod propagation;

pub use self::install::install;
pub use self::install::sampler;
pub use self::install::TracingGuard;
pub use self::propagation::child_span_from_trace_string;
pub use self::propagation::context_from_trace_string;
pub use self::propagation::trace_string;

/// Key/value pair logged on a span.
pub type LogField = (&'static str, String);

/// Span opened for an operation.
pub trait Span: Send + Sync {
    /// Attach a tag to the span.
    fn set_tag(&self, key: &'static str, value: String);

    /// Log a set of structured fields on the span.
    fn log_fields(&self, fields: Vec<LogField>);

    /// Mark the span as failed.
    fn set_error(&self, message: &str);

    /// Finish the span.
    fn finish(&self);

    /// Trace context to propagate to work done on behalf of this span.
    fn propagate(&self, parent: &Context) -> Context;
}

/// Source of operation spans.
pub trait Tracer: Send + Sync {
    /// Start a new span as a child of the given parent context.
    fn start_span(&self, name: String, parent: &Context) -> Box<dyn Span>;
}

/// Span wrapper guaranteeing the span is finished at most once.
///
/// Tags and fields added after the span is finished are discarded.
pub struct TrackedSpan {
    inner: Box<dyn Span>,
    finished: AtomicBool,
}

/// Shared handle to a span that may outlive the call that opened it.
pub type SpanHandle = Arc<TrackedSpan>;

impl TrackedSpan {
    pub fn new(inner: Box<dyn Span>) -> TrackedSpan {
        TrackedSpan {
            inner,
            finished: AtomicBool::new(false),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    pub fn set_tag(&self, key: &'static str, value: String) {
        if !self.is_finished() {
            self.inner.set_tag(key, value);
        }
    }

    pub fn log_fields(&self, fields: Vec<LogField>) {
        if !self.is_finished() {
            self.inner.log_fields(fields);
        }
    }

    pub fn set_error(&self, message: &str) {
        if !self.is_finished() {
            self.inner.set_error(message);
        }
    }

    /// Finish the span, returning `false` if it was already finished.
    pub fn finish(&self) -> bool {
        if self.finished.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.inner.finish();
        true
    }

    pub fn propagate(&self, parent: &Context) -> Context {
        self.inner.propagate(parent)
    }
}

/// [`Tracer`] backed by the process global OpenTelemetry tracer provider.
pub struct OtelTracer {
    tracer: BoxedTracer,
}

impl OtelTracer {
    /// Tracer from the global provider.
    ///
    /// Install a provider with [`install`] or configure one in the application before
    /// creating the tracer, otherwise spans are discarded by the no-op provider.
    pub fn global() -> OtelTracer {
        OtelTracer {
            tracer: opentelemetry::global::tracer(TRACER_NAME),
        }
    }
}

impl Default for OtelTracer {
    fn default() -> Self {
        OtelTracer::global()
    }
}

impl Tracer for OtelTracer {
    fn start_span(&self, name: String, parent: &Context) -> Box<dyn Span> {
        let mut builder = self.tracer.span_builder(name);
        builder.span_kind = Some(SpanKind::Client);
        let span = self.tracer.build_with_context(builder, parent);
        Box::new(OtelSpan {
            context: parent.with_span(span),
        })
    }
}

/// OpenTelemetry span, held in the context it is active in.
struct OtelSpan {
    context: Context,
}

impl Span for OtelSpan {
    fn set_tag(&self, key: &'static str, value: String) {
        self.context.span().set_attribute(KeyValue::new(key, value));
    }

    fn log_fields(&self, fields: Vec<LogField>) {
        let attributes = fields
            .into_iter()
            .map(|(key, value)| KeyValue::new(key, value))
            .collect();
        self.context.span().add_event("log", attributes);
    }

    fn set_error(&self, message: &str) {
        self.context
            .span()
            .set_status(Status::error(message.to_string()));
    }

    fn finish(&self) {
        self.context.span().end();
    }

    fn propagate(&self, _: &Context) -> Context {
        self.context.clone()
    }
}

/// [`Tracer`] that discards all spans.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopTracer;

impl Tracer for NoopTracer {
    fn start_span(&self, _: String, _: &Context) -> Box<dyn Span> {
        Box::new(NoopSpan)
    }
}

struct NoopSpan;

impl Span for NoopSpan {
    fn set_tag(&self, _: &'static str, _: String) {}
    fn log_fields(&self, _: Vec<LogField>) {}
    fn set_error(&self, _: &str) {}
    fn finish(&self) {}
    fn propagate(&self, parent: &Context) -> Context {
        parent.clone()
    }
}

/// Initialised a new span and context for MongoDB admin commands.
///
/// The new span and context are automatically children of the active span and context.
pub fn command_context(command: &str) -> Context {
    let name = format!("mongodb.{}", command);
    let tracer = opentelemetry::global::tracer(TRACER_NAME);
    let mut builder = tracer.span_builder(name);
    builder.span_kind = Some(SpanKind::Client);
    let parent = Context::current();
    let span = tracer.build_with_context(builder, &parent);
    parent.with_span(span)
}

#[cfg(test)]
mod tests {
    use opentelemetry::Context;

    use super::NoopTracer;
    use super::Tracer;
    use super::TrackedSpan;
    use crate::testing::RecordingTracer;

    #[test]
    fn tracked_span_finishes_once() {
        let tracer = RecordingTracer::default();
        let span = TrackedSpan::new(tracer.start_span("op".into(), &Context::new()));
        assert!(span.finish());
        assert!(!span.finish());
        span.set_tag("late", "tag".into());
        let spans = tracer.spans();
        assert_eq!(spans[0].finished, 1);
        assert!(spans[0].tag("late").is_none());
    }

    #[test]
    fn noop_span_propagates_parent() {
        let parent = Context::new();
        let span = NoopTracer.start_span("op".into(), &parent);
        let cx = span.propagate(&parent);
        assert!(cx.get::<u64>().is_none());
        span.finish();
    }
}
