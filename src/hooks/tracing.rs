//! Open a span for every operation and keep it open for the lifetime of returned cursors.
//!
//! Spans are named `{op}::{db}::{collection}`, tagged with the target namespace
//! and carry the operation arguments as bounded diagnostic fields.
//! Spans for cursor returning operations stay open after the call returns and are
//! finished when the cursor is consumed with `All` or closed with `Close`.
use std::sync::Arc;

use crate::constants::fields;
use crate::constants::tags;
use crate::context::HookId;
use crate::encode::Encoder;
use crate::encode::FormatFn;
use crate::errors::Error;
use crate::operation::Operation;
use crate::pipeline::Handler;
use crate::pipeline::Next;
use crate::trace::LogField;
use crate::trace::SpanHandle;
use crate::trace::Tracer;
use crate::trace::TrackedSpan;

/// Message recorded on spans whose operation was abandoned by the caller.
const ABANDONED: &str = "the operation future was dropped before it completed";

/// Options for the [`TracingHook`].
#[derive(Clone, Copy)]
pub struct TracingHookOptions {
    /// Custom format for diagnostic fields.
    pub format: Option<FormatFn>,

    /// Maximum length (in bytes) of diagnostic fields.
    pub max_field_len: usize,

    /// Keep spans for cursor returning operations open until the cursor is consumed.
    pub track_cursors: bool,
}

impl Default for TracingHookOptions {
    fn default() -> Self {
        let conf = crate::conf::InstrumentationConf::default();
        TracingHookOptions::from(&conf)
    }
}

impl std::fmt::Debug for TracingHookOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TracingHookOptions")
            .field("custom_format", &self.format.is_some())
            .field("max_field_len", &self.max_field_len)
            .field("track_cursors", &self.track_cursors)
            .finish()
    }
}

impl From<&crate::conf::InstrumentationConf> for TracingHookOptions {
    fn from(conf: &crate::conf::InstrumentationConf) -> Self {
        TracingHookOptions {
            format: None,
            max_field_len: conf.max_field_len,
            track_cursors: conf.track_cursors,
        }
    }
}

/// Handler tracing operations with spans.
pub struct TracingHook {
    encoder: Encoder,
    id: HookId,
    track_cursors: bool,
    tracer: Arc<dyn Tracer>,
}

impl TracingHook {
    pub fn new(tracer: Arc<dyn Tracer>) -> TracingHook {
        TracingHook::with_options(tracer, TracingHookOptions::default())
    }

    pub fn with_options(tracer: Arc<dyn Tracer>, options: TracingHookOptions) -> TracingHook {
        let mut encoder = Encoder::new(options.max_field_len);
        if let Some(format) = options.format {
            encoder = encoder.with_format(format);
        }
        TracingHook {
            encoder,
            id: HookId::next(),
            track_cursors: options.track_cursors,
            tracer,
        }
    }

    /// Identity spans opened by this hook are stored under in call contexts.
    pub fn id(&self) -> HookId {
        self.id
    }

    /// Diagnostic fields logged on the span of the operation.
    pub fn diagnostic_fields(&self, op: &Operation) -> Vec<LogField> {
        op.params()
            .diagnostics()
            .into_iter()
            .map(|(key, argument)| (key, self.encoder.encode(&argument)))
            .collect()
    }

    /// Open and describe the span, then make it visible to the rest of the chain.
    fn open_span(&self, op: &mut Operation) -> SpanHandle {
        let namespace = op.namespace();
        let name = format!("{}::{}::{}", op.kind(), namespace.db, namespace.coll);
        let span = self.tracer.start_span(name, op.context().trace_context());
        let span = Arc::new(TrackedSpan::new(span));
        span.set_tag(tags::SPAN_KIND, tags::SPAN_KIND_VALUE.to_string());
        span.set_tag(tags::COMPONENT, tags::COMPONENT_VALUE.to_string());
        span.set_tag(tags::PEER_SERVICE, tags::PEER_SERVICE_VALUE.to_string());
        span.set_tag(tags::DB_SYSTEM, tags::DB_SYSTEM_VALUE.to_string());
        span.set_tag(tags::DB_NAME, namespace.db.clone());
        span.set_tag(tags::DB_COLLECTION, namespace.coll.clone());
        span.log_fields(self.diagnostic_fields(op));

        let trace = span.propagate(op.context().trace_context());
        let context = op.context().with_span(self.id, Arc::clone(&span), trace);
        op.set_context(context);
        span
    }

    /// Handle the end of an operation that opened a span.
    fn close_span(&self, op: &Operation, span: SpanHandle) {
        if let Some(error) = op.error() {
            record_error(&span, error);
        }
        let keep_open = self.track_cursors && op.kind().returns_cursor() && op.returned_cursor();
        if !keep_open {
            span.finish();
        }
    }

    /// Handle the end of an operation on a cursor returned by an earlier operation.
    fn continue_span(&self, op: &Operation) {
        if !self.track_cursors {
            return;
        }
        let span = match op.correlation().and_then(|cx| cx.span(self.id)) {
            Some(span) => span,
            None => return,
        };
        if let Some(error) = op.error() {
            record_error(span, error);
        }
        if op.kind().terminates_cursor() {
            span.finish();
        }
    }
}

#[async_trait::async_trait]
impl Handler for TracingHook {
    async fn handle(&self, op: &mut Operation, next: Next<'_>) {
        if op.kind().is_cursor_continuation() {
            next.run(op).await;
            self.continue_span(op);
            return;
        }

        let span = self.open_span(op);
        let guard = AbandonGuard(Some(span));
        next.run(op).await;
        if let Some(span) = guard.disarm() {
            self.close_span(op, span);
        }
    }
}

/// Finish spans of operations whose future is dropped mid-flight.
struct AbandonGuard(Option<SpanHandle>);

impl AbandonGuard {
    fn disarm(mut self) -> Option<SpanHandle> {
        self.0.take()
    }
}

impl Drop for AbandonGuard {
    fn drop(&mut self) {
        if let Some(span) = self.0.take() {
            mark_failed(&span, ABANDONED.to_string());
            span.finish();
        }
    }
}

fn record_error(span: &TrackedSpan, error: &Error) {
    mark_failed(span, error.to_string());
}

fn mark_failed(span: &TrackedSpan, message: String) {
    span.set_tag(tags::ERROR, "true".to_string());
    span.set_error(&message);
    span.log_fields(vec![(fields::ERR, message)]);
}
