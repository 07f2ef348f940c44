//! Flat trace strings to carry trace contexts across process boundaries.
//!
//! Trace strings use the `{version}-{trace_id}-{span_id}-{flags}` layout,
//! as in `00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01`.
use std::sync::Arc;

use opentelemetry::trace::SpanContext;
use opentelemetry::trace::SpanId;
use opentelemetry::trace::TraceContextExt;
use opentelemetry::trace::TraceFlags;
use opentelemetry::trace::TraceId;
use opentelemetry::Context;

use super::SpanHandle;
use super::Tracer;
use super::TrackedSpan;
use crate::errors::TraceStringError;

const VERSION: &str = "00";

/// Render the span active in the context as a flat trace string.
///
/// Returns `None` if the context has no valid span.
pub fn trace_string(context: &Context) -> Option<String> {
    let span = context.span();
    let span_context = span.span_context();
    if !span_context.is_valid() {
        return None;
    }
    let trace = format!(
        "{}-{}-{}-{:02x}",
        VERSION,
        span_context.trace_id(),
        span_context.span_id(),
        span_context.trace_flags().to_u8()
    );
    Some(trace)
}

/// Build a context whose remote parent is described by the trace string.
pub fn context_from_trace_string(trace: &str) -> Result<Context, TraceStringError> {
    let parts: Vec<&str> = trace.trim().split('-').collect();
    if parts.len() != 4 {
        return Err(TraceStringError::Format(trace.to_string()));
    }
    if parts[0] != VERSION {
        return Err(TraceStringError::UnsupportedVersion(parts[0].to_string()));
    }
    let flags = u8::from_str_radix(parts[3], 16)
        .map_err(|_| TraceStringError::Format(trace.to_string()))?;
    let trace_id =
        TraceId::from_hex(parts[1]).map_err(|_| TraceStringError::InvalidIds(trace.to_string()))?;
    let span_id =
        SpanId::from_hex(parts[2]).map_err(|_| TraceStringError::InvalidIds(trace.to_string()))?;
    if trace_id == TraceId::INVALID || span_id == SpanId::INVALID {
        return Err(TraceStringError::InvalidIds(trace.to_string()));
    }

    let span_context = SpanContext::new(
        trace_id,
        span_id,
        TraceFlags::new(flags),
        true,
        Default::default(),
    );
    Ok(Context::new().with_remote_span_context(span_context))
}

/// Start a span whose parent is described by the trace string.
pub fn child_span_from_trace_string(
    tracer: &dyn Tracer,
    name: &str,
    trace: &str,
) -> Result<SpanHandle, TraceStringError> {
    let parent = context_from_trace_string(trace)?;
    let span = tracer.start_span(name.to_string(), &parent);
    Ok(Arc::new(TrackedSpan::new(span)))
}

#[cfg(test)]
mod tests {
    use opentelemetry::trace::TraceContextExt;
    use opentelemetry::Context;

    use super::child_span_from_trace_string;
    use super::context_from_trace_string;
    use super::trace_string;
    use crate::errors::TraceStringError;
    use crate::testing::RecordingTracer;

    const TRACE: &str = "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01";

    #[test]
    fn parse_and_render() {
        let cx = context_from_trace_string(TRACE).unwrap();
        let span = cx.span();
        let span_context = span.span_context();
        assert!(span_context.is_remote());
        assert!(span_context.is_sampled());
        assert_eq!(
            span_context.trace_id().to_string(),
            "4bf92f3577b34da6a3ce929d0e0e4736"
        );
        assert_eq!(trace_string(&cx).as_deref(), Some(TRACE));
    }

    #[test]
    fn no_span_no_string() {
        assert!(trace_string(&Context::new()).is_none());
    }

    #[test]
    fn reject_malformed() {
        let error = context_from_trace_string("not-a-trace").unwrap_err();
        assert!(matches!(error, TraceStringError::Format(_)));
        let error = context_from_trace_string(
            "ff-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01",
        )
        .unwrap_err();
        assert!(matches!(error, TraceStringError::UnsupportedVersion(_)));
        let error = context_from_trace_string(
            "00-00000000000000000000000000000000-00f067aa0ba902b7-01",
        )
        .unwrap_err();
        assert!(matches!(error, TraceStringError::InvalidIds(_)));
    }

    #[test]
    fn child_span_is_started() {
        let tracer = RecordingTracer::default();
        let span = child_span_from_trace_string(&tracer, "consume", TRACE).unwrap();
        span.finish();
        let spans = tracer.spans();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].name, "consume");
        assert_eq!(spans[0].finished, 1);
    }
}
