//! Caller context propagated with every operation.
//!
//! The context carries the caller's trace context, the cancellation signals for the
//! call and the spans hooks opened for the call.
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use opentelemetry::Context;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::constants::fields;
use crate::errors::Error;
use crate::trace::SpanHandle;

static NEXT_HOOK_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a hook instance, used to store and look up spans it owns.
///
/// Two tracing hooks registered on the same pipeline never see each other's spans.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HookId(u64);

impl HookId {
    /// Allocate a new, process unique, hook identity.
    pub fn next() -> HookId {
        HookId(NEXT_HOOK_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Context supplied by the caller of an operation.
///
/// Contexts are immutable: methods that change the context return an updated copy.
#[derive(Clone, Default)]
pub struct CallContext {
    trace: Context,
    cancel: Option<CancellationToken>,
    deadline: Option<Instant>,
    spans: Arc<BTreeMap<HookId, SpanHandle>>,
}

impl CallContext {
    /// Empty context with no parent trace and no cancellation.
    pub fn new() -> CallContext {
        CallContext::default()
    }

    /// Context attached to the current OpenTelemetry trace context.
    pub fn current() -> CallContext {
        CallContext::new().with_trace_context(Context::current())
    }

    pub fn with_trace_context(mut self, trace: Context) -> CallContext {
        self.trace = trace;
        self
    }

    /// Cancel the operation when the token is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> CallContext {
        self.cancel = Some(token);
        self
    }

    /// Fail the operation if it does not complete by the deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> CallContext {
        self.deadline = Some(deadline);
        self
    }

    /// Fail the operation if it does not complete within the timeout.
    pub fn with_timeout(self, timeout: Duration) -> CallContext {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn trace_context(&self) -> &Context {
        &self.trace
    }

    pub fn cancellation(&self) -> Option<&CancellationToken> {
        self.cancel.as_ref()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Span opened by the given hook for this call, if any.
    pub fn span(&self, hook: HookId) -> Option<&SpanHandle> {
        self.spans.get(&hook)
    }

    /// Derive a context carrying a span opened by a hook.
    ///
    /// The trace context of the derived context is replaced with the given one
    /// so later handlers and the driver call see the span as their parent.
    pub fn with_span(&self, hook: HookId, span: SpanHandle, trace: Context) -> CallContext {
        let mut spans = (*self.spans).clone();
        spans.insert(hook, span);
        CallContext {
            trace,
            cancel: self.cancel.clone(),
            deadline: self.deadline,
            spans: Arc::new(spans),
        }
    }

    /// Finish all spans still open in this context, noting why they were finished.
    ///
    /// Returns the number of spans this call finished.
    pub fn finish_spans(&self, reason: &str) -> usize {
        let mut finished = 0;
        for span in self.spans.values() {
            if span.is_finished() {
                continue;
            }
            span.log_fields(vec![(fields::CURSOR, reason.to_string())]);
            if span.finish() {
                finished += 1;
            }
        }
        finished
    }

    /// Run a future until it completes or the caller gives up on it.
    ///
    /// A token already cancelled or a deadline already passed fail the call
    /// without polling the future.
    pub async fn guard<F, T>(&self, future: F) -> Result<T, Error>
    where
        F: Future<Output = Result<T, Error>>,
    {
        let cancelled = async {
            match &self.cancel {
                Some(token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };
        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };
        tokio::select! {
            biased;
            _ = cancelled => Err(Error::Cancelled),
            _ = expired => Err(Error::DeadlineExceeded),
            result = future => result,
        }
    }
}

impl std::fmt::Debug for CallContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallContext")
            .field("trace", &self.trace)
            .field("cancelled", &self.cancel.as_ref().map(|t| t.is_cancelled()))
            .field("deadline", &self.deadline)
            .field("spans", &self.spans.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio_util::sync::CancellationToken;

    use super::CallContext;
    use super::HookId;
    use crate::errors::Error;
    use crate::testing::RecordingTracer;
    use crate::trace::Tracer;
    use crate::trace::TrackedSpan;

    #[test]
    fn hook_ids_are_unique() {
        assert_ne!(HookId::next(), HookId::next());
    }

    #[test]
    fn with_span_does_not_change_original() {
        let tracer = RecordingTracer::default();
        let cx = CallContext::new();
        let span = tracer.start_span("op".into(), cx.trace_context());
        let hook = HookId::next();
        let span = Arc::new(TrackedSpan::new(span));
        let derived = cx.with_span(hook, span, cx.trace_context().clone());
        assert!(cx.span(hook).is_none());
        assert!(derived.span(hook).is_some());
    }

    #[test]
    fn finish_spans_finishes_once() {
        let tracer = RecordingTracer::default();
        let cx = CallContext::new();
        let span = tracer.start_span("op".into(), cx.trace_context());
        let cx = cx.with_span(
            HookId::next(),
            Arc::new(TrackedSpan::new(span)),
            cx.trace_context().clone(),
        );
        assert_eq!(cx.finish_spans("dropped"), 1);
        assert_eq!(cx.finish_spans("dropped"), 0);
        let spans = tracer.spans();
        assert_eq!(spans[0].finished, 1);
        assert_eq!(spans[0].field("db.exec.cursor"), Some("dropped"));
    }

    #[tokio::test]
    async fn guard_passes_results_through() {
        let cx = CallContext::new();
        let result = cx.guard(async { Ok::<_, Error>(42) }).await.unwrap();
        assert_eq!(result, 42);
    }

    #[tokio::test]
    async fn guard_reports_cancellation() {
        let token = CancellationToken::new();
        token.cancel();
        let cx = CallContext::new().with_cancellation(token);
        let result = cx.guard(async { Ok::<_, Error>(42) }).await;
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[tokio::test]
    async fn guard_reports_deadline() {
        let cx = CallContext::new().with_timeout(Duration::from_millis(20));
        let result = cx
            .guard(async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok::<_, Error>(42)
            })
            .await;
        assert!(matches!(result, Err(Error::DeadlineExceeded)));
    }
}
