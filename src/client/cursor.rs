//! Instrumented cursor returned by find, aggregate and watch operations.
use std::sync::Arc;

use serde::de::DeserializeOwned;

use super::RawCursor;
use crate::context::CallContext;
use crate::errors::Error;
use crate::errors::PipelineError;
use crate::operation::Namespace;
use crate::operation::Operation;
use crate::operation::Outcome;
use crate::operation::Params;
use crate::pipeline::Pipeline;
use crate::pipeline::Terminal;

/// Reason recorded on spans finished because the cursor was dropped.
const CURSOR_DROPPED: &str = "dropped";

/// Reason recorded on spans finished because the cursor was detached.
const CURSOR_DETACHED: &str = "detached";

/// Cursor whose operations are correlated to the operation that returned it.
///
/// Iterating the cursor issues `CursorNext` and `CursorDecode` operations while
/// [`Cursor::all`] and [`Cursor::close`] end the cursor.
/// Cursors dropped before they end finish any spans still open for them.
pub struct Cursor {
    correlation: CallContext,
    namespace: Namespace,
    pipeline: Arc<Pipeline>,
    raw: Option<Box<dyn RawCursor>>,
}

impl Cursor {
    pub(super) fn new(
        raw: Box<dyn RawCursor>,
        correlation: CallContext,
        namespace: Namespace,
        pipeline: Arc<Pipeline>,
    ) -> Cursor {
        Cursor {
            correlation,
            namespace,
            pipeline,
            raw: Some(raw),
        }
    }

    /// Context of the operation that returned this cursor.
    pub fn correlation(&self) -> &CallContext {
        &self.correlation
    }

    /// Advance the cursor, returning `false` once it is exhausted.
    pub async fn next(&mut self, cx: &CallContext) -> Result<bool, Error> {
        let op = self.operation(cx, Params::CursorNext);
        let raw = self
            .raw
            .as_mut()
            .ok_or(Error::Pipeline(PipelineError::NoCurrentDocument))?;
        let mut call = Advance { raw };
        self.pipeline.execute(op, &mut call).await
    }

    /// Decode the document the cursor is positioned on.
    pub async fn decode<T>(&mut self, cx: &CallContext) -> Result<T, Error>
    where
        T: DeserializeOwned + Send,
    {
        let op = self.operation(cx, Params::CursorDecode);
        let raw = self
            .raw
            .as_mut()
            .ok_or(Error::Pipeline(PipelineError::NoCurrentDocument))?;
        let mut call = Decode { raw, value: None };
        self.pipeline.execute::<()>(op, &mut call).await?;
        call.value
            .take()
            .ok_or_else(|| PipelineError::NotExecuted("CursorDecode").into())
    }

    /// Decode all remaining documents and end the cursor.
    pub async fn all<T>(mut self, cx: &CallContext) -> Result<Vec<T>, Error>
    where
        T: DeserializeOwned + Send,
    {
        let op = self.operation(cx, Params::CursorAll);
        let mut raw = self.take_raw()?;
        let mut call = All {
            raw: &mut raw,
            values: None,
        };
        self.pipeline.execute::<()>(op, &mut call).await?;
        call.values
            .take()
            .ok_or_else(|| PipelineError::NotExecuted("CursorAll").into())
    }

    /// End the cursor and release server-side resources.
    pub async fn close(mut self, cx: &CallContext) -> Result<(), Error> {
        let op = self.operation(cx, Params::CursorClose);
        let mut raw = self.take_raw()?;
        let mut call = Close { raw: &mut raw };
        self.pipeline.execute(op, &mut call).await
    }

    /// Detach the driver cursor from instrumentation.
    ///
    /// Spans still open for the cursor are finished.
    pub fn into_raw(mut self) -> Result<Box<dyn RawCursor>, Error> {
        let raw = self.take_raw()?;
        self.correlation.finish_spans(CURSOR_DETACHED);
        Ok(raw)
    }

    fn operation(&self, cx: &CallContext, params: Params) -> Operation {
        Operation::continuation(
            self.namespace.clone(),
            params,
            cx.clone(),
            self.correlation.clone(),
        )
    }

    fn take_raw(&mut self) -> Result<Box<dyn RawCursor>, Error> {
        self.raw
            .take()
            .ok_or(Error::Pipeline(PipelineError::NoCurrentDocument))
    }
}

impl Drop for Cursor {
    fn drop(&mut self) {
        // Spans already finished by `all` or `close` are left untouched.
        self.correlation.finish_spans(CURSOR_DROPPED);
    }
}

struct Advance<'a> {
    raw: &'a mut Box<dyn RawCursor>,
}

#[async_trait::async_trait]
impl Terminal for Advance<'_> {
    async fn execute(&mut self, op: &mut Operation) {
        let context = op.context().clone();
        let result = context.guard(self.raw.advance()).await;
        op.complete(result.map(Outcome::Advanced));
    }
}

struct Decode<'a, T> {
    raw: &'a mut Box<dyn RawCursor>,
    value: Option<T>,
}

#[async_trait::async_trait]
impl<T> Terminal for Decode<'_, T>
where
    T: DeserializeOwned + Send,
{
    async fn execute(&mut self, op: &mut Operation) {
        let result = self.raw.current().and_then(|document| {
            mongodb::bson::from_document::<T>(document)
                .map_err(|error| Error::Driver(mongodb::error::Error::from(error)))
        });
        match result {
            Ok(value) => {
                self.value = Some(value);
                op.complete(Ok(Outcome::Unit));
            }
            Err(error) => {
                op.complete(Err(error));
            }
        }
    }
}

struct All<'a, T> {
    raw: &'a mut Box<dyn RawCursor>,
    values: Option<Vec<T>>,
}

impl<T> All<'_, T>
where
    T: DeserializeOwned + Send,
{
    async fn collect(&mut self) -> Result<Vec<T>, Error> {
        let mut values = Vec::new();
        while self.raw.advance().await? {
            let document = self.raw.current()?;
            let value = mongodb::bson::from_document::<T>(document)
                .map_err(|error| Error::Driver(mongodb::error::Error::from(error)))?;
            values.push(value);
        }
        self.raw.close().await?;
        Ok(values)
    }
}

#[async_trait::async_trait]
impl<T> Terminal for All<'_, T>
where
    T: DeserializeOwned + Send,
{
    async fn execute(&mut self, op: &mut Operation) {
        let context = op.context().clone();
        let result = context.guard(self.collect()).await;
        match result {
            Ok(values) => {
                self.values = Some(values);
                op.complete(Ok(Outcome::Unit));
            }
            Err(error) => {
                op.complete(Err(error));
            }
        }
    }
}

struct Close<'a> {
    raw: &'a mut Box<dyn RawCursor>,
}

#[async_trait::async_trait]
impl Terminal for Close<'_> {
    async fn execute(&mut self, op: &mut Operation) {
        let context = op.context().clone();
        let result = context.guard(self.raw.close()).await;
        op.complete(result.map(|_| Outcome::Unit));
    }
}
