//! Ordered chain of handlers wrapped around every operation.
//!
//! Handlers run in registration order before the server call and in reverse order after it:
//! each handler receives a [`Next`] continuation and decides if and when to forward
//! the operation down the chain. The innermost step is a [`Terminal`] issuing the driver call.
use std::sync::Arc;

use slog::Discard;
use slog::Logger;

use crate::errors::Error;
use crate::errors::PipelineError;
use crate::operation::FromOutcome;
use crate::operation::Operation;

/// Logic wrapped around operations issued through the pipeline.
///
/// Handlers that do not call [`Next::run`] stop the chain: later handlers and the server
/// call are skipped. Such handlers are expected to record a result or an error on
/// the operation, otherwise the caller receives [`PipelineError::NotExecuted`].
#[async_trait::async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, op: &mut Operation, next: Next<'_>);
}

/// Innermost step of the chain, executing the operation against the server.
#[async_trait::async_trait]
pub trait Terminal: Send {
    /// Execute the operation and record its result on it.
    async fn execute(&mut self, op: &mut Operation);
}

/// Continuation invoking the rest of the chain.
pub struct Next<'a> {
    handlers: &'a [Arc<dyn Handler>],
    logger: &'a Logger,
    terminal: &'a mut (dyn Terminal + 'a),
}

impl<'a> Next<'a> {
    /// Run the remainder of the chain, returning once it has completed.
    pub async fn run(self, op: &mut Operation) {
        let Next {
            handlers,
            logger,
            terminal,
        } = self;
        match handlers.split_first() {
            Some((handler, rest)) => {
                let next = Next {
                    handlers: rest,
                    logger,
                    terminal,
                };
                handler.handle(op, next).await;
            }
            None if op.is_executed() => {
                slog::debug!(
                    logger,
                    "Skipping server call for operation with a recorded result";
                    "op" => %op.kind(),
                    "ns" => %op.namespace(),
                );
            }
            None => terminal.execute(op).await,
        }
    }

    /// Number of handlers left before the server call.
    pub fn remaining(&self) -> usize {
        self.handlers.len()
    }
}

/// Immutable, shareable chain of handlers.
///
/// Pipelines are built once and shared across concurrent operations.
/// Adding a handler to an existing pipeline creates a new pipeline and leaves
/// operations running on the old one unaffected.
#[derive(Clone)]
pub struct Pipeline {
    handlers: Vec<Arc<dyn Handler>>,
    logger: Logger,
    strict: bool,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Pipeline with no handlers, forwarding operations straight to the server.
    pub fn empty() -> Pipeline {
        PipelineBuilder::default().build()
    }

    /// Copy of this pipeline with an extra handler at the end of the chain.
    pub fn with_handler<H>(&self, handler: H) -> Pipeline
    where
        H: Handler + 'static,
    {
        let mut pipeline = self.clone();
        pipeline.handlers.push(Arc::new(handler));
        pipeline
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Run the operation through all handlers and the terminal.
    ///
    /// Operations can only run once.
    pub async fn run(
        &self,
        op: &mut Operation,
        terminal: &mut (dyn Terminal + '_),
    ) -> Result<(), PipelineError> {
        if op.is_executed() {
            return Err(PipelineError::AlreadyExecuted(op.kind().as_str()));
        }
        let next = Next {
            handlers: &self.handlers,
            logger: &self.logger,
            terminal,
        };
        next.run(op).await;
        Ok(())
    }

    /// Run the operation and return its typed result.
    pub async fn execute<R>(
        &self,
        mut op: Operation,
        terminal: &mut (dyn Terminal + '_),
    ) -> Result<R, Error>
    where
        R: FromOutcome,
    {
        self.run(&mut op, terminal).await?;
        self.into_result(op)
    }

    /// Extract the typed result of an operation that ran through the pipeline.
    ///
    /// # Panics
    ///
    /// In strict mode, panics if the recorded result type does not match `R`.
    /// A mismatch means a handler recorded a result for a different operation kind.
    pub fn into_result<R>(&self, op: Operation) -> Result<R, Error>
    where
        R: FromOutcome,
    {
        let kind = op.kind();
        match op.into_result() {
            None => Err(PipelineError::NotExecuted(kind.as_str()).into()),
            Some(Err(error)) => Err(error),
            Some(Ok(outcome)) => R::from_outcome(outcome).map_err(|outcome| {
                let error = PipelineError::ResultMismatch {
                    expected: R::NAME,
                    found: outcome.name(),
                };
                if self.strict {
                    panic!("{} for operation {}", error, kind);
                }
                slog::error!(
                    self.logger,
                    "Operation result does not match the expected type";
                    "op" => %kind,
                    "expected" => R::NAME,
                    "found" => outcome.name(),
                );
                error.into()
            }),
        }
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Pipeline::empty()
    }
}

/// Incrementally build a [`Pipeline`].
pub struct PipelineBuilder {
    handlers: Vec<Arc<dyn Handler>>,
    logger: Option<Logger>,
    strict: bool,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        PipelineBuilder {
            handlers: Vec::new(),
            logger: None,
            strict: cfg!(debug_assertions),
        }
    }
}

impl PipelineBuilder {
    /// Append a handler to the chain.
    pub fn handler<H>(mut self, handler: H) -> Self
    where
        H: Handler + 'static,
    {
        self.handlers.push(Arc::new(handler));
        self
    }

    /// Append a shared handler to the chain.
    pub fn shared_handler(mut self, handler: Arc<dyn Handler>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Logger for pipeline diagnostics.
    pub fn logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Panic on result type mismatches instead of returning an error.
    ///
    /// Defaults to `true` in debug builds.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn build(self) -> Pipeline {
        Pipeline {
            handlers: self.handlers,
            logger: self
                .logger
                .unwrap_or_else(|| Logger::root(Discard, slog::o!())),
            strict: self.strict,
        }
    }
}
