//! Test doubles for the driver boundary and the tracer.
use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use mongodb::bson::doc;
use mongodb::bson::Bson;
use mongodb::bson::Document;
use opentelemetry::Context;

use crate::client::Driver;
use crate::client::InstrumentedClient;
use crate::client::RawCursor;
use crate::context::CallContext;
use crate::errors::Error;
use crate::errors::PipelineError;
use crate::operation::BulkWriteResult;
use crate::operation::DeleteResult;
use crate::operation::InsertManyResult;
use crate::operation::InsertOneResult;
use crate::operation::Namespace;
use crate::operation::OperationKind;
use crate::operation::Outcome;
use crate::operation::Params;
use crate::operation::UpdateResult;
use crate::pipeline::Pipeline;
use crate::trace::LogField;
use crate::trace::Span;
use crate::trace::Tracer;

/// Build a driver error with the given message.
pub fn driver_error(message: &str) -> Error {
    let io = std::io::Error::new(std::io::ErrorKind::Other, message.to_string());
    Error::Driver(mongodb::error::Error::from(io))
}

/// In-memory [`Driver`] returning canned results.
///
/// Cursors iterate over three user documents: alice, bob and carol.
#[derive(Default)]
pub struct MockDriver {
    calls: Mutex<Vec<OperationKind>>,
    closed: Arc<AtomicUsize>,
    delay: Option<Duration>,
    failures: HashMap<OperationKind, String>,
}

impl MockDriver {
    /// Fail operations of the given kind with a driver error.
    pub fn fail(mut self, kind: OperationKind, message: &str) -> MockDriver {
        self.failures.insert(kind, message.to_string());
        self
    }

    /// Wait before responding to operations.
    pub fn delay(mut self, delay: Duration) -> MockDriver {
        self.delay = Some(delay);
        self
    }

    /// Instrumented client issuing operations to this driver.
    pub fn client(self: &Arc<Self>, pipeline: Pipeline) -> InstrumentedClient {
        let driver: Arc<dyn Driver> = self.clone();
        InstrumentedClient::with_driver(driver, Arc::new(pipeline))
    }

    /// Operations that reached the driver, in order.
    pub fn calls(&self) -> Vec<OperationKind> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of cursors closed by their owner.
    pub fn closed_cursors(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    fn users() -> Vec<Document> {
        vec![
            doc! {"_id": 1, "name": "alice"},
            doc! {"_id": 2, "name": "bob"},
            doc! {"_id": 3, "name": "carol"},
        ]
    }

    fn cursor(&self) -> Outcome {
        Outcome::Cursor(Box::new(MockCursor {
            closed: Arc::clone(&self.closed),
            current: None,
            documents: MockDriver::users().into(),
        }))
    }
}

#[async_trait::async_trait]
impl Driver for MockDriver {
    async fn execute(
        &self,
        _: &Namespace,
        params: Params,
        _: &CallContext,
    ) -> Result<Outcome, Error> {
        let kind = params.kind();
        self.calls.lock().unwrap().push(kind);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = self.failures.get(&kind) {
            return Err(driver_error(message));
        }

        let outcome = match kind {
            OperationKind::InsertOne => Outcome::InsertOne(InsertOneResult {
                inserted_id: Bson::Int32(1),
            }),
            OperationKind::InsertMany => {
                let count = match &params {
                    Params::InsertMany { documents, .. } => documents.len(),
                    _ => 0,
                };
                let inserted_ids = (0..count)
                    .map(|index| (index, Bson::Int64(index as i64 + 1)))
                    .collect();
                Outcome::InsertMany(InsertManyResult { inserted_ids })
            }
            OperationKind::DeleteOne | OperationKind::DeleteMany => {
                Outcome::Delete(DeleteResult { deleted_count: 1 })
            }
            OperationKind::UpdateOne
            | OperationKind::UpdateMany
            | OperationKind::UpdateByKey
            | OperationKind::ReplaceOne => Outcome::Update(UpdateResult {
                matched_count: 1,
                modified_count: 1,
                upserted_id: None,
            }),
            OperationKind::CountDocuments => Outcome::Count(3),
            OperationKind::Distinct => Outcome::Values(vec![
                Bson::String("alice".into()),
                Bson::String("bob".into()),
                Bson::String("carol".into()),
            ]),
            OperationKind::Find | OperationKind::Aggregate | OperationKind::Watch => {
                self.cursor()
            }
            OperationKind::FindOne
            | OperationKind::FindOneAndDelete
            | OperationKind::FindOneAndReplace
            | OperationKind::FindOneAndUpdate => {
                Outcome::Document(MockDriver::users().into_iter().next())
            }
            OperationKind::ListIndexes => Outcome::Documents(vec![doc! {"name": "_id_"}]),
            OperationKind::Drop => Outcome::Unit,
            OperationKind::BulkWrite => Outcome::BulkWrite(BulkWriteResult {
                deleted_count: 1,
                ..BulkWriteResult::default()
            }),
            OperationKind::CursorAll
            | OperationKind::CursorNext
            | OperationKind::CursorDecode
            | OperationKind::CursorClose => {
                return Err(PipelineError::NotDriverOperation(kind.as_str()).into())
            }
        };
        Ok(outcome)
    }
}

/// In-memory [`RawCursor`] over a fixed set of documents.
pub struct MockCursor {
    closed: Arc<AtomicUsize>,
    current: Option<Document>,
    documents: VecDeque<Document>,
}

#[async_trait::async_trait]
impl RawCursor for MockCursor {
    async fn advance(&mut self) -> Result<bool, Error> {
        self.current = self.documents.pop_front();
        Ok(self.current.is_some())
    }

    fn current(&self) -> Result<Document, Error> {
        self.current
            .clone()
            .ok_or(Error::Pipeline(PipelineError::NoCurrentDocument))
    }

    async fn close(&mut self) -> Result<(), Error> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Everything a [`RecordingTracer`] observed about a span.
#[derive(Clone, Debug, Default)]
pub struct SpanRecord {
    pub name: String,
    pub tags: Vec<(String, String)>,
    pub fields: Vec<(String, String)>,
    pub error: Option<String>,
    pub finished: usize,
}

impl SpanRecord {
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .rev()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .rev()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }
}

/// [`Tracer`] recording spans in memory.
#[derive(Clone, Default)]
pub struct RecordingTracer {
    spans: Arc<Mutex<Vec<SpanRecord>>>,
}

impl RecordingTracer {
    /// Snapshot of the spans started so far, in start order.
    pub fn spans(&self) -> Vec<SpanRecord> {
        self.spans.lock().unwrap().clone()
    }
}

impl Tracer for RecordingTracer {
    fn start_span(&self, name: String, _: &Context) -> Box<dyn Span> {
        let mut spans = self.spans.lock().unwrap();
        spans.push(SpanRecord {
            name,
            ..SpanRecord::default()
        });
        Box::new(RecordingSpan {
            index: spans.len() - 1,
            spans: Arc::clone(&self.spans),
        })
    }
}

struct RecordingSpan {
    index: usize,
    spans: Arc<Mutex<Vec<SpanRecord>>>,
}

impl RecordingSpan {
    fn update<F>(&self, update: F)
    where
        F: FnOnce(&mut SpanRecord),
    {
        let mut spans = self.spans.lock().unwrap();
        update(&mut spans[self.index]);
    }
}

impl Span for RecordingSpan {
    fn set_tag(&self, key: &'static str, value: String) {
        self.update(|span| span.tags.push((key.to_string(), value)));
    }

    fn log_fields(&self, fields: Vec<LogField>) {
        self.update(|span| {
            let fields = fields.into_iter().map(|(key, value)| (key.to_string(), value));
            span.fields.extend(fields);
        });
    }

    fn set_error(&self, message: &str) {
        self.update(|span| span.error = Some(message.to_string()));
    }

    fn finish(&self) {
        self.update(|span| span.finished += 1);
    }

    fn propagate(&self, parent: &Context) -> Context {
        parent.clone()
    }
}
