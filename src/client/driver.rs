//! Boundary between the instrumented facade and the MongoDB driver.
use std::pin::Pin;

use futures_util::StreamExt;
use futures_util::TryStreamExt;
use mongodb::bson::doc;
use mongodb::bson::Document;
use mongodb::change_stream::ChangeStream;
use mongodb::Client;

use crate::context::CallContext;
use crate::errors::Error;
use crate::errors::PipelineError;
use crate::operation::Namespace;
use crate::operation::Outcome;
use crate::operation::Params;

/// Execute operations against a MongoDB deployment.
#[async_trait::async_trait]
pub trait Driver: Send + Sync {
    /// Execute the operation described by the parameters.
    ///
    /// Cursor operations are not issued through the driver and are rejected.
    async fn execute(
        &self,
        namespace: &Namespace,
        params: Params,
        context: &CallContext,
    ) -> Result<Outcome, Error>;
}

/// Server-side cursor returned by the driver.
#[async_trait::async_trait]
pub trait RawCursor: Send {
    /// Move to the next document, returning `false` once the cursor is exhausted.
    async fn advance(&mut self) -> Result<bool, Error>;

    /// Document the cursor is positioned on.
    fn current(&self) -> Result<Document, Error>;

    /// Release server-side resources held by the cursor.
    async fn close(&mut self) -> Result<(), Error>;
}

/// [`Driver`] issuing operations with the official MongoDB driver.
#[derive(Clone, Debug)]
pub struct MongoDriver {
    client: Client,
}

impl MongoDriver {
    pub fn new(client: Client) -> MongoDriver {
        MongoDriver { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait::async_trait]
impl Driver for MongoDriver {
    async fn execute(
        &self,
        namespace: &Namespace,
        params: Params,
        _: &CallContext,
    ) -> Result<Outcome, Error> {
        let collection = self
            .client
            .database(&namespace.db)
            .collection::<Document>(&namespace.coll);
        let outcome = match params {
            Params::InsertOne { document, options } => {
                let result = collection.insert_one(document).with_options(options).await?;
                Outcome::InsertOne(result.into())
            }
            Params::InsertMany { documents, options } => {
                let result = collection
                    .insert_many(documents)
                    .with_options(options)
                    .await?;
                Outcome::InsertMany(result.into())
            }
            Params::DeleteOne { filter, options } => {
                let result = collection.delete_one(filter).with_options(options).await?;
                Outcome::Delete(result.into())
            }
            Params::DeleteMany { filter, options } => {
                let result = collection.delete_many(filter).with_options(options).await?;
                Outcome::Delete(result.into())
            }
            Params::UpdateOne {
                filter,
                update,
                options,
            } => {
                let result = collection
                    .update_one(filter, update)
                    .with_options(options)
                    .await?;
                Outcome::Update(result.into())
            }
            Params::UpdateMany {
                filter,
                update,
                options,
            } => {
                let result = collection
                    .update_many(filter, update)
                    .with_options(options)
                    .await?;
                Outcome::Update(result.into())
            }
            Params::UpdateByKey {
                key,
                update,
                options,
            } => {
                let result = collection
                    .update_one(doc! {"_id": key}, update)
                    .with_options(options)
                    .await?;
                Outcome::Update(result.into())
            }
            Params::ReplaceOne {
                filter,
                replacement,
                options,
            } => {
                let result = collection
                    .replace_one(filter, replacement)
                    .with_options(options)
                    .await?;
                Outcome::Update(result.into())
            }
            Params::Aggregate { pipeline, options } => {
                let cursor = collection.aggregate(pipeline).with_options(options).await?;
                Outcome::Cursor(Box::new(DocumentCursor::new(cursor)))
            }
            Params::CountDocuments { filter, options } => {
                let count = collection
                    .count_documents(filter)
                    .with_options(options)
                    .await?;
                Outcome::Count(count)
            }
            Params::Distinct {
                field_name,
                filter,
                options,
            } => {
                let values = collection
                    .distinct(field_name, filter)
                    .with_options(options)
                    .await?;
                Outcome::Values(values)
            }
            Params::Find { filter, options } => {
                let cursor = collection.find(filter).with_options(options).await?;
                Outcome::Cursor(Box::new(DocumentCursor::new(cursor)))
            }
            Params::FindOne { filter, options } => {
                let document = collection.find_one(filter).with_options(options).await?;
                Outcome::Document(document)
            }
            Params::FindOneAndDelete { filter, options } => {
                let document = collection
                    .find_one_and_delete(filter)
                    .with_options(options)
                    .await?;
                Outcome::Document(document)
            }
            Params::FindOneAndReplace {
                filter,
                replacement,
                options,
            } => {
                let document = collection
                    .find_one_and_replace(filter, replacement)
                    .with_options(options)
                    .await?;
                Outcome::Document(document)
            }
            Params::FindOneAndUpdate {
                filter,
                update,
                options,
            } => {
                let document = collection
                    .find_one_and_update(filter, update)
                    .with_options(options)
                    .await?;
                Outcome::Document(document)
            }
            Params::Watch { pipeline, options } => {
                let stream = collection
                    .watch()
                    .pipeline(pipeline)
                    .with_options(options)
                    .await?
                    .with_type::<Document>();
                Outcome::Cursor(Box::new(ChangeStreamCursor::new(stream)))
            }
            Params::ListIndexes { options } => {
                let indexes: Vec<Document> = collection
                    .list_indexes()
                    .with_options(options)
                    .await?
                    .with_type::<Document>()
                    .try_collect()
                    .await?;
                Outcome::Documents(indexes)
            }
            Params::Drop { options } => {
                collection.drop().with_options(options).await?;
                Outcome::Unit
            }
            Params::BulkWrite { models, options } => {
                let namespace = collection.namespace();
                let models: Vec<_> = models
                    .into_iter()
                    .map(|model| model.into_driver_model(&namespace))
                    .collect();
                let result = self.client.bulk_write(models).with_options(options).await?;
                Outcome::BulkWrite(result.into())
            }
            params @ (Params::CursorAll
            | Params::CursorNext
            | Params::CursorDecode
            | Params::CursorClose) => {
                return Err(PipelineError::NotDriverOperation(params.kind().as_str()).into());
            }
        };
        Ok(outcome)
    }
}

/// Cursor over query and aggregation results.
struct DocumentCursor {
    cursor: mongodb::Cursor<Document>,
    positioned: bool,
}

impl DocumentCursor {
    fn new(cursor: mongodb::Cursor<Document>) -> DocumentCursor {
        DocumentCursor {
            cursor,
            positioned: false,
        }
    }
}

#[async_trait::async_trait]
impl RawCursor for DocumentCursor {
    async fn advance(&mut self) -> Result<bool, Error> {
        self.positioned = self.cursor.advance().await?;
        Ok(self.positioned)
    }

    fn current(&self) -> Result<Document, Error> {
        if !self.positioned {
            return Err(PipelineError::NoCurrentDocument.into());
        }
        let document = self.cursor.deserialize_current()?;
        Ok(document)
    }

    async fn close(&mut self) -> Result<(), Error> {
        // Server-side cursors are killed by the driver when dropped.
        self.positioned = false;
        Ok(())
    }
}

/// Cursor over change stream events.
struct ChangeStreamCursor {
    current: Option<Document>,
    stream: Pin<Box<ChangeStream<Document>>>,
}

impl ChangeStreamCursor {
    fn new(stream: ChangeStream<Document>) -> ChangeStreamCursor {
        ChangeStreamCursor {
            current: None,
            stream: Box::pin(stream),
        }
    }
}

#[async_trait::async_trait]
impl RawCursor for ChangeStreamCursor {
    async fn advance(&mut self) -> Result<bool, Error> {
        match self.stream.next().await {
            Some(event) => {
                self.current = Some(event?);
                Ok(true)
            }
            None => {
                self.current = None;
                Ok(false)
            }
        }
    }

    fn current(&self) -> Result<Document, Error> {
        self.current
            .clone()
            .ok_or(Error::Pipeline(PipelineError::NoCurrentDocument))
    }

    async fn close(&mut self) -> Result<(), Error> {
        self.current = None;
        Ok(())
    }
}
