//! Instrumented collection handle.
use std::sync::Arc;

use mongodb::bson::Bson;
use mongodb::bson::Document;
use mongodb::options::AggregateOptions;
use mongodb::options::BulkWriteOptions;
use mongodb::options::ChangeStreamOptions;
use mongodb::options::CountOptions;
use mongodb::options::DeleteOptions;
use mongodb::options::DistinctOptions;
use mongodb::options::DropCollectionOptions;
use mongodb::options::FindOneAndDeleteOptions;
use mongodb::options::FindOneAndReplaceOptions;
use mongodb::options::FindOneAndUpdateOptions;
use mongodb::options::FindOneOptions;
use mongodb::options::FindOptions;
use mongodb::options::InsertManyOptions;
use mongodb::options::InsertOneOptions;
use mongodb::options::ListIndexesOptions;
use mongodb::options::ReplaceOptions;
use mongodb::options::UpdateModifications;
use mongodb::options::UpdateOptions;

use super::Cursor;
use super::Driver;
use super::RawCursor;
use crate::context::CallContext;
use crate::errors::Error;
use crate::operation::BulkWriteResult;
use crate::operation::DeleteResult;
use crate::operation::FromOutcome;
use crate::operation::InsertManyResult;
use crate::operation::InsertOneResult;
use crate::operation::Namespace;
use crate::operation::Operation;
use crate::operation::Params;
use crate::operation::UpdateResult;
use crate::operation::WriteModel;
use crate::pipeline::Pipeline;
use crate::pipeline::Terminal;

/// Instrumented equivalent of a [`mongodb::Collection`] of documents.
///
/// Every method takes the caller's [`CallContext`] first and runs the
/// operation through the pipeline shared by the client.
#[derive(Clone)]
pub struct InstrumentedCollection {
    driver: Arc<dyn Driver>,
    namespace: Namespace,
    pipeline: Arc<Pipeline>,
}

impl InstrumentedCollection {
    pub(super) fn new(
        driver: Arc<dyn Driver>,
        pipeline: Arc<Pipeline>,
        namespace: Namespace,
    ) -> InstrumentedCollection {
        InstrumentedCollection {
            driver,
            namespace,
            pipeline,
        }
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.namespace.coll
    }

    pub async fn insert_one(
        &self,
        cx: &CallContext,
        document: Document,
        options: impl Into<Option<InsertOneOptions>>,
    ) -> Result<InsertOneResult, Error> {
        let options = options.into();
        self.execute(cx, Params::InsertOne { document, options })
            .await
    }

    pub async fn insert_many(
        &self,
        cx: &CallContext,
        documents: Vec<Document>,
        options: impl Into<Option<InsertManyOptions>>,
    ) -> Result<InsertManyResult, Error> {
        let options = options.into();
        self.execute(cx, Params::InsertMany { documents, options })
            .await
    }

    pub async fn delete_one(
        &self,
        cx: &CallContext,
        filter: Document,
        options: impl Into<Option<DeleteOptions>>,
    ) -> Result<DeleteResult, Error> {
        let options = options.into();
        self.execute(cx, Params::DeleteOne { filter, options }).await
    }

    pub async fn delete_many(
        &self,
        cx: &CallContext,
        filter: Document,
        options: impl Into<Option<DeleteOptions>>,
    ) -> Result<DeleteResult, Error> {
        let options = options.into();
        self.execute(cx, Params::DeleteMany { filter, options })
            .await
    }

    pub async fn update_one(
        &self,
        cx: &CallContext,
        filter: Document,
        update: impl Into<UpdateModifications>,
        options: impl Into<Option<UpdateOptions>>,
    ) -> Result<UpdateResult, Error> {
        let params = Params::UpdateOne {
            filter,
            update: update.into(),
            options: options.into(),
        };
        self.execute(cx, params).await
    }

    pub async fn update_many(
        &self,
        cx: &CallContext,
        filter: Document,
        update: impl Into<UpdateModifications>,
        options: impl Into<Option<UpdateOptions>>,
    ) -> Result<UpdateResult, Error> {
        let params = Params::UpdateMany {
            filter,
            update: update.into(),
            options: options.into(),
        };
        self.execute(cx, params).await
    }

    /// Update the document whose `_id` equals `key`.
    pub async fn update_by_key(
        &self,
        cx: &CallContext,
        key: impl Into<Bson>,
        update: impl Into<UpdateModifications>,
        options: impl Into<Option<UpdateOptions>>,
    ) -> Result<UpdateResult, Error> {
        let params = Params::UpdateByKey {
            key: key.into(),
            update: update.into(),
            options: options.into(),
        };
        self.execute(cx, params).await
    }

    pub async fn replace_one(
        &self,
        cx: &CallContext,
        filter: Document,
        replacement: Document,
        options: impl Into<Option<ReplaceOptions>>,
    ) -> Result<UpdateResult, Error> {
        let params = Params::ReplaceOne {
            filter,
            replacement,
            options: options.into(),
        };
        self.execute(cx, params).await
    }

    pub async fn aggregate(
        &self,
        cx: &CallContext,
        pipeline: Vec<Document>,
        options: impl Into<Option<AggregateOptions>>,
    ) -> Result<Cursor, Error> {
        let options = options.into();
        self.open_cursor(cx, Params::Aggregate { pipeline, options })
            .await
    }

    pub async fn count_documents(
        &self,
        cx: &CallContext,
        filter: Document,
        options: impl Into<Option<CountOptions>>,
    ) -> Result<u64, Error> {
        let options = options.into();
        self.execute(cx, Params::CountDocuments { filter, options })
            .await
    }

    pub async fn distinct(
        &self,
        cx: &CallContext,
        field_name: &str,
        filter: Document,
        options: impl Into<Option<DistinctOptions>>,
    ) -> Result<Vec<Bson>, Error> {
        let params = Params::Distinct {
            field_name: field_name.to_string(),
            filter,
            options: options.into(),
        };
        self.execute(cx, params).await
    }

    pub async fn find(
        &self,
        cx: &CallContext,
        filter: Document,
        options: impl Into<Option<FindOptions>>,
    ) -> Result<Cursor, Error> {
        let options = options.into();
        self.open_cursor(cx, Params::Find { filter, options }).await
    }

    pub async fn find_one(
        &self,
        cx: &CallContext,
        filter: Document,
        options: impl Into<Option<FindOneOptions>>,
    ) -> Result<Option<Document>, Error> {
        let options = options.into();
        self.execute(cx, Params::FindOne { filter, options }).await
    }

    pub async fn find_one_and_delete(
        &self,
        cx: &CallContext,
        filter: Document,
        options: impl Into<Option<FindOneAndDeleteOptions>>,
    ) -> Result<Option<Document>, Error> {
        let options = options.into();
        self.execute(cx, Params::FindOneAndDelete { filter, options })
            .await
    }

    pub async fn find_one_and_replace(
        &self,
        cx: &CallContext,
        filter: Document,
        replacement: Document,
        options: impl Into<Option<FindOneAndReplaceOptions>>,
    ) -> Result<Option<Document>, Error> {
        let params = Params::FindOneAndReplace {
            filter,
            replacement,
            options: options.into(),
        };
        self.execute(cx, params).await
    }

    pub async fn find_one_and_update(
        &self,
        cx: &CallContext,
        filter: Document,
        update: impl Into<UpdateModifications>,
        options: impl Into<Option<FindOneAndUpdateOptions>>,
    ) -> Result<Option<Document>, Error> {
        let params = Params::FindOneAndUpdate {
            filter,
            update: update.into(),
            options: options.into(),
        };
        self.execute(cx, params).await
    }

    /// Open a change stream on the collection.
    pub async fn watch(
        &self,
        cx: &CallContext,
        pipeline: Vec<Document>,
        options: impl Into<Option<ChangeStreamOptions>>,
    ) -> Result<Cursor, Error> {
        let options = options.into();
        self.open_cursor(cx, Params::Watch { pipeline, options })
            .await
    }

    pub async fn list_indexes(
        &self,
        cx: &CallContext,
        options: impl Into<Option<ListIndexesOptions>>,
    ) -> Result<Vec<Document>, Error> {
        let options = options.into();
        self.execute(cx, Params::ListIndexes { options }).await
    }

    pub async fn drop(
        &self,
        cx: &CallContext,
        options: impl Into<Option<DropCollectionOptions>>,
    ) -> Result<(), Error> {
        let options = options.into();
        self.execute(cx, Params::Drop { options }).await
    }

    /// Issue a batch of writes against this collection.
    pub async fn bulk_write(
        &self,
        cx: &CallContext,
        models: Vec<WriteModel>,
        options: impl Into<Option<BulkWriteOptions>>,
    ) -> Result<BulkWriteResult, Error> {
        let options = options.into();
        self.execute(cx, Params::BulkWrite { models, options })
            .await
    }

    async fn execute<R>(&self, cx: &CallContext, params: Params) -> Result<R, Error>
    where
        R: FromOutcome,
    {
        let op = Operation::new(self.namespace.clone(), params, cx.clone());
        let mut call = DriverCall {
            driver: self.driver.as_ref(),
        };
        self.pipeline.execute(op, &mut call).await
    }

    async fn open_cursor(&self, cx: &CallContext, params: Params) -> Result<Cursor, Error> {
        let mut op = Operation::new(self.namespace.clone(), params, cx.clone());
        let mut call = DriverCall {
            driver: self.driver.as_ref(),
        };
        self.pipeline.run(&mut op, &mut call).await?;

        // Cursor operations are correlated to the context as updated by handlers.
        let correlation = op.context().clone();
        let raw: Box<dyn RawCursor> = self.pipeline.into_result(op)?;
        let cursor = Cursor::new(
            raw,
            correlation,
            self.namespace.clone(),
            Arc::clone(&self.pipeline),
        );
        Ok(cursor)
    }
}

/// Issue operations to the driver, honouring the caller's cancellation signals.
struct DriverCall<'a> {
    driver: &'a dyn Driver,
}

#[async_trait::async_trait]
impl Terminal for DriverCall<'_> {
    async fn execute(&mut self, op: &mut Operation) {
        let context = op.context().clone();
        let namespace = op.namespace().clone();
        let params = op.params().clone();
        let result = context
            .guard(self.driver.execute(&namespace, params, &context))
            .await;
        op.complete(result);
    }
}
