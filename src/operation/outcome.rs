//! Results recorded on operations by the driver call.
use std::collections::HashMap;

use mongodb::bson::Bson;
use mongodb::bson::Document;

use crate::client::RawCursor;

/// Result of an insert one operation.
#[derive(Clone, Debug, PartialEq)]
pub struct InsertOneResult {
    /// The `_id` of the inserted document.
    pub inserted_id: Bson,
}

impl From<mongodb::results::InsertOneResult> for InsertOneResult {
    fn from(result: mongodb::results::InsertOneResult) -> Self {
        InsertOneResult {
            inserted_id: result.inserted_id,
        }
    }
}

/// Result of an insert many operation.
#[derive(Clone, Debug, PartialEq)]
pub struct InsertManyResult {
    /// The `_id` of each inserted document, keyed by its index in the request.
    pub inserted_ids: HashMap<usize, Bson>,
}

impl From<mongodb::results::InsertManyResult> for InsertManyResult {
    fn from(result: mongodb::results::InsertManyResult) -> Self {
        InsertManyResult {
            inserted_ids: result.inserted_ids,
        }
    }
}

/// Result of a delete operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeleteResult {
    pub deleted_count: u64,
}

impl From<mongodb::results::DeleteResult> for DeleteResult {
    fn from(result: mongodb::results::DeleteResult) -> Self {
        DeleteResult {
            deleted_count: result.deleted_count,
        }
    }
}

/// Result of an update or replace operation.
#[derive(Clone, Debug, PartialEq)]
pub struct UpdateResult {
    pub matched_count: u64,
    pub modified_count: u64,
    pub upserted_id: Option<Bson>,
}

impl From<mongodb::results::UpdateResult> for UpdateResult {
    fn from(result: mongodb::results::UpdateResult) -> Self {
        UpdateResult {
            matched_count: result.matched_count,
            modified_count: result.modified_count,
            upserted_id: result.upserted_id,
        }
    }
}

/// Summary result of a bulk write operation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BulkWriteResult {
    pub inserted_count: i64,
    pub matched_count: i64,
    pub modified_count: i64,
    pub deleted_count: i64,
    pub upserted_count: i64,
}

impl From<mongodb::results::SummaryBulkWriteResult> for BulkWriteResult {
    fn from(result: mongodb::results::SummaryBulkWriteResult) -> Self {
        BulkWriteResult {
            inserted_count: result.inserted_count,
            matched_count: result.matched_count,
            modified_count: result.modified_count,
            deleted_count: result.deleted_count,
            upserted_count: result.upserted_count,
        }
    }
}

/// Successful result of an operation.
pub enum Outcome {
    InsertOne(InsertOneResult),
    InsertMany(InsertManyResult),
    Delete(DeleteResult),
    Update(UpdateResult),
    BulkWrite(BulkWriteResult),
    Count(u64),
    Values(Vec<Bson>),
    Document(Option<Document>),
    Documents(Vec<Document>),
    Cursor(Box<dyn RawCursor>),
    Advanced(bool),
    Unit,
}

impl Outcome {
    /// Name of the result type, used to report mismatches.
    pub fn name(&self) -> &'static str {
        match self {
            Outcome::InsertOne(_) => InsertOneResult::NAME,
            Outcome::InsertMany(_) => InsertManyResult::NAME,
            Outcome::Delete(_) => DeleteResult::NAME,
            Outcome::Update(_) => UpdateResult::NAME,
            Outcome::BulkWrite(_) => BulkWriteResult::NAME,
            Outcome::Count(_) => <u64 as FromOutcome>::NAME,
            Outcome::Values(_) => <Vec<Bson> as FromOutcome>::NAME,
            Outcome::Document(_) => <Option<Document> as FromOutcome>::NAME,
            Outcome::Documents(_) => <Vec<Document> as FromOutcome>::NAME,
            Outcome::Cursor(_) => <Box<dyn RawCursor> as FromOutcome>::NAME,
            Outcome::Advanced(_) => <bool as FromOutcome>::NAME,
            Outcome::Unit => <() as FromOutcome>::NAME,
        }
    }
}

impl std::fmt::Debug for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::InsertOne(result) => f.debug_tuple("InsertOne").field(result).finish(),
            Outcome::InsertMany(result) => f.debug_tuple("InsertMany").field(result).finish(),
            Outcome::Delete(result) => f.debug_tuple("Delete").field(result).finish(),
            Outcome::Update(result) => f.debug_tuple("Update").field(result).finish(),
            Outcome::BulkWrite(result) => f.debug_tuple("BulkWrite").field(result).finish(),
            Outcome::Count(count) => f.debug_tuple("Count").field(count).finish(),
            Outcome::Values(values) => f.debug_tuple("Values").field(values).finish(),
            Outcome::Document(document) => f.debug_tuple("Document").field(document).finish(),
            Outcome::Documents(documents) => f.debug_tuple("Documents").field(documents).finish(),
            Outcome::Cursor(_) => f.write_str("Cursor"),
            Outcome::Advanced(more) => f.debug_tuple("Advanced").field(more).finish(),
            Outcome::Unit => f.write_str("Unit"),
        }
    }
}

/// Typed extraction of an [`Outcome`] for the caller of an operation.
pub trait FromOutcome: Sized {
    /// Name of the type reported in mismatch errors.
    const NAME: &'static str;

    /// Extract the typed result, returning the outcome back if it has a different type.
    fn from_outcome(outcome: Outcome) -> Result<Self, Outcome>;
}

macro_rules! from_outcome {
    ($type:ty, $name:literal, $variant:ident) => {
        impl FromOutcome for $type {
            const NAME: &'static str = $name;

            fn from_outcome(outcome: Outcome) -> Result<Self, Outcome> {
                match outcome {
                    Outcome::$variant(value) => Ok(value),
                    other => Err(other),
                }
            }
        }
    };
}

from_outcome!(InsertOneResult, "InsertOneResult", InsertOne);
from_outcome!(InsertManyResult, "InsertManyResult", InsertMany);
from_outcome!(DeleteResult, "DeleteResult", Delete);
from_outcome!(UpdateResult, "UpdateResult", Update);
from_outcome!(BulkWriteResult, "BulkWriteResult", BulkWrite);
from_outcome!(u64, "Count", Count);
from_outcome!(Vec<Bson>, "Values", Values);
from_outcome!(Option<Document>, "Document", Document);
from_outcome!(Vec<Document>, "Documents", Documents);
from_outcome!(Box<dyn RawCursor>, "Cursor", Cursor);
from_outcome!(bool, "Advanced", Advanced);

impl FromOutcome for () {
    const NAME: &'static str = "Unit";

    fn from_outcome(outcome: Outcome) -> Result<Self, Outcome> {
        match outcome {
            Outcome::Unit => Ok(()),
            other => Err(other),
        }
    }
}
