//! Descriptor of a single logical database operation as it flows through the handlers pipeline.
use crate::context::CallContext;
use crate::errors::Error;

mod kind;
mod outcome;
mod params;

pub use self::kind::OperationKind;
pub use self::outcome::BulkWriteResult;
pub use self::outcome::DeleteResult;
pub use self::outcome::FromOutcome;
pub use self::outcome::InsertManyResult;
pub use self::outcome::InsertOneResult;
pub use self::outcome::Outcome;
pub use self::outcome::UpdateResult;
pub use self::params::Params;
pub use self::params::WriteModel;

pub(crate) use self::params::update_to_bson;

/// Database and collection an operation targets.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Namespace {
    pub db: String,
    pub coll: String,
}

impl Namespace {
    pub fn new<D, C>(db: D, coll: C) -> Namespace
    where
        D: Into<String>,
        C: Into<String>,
    {
        Namespace {
            db: db.into(),
            coll: coll.into(),
        }
    }
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.db, self.coll)
    }
}

/// A logical database operation, created per call and never shared across calls.
///
/// The operation result is write-once: the first call to [`Operation::complete`]
/// or [`Operation::reject`] records it and later writes are ignored.
/// The only exception is [`Operation::replace_error`], used by handlers that
/// translate errors after the server call.
#[derive(Debug)]
pub struct Operation {
    namespace: Namespace,
    params: Params,
    context: CallContext,
    correlation: Option<CallContext>,
    result: Option<Result<Outcome, Error>>,
}

impl Operation {
    /// Describe a new operation issued by the caller.
    pub fn new(namespace: Namespace, params: Params, context: CallContext) -> Operation {
        Operation {
            namespace,
            params,
            context,
            correlation: None,
            result: None,
        }
    }

    /// Describe a cursor operation linked to the operation that returned the cursor.
    pub fn continuation(
        namespace: Namespace,
        params: Params,
        context: CallContext,
        correlation: CallContext,
    ) -> Operation {
        Operation {
            namespace,
            params,
            context,
            correlation: Some(correlation),
            result: None,
        }
    }

    pub fn kind(&self) -> OperationKind {
        self.params.kind()
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Context of the call, as updated by the handlers that ran so far.
    pub fn context(&self) -> &CallContext {
        &self.context
    }

    /// Replace the call context seen by later handlers and the driver call.
    pub fn set_context(&mut self, context: CallContext) {
        self.context = context;
    }

    /// Context of the operation that returned the cursor, for cursor operations.
    pub fn correlation(&self) -> Option<&CallContext> {
        self.correlation.as_ref()
    }

    /// Check if a result or error was recorded.
    pub fn is_executed(&self) -> bool {
        self.result.is_some()
    }

    /// Error recorded on the operation, if any.
    pub fn error(&self) -> Option<&Error> {
        match &self.result {
            Some(Err(error)) => Some(error),
            _ => None,
        }
    }

    /// Successful result recorded on the operation, if any.
    pub fn outcome(&self) -> Option<&Outcome> {
        match &self.result {
            Some(Ok(outcome)) => Some(outcome),
            _ => None,
        }
    }

    /// Check if the operation successfully returned a cursor.
    pub fn returned_cursor(&self) -> bool {
        matches!(self.result, Some(Ok(Outcome::Cursor(_))))
    }

    /// Record the operation result.
    ///
    /// Returns `false`, dropping the given result, if a result was already recorded.
    pub fn complete(&mut self, result: Result<Outcome, Error>) -> bool {
        if self.result.is_some() {
            return false;
        }
        self.result = Some(result);
        true
    }

    /// Record an error without contacting the server.
    pub fn reject(&mut self, error: Error) -> bool {
        self.complete(Err(error))
    }

    /// Replace an already recorded error with a different one.
    ///
    /// Successful results are never replaced and `false` is returned.
    pub fn replace_error(&mut self, error: Error) -> bool {
        match &mut self.result {
            Some(Err(current)) => {
                *current = error;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn into_result(self) -> Option<Result<Outcome, Error>> {
        self.result
    }
}

#[cfg(test)]
mod tests {
    use mongodb::bson::doc;

    use super::DeleteResult;
    use super::Namespace;
    use super::Operation;
    use super::OperationKind;
    use super::Outcome;
    use super::Params;
    use crate::context::CallContext;
    use crate::errors::Error;

    fn operation() -> Operation {
        let params = Params::DeleteOne {
            filter: doc! {"_id": 1},
            options: None,
        };
        Operation::new(Namespace::new("db", "coll"), params, CallContext::new())
    }

    #[test]
    fn result_is_write_once() {
        let mut op = operation();
        assert!(!op.is_executed());
        assert!(op.complete(Ok(Outcome::Delete(DeleteResult { deleted_count: 1 }))));
        assert!(!op.reject(Error::rejected("late")));
        assert!(op.error().is_none());
        assert!(matches!(
            op.outcome(),
            Some(Outcome::Delete(DeleteResult { deleted_count: 1 }))
        ));
    }

    #[test]
    fn replace_error_only_replaces_errors() {
        let mut op = operation();
        assert!(!op.replace_error(Error::Cancelled));
        op.reject(Error::rejected("policy"));
        assert!(op.replace_error(Error::DeadlineExceeded));
        assert!(matches!(op.error(), Some(Error::DeadlineExceeded)));
    }

    #[test]
    fn kind_follows_params() {
        let op = operation();
        assert_eq!(op.kind(), OperationKind::DeleteOne);
        assert_eq!(op.namespace().to_string(), "db.coll");
        assert!(op.correlation().is_none());
    }
}
