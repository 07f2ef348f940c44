//! Closed set of operations the instrumented client can issue.

/// Kind of operation described by an [`Operation`](super::Operation).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OperationKind {
    InsertOne,
    InsertMany,
    DeleteOne,
    DeleteMany,
    UpdateOne,
    UpdateMany,
    UpdateByKey,
    ReplaceOne,
    Aggregate,
    CountDocuments,
    Distinct,
    Find,
    FindOne,
    FindOneAndDelete,
    FindOneAndReplace,
    FindOneAndUpdate,
    Watch,
    ListIndexes,
    Drop,
    BulkWrite,
    CursorAll,
    CursorNext,
    CursorDecode,
    CursorClose,
}

impl OperationKind {
    /// Every operation kind, in declaration order.
    pub const ALL: [OperationKind; 24] = [
        OperationKind::InsertOne,
        OperationKind::InsertMany,
        OperationKind::DeleteOne,
        OperationKind::DeleteMany,
        OperationKind::UpdateOne,
        OperationKind::UpdateMany,
        OperationKind::UpdateByKey,
        OperationKind::ReplaceOne,
        OperationKind::Aggregate,
        OperationKind::CountDocuments,
        OperationKind::Distinct,
        OperationKind::Find,
        OperationKind::FindOne,
        OperationKind::FindOneAndDelete,
        OperationKind::FindOneAndReplace,
        OperationKind::FindOneAndUpdate,
        OperationKind::Watch,
        OperationKind::ListIndexes,
        OperationKind::Drop,
        OperationKind::BulkWrite,
        OperationKind::CursorAll,
        OperationKind::CursorNext,
        OperationKind::CursorDecode,
        OperationKind::CursorClose,
    ];

    /// Name of the operation as reported in span names, logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::InsertOne => "InsertOne",
            OperationKind::InsertMany => "InsertMany",
            OperationKind::DeleteOne => "DeleteOne",
            OperationKind::DeleteMany => "DeleteMany",
            OperationKind::UpdateOne => "UpdateOne",
            OperationKind::UpdateMany => "UpdateMany",
            OperationKind::UpdateByKey => "UpdateByKey",
            OperationKind::ReplaceOne => "ReplaceOne",
            OperationKind::Aggregate => "Aggregate",
            OperationKind::CountDocuments => "CountDocuments",
            OperationKind::Distinct => "Distinct",
            OperationKind::Find => "Find",
            OperationKind::FindOne => "FindOne",
            OperationKind::FindOneAndDelete => "FindOneAndDelete",
            OperationKind::FindOneAndReplace => "FindOneAndReplace",
            OperationKind::FindOneAndUpdate => "FindOneAndUpdate",
            OperationKind::Watch => "Watch",
            OperationKind::ListIndexes => "ListIndexes",
            OperationKind::Drop => "Drop",
            OperationKind::BulkWrite => "BulkWrite",
            OperationKind::CursorAll => "CursorAll",
            OperationKind::CursorNext => "CursorNext",
            OperationKind::CursorDecode => "CursorDecode",
            OperationKind::CursorClose => "CursorClose",
        }
    }

    /// Operations issued against a cursor returned by an earlier operation.
    pub fn is_cursor_continuation(&self) -> bool {
        matches!(
            self,
            OperationKind::CursorAll
                | OperationKind::CursorNext
                | OperationKind::CursorDecode
                | OperationKind::CursorClose
        )
    }

    /// Operations that hand a server-side cursor back to the caller.
    pub fn returns_cursor(&self) -> bool {
        matches!(
            self,
            OperationKind::Find | OperationKind::Aggregate | OperationKind::Watch
        )
    }

    /// Cursor operations that end the logical lifetime of the cursor.
    pub fn terminates_cursor(&self) -> bool {
        matches!(self, OperationKind::CursorAll | OperationKind::CursorClose)
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::OperationKind;

    #[test]
    fn names_are_unique() {
        let mut names: Vec<&str> = OperationKind::ALL.iter().map(|kind| kind.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), OperationKind::ALL.len());
    }

    #[test]
    fn cursor_classification() {
        for kind in OperationKind::ALL {
            if kind.terminates_cursor() {
                assert!(kind.is_cursor_continuation(), "{} terminates a cursor", kind);
            }
            if kind.returns_cursor() {
                assert!(!kind.is_cursor_continuation(), "{} opens a cursor", kind);
            }
        }
        assert!(!OperationKind::CursorNext.terminates_cursor());
        assert!(!OperationKind::CursorDecode.terminates_cursor());
    }
}
