//! Caller supplied inputs for each operation kind.
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

use super::OperationKind;
use crate::constants::fields;
use crate::encode::Argument;

/// Arguments of an operation, one variant per [`OperationKind`].
///
/// Arguments are owned by the operation for its whole execution so handlers
/// can inspect them before and after the server call.
#[derive(Clone, Debug)]
pub enum Params {
    InsertOne {
        document: Document,
        options: Option<InsertOneOptions>,
    },
    InsertMany {
        documents: Vec<Document>,
        options: Option<InsertManyOptions>,
    },
    DeleteOne {
        filter: Document,
        options: Option<DeleteOptions>,
    },
    DeleteMany {
        filter: Document,
        options: Option<DeleteOptions>,
    },
    UpdateOne {
        filter: Document,
        update: UpdateModifications,
        options: Option<UpdateOptions>,
    },
    UpdateMany {
        filter: Document,
        update: UpdateModifications,
        options: Option<UpdateOptions>,
    },
    /// Update the single document whose `_id` equals `key`.
    UpdateByKey {
        key: Bson,
        update: UpdateModifications,
        options: Option<UpdateOptions>,
    },
    ReplaceOne {
        filter: Document,
        replacement: Document,
        options: Option<ReplaceOptions>,
    },
    Aggregate {
        pipeline: Vec<Document>,
        options: Option<AggregateOptions>,
    },
    CountDocuments {
        filter: Document,
        options: Option<CountOptions>,
    },
    Distinct {
        field_name: String,
        filter: Document,
        options: Option<DistinctOptions>,
    },
    Find {
        filter: Document,
        options: Option<FindOptions>,
    },
    FindOne {
        filter: Document,
        options: Option<FindOneOptions>,
    },
    FindOneAndDelete {
        filter: Document,
        options: Option<FindOneAndDeleteOptions>,
    },
    FindOneAndReplace {
        filter: Document,
        replacement: Document,
        options: Option<FindOneAndReplaceOptions>,
    },
    FindOneAndUpdate {
        filter: Document,
        update: UpdateModifications,
        options: Option<FindOneAndUpdateOptions>,
    },
    Watch {
        pipeline: Vec<Document>,
        options: Option<ChangeStreamOptions>,
    },
    ListIndexes {
        options: Option<ListIndexesOptions>,
    },
    Drop {
        options: Option<DropCollectionOptions>,
    },
    BulkWrite {
        models: Vec<WriteModel>,
        options: Option<BulkWriteOptions>,
    },
    CursorAll,
    CursorNext,
    CursorDecode,
    CursorClose,
}

impl Params {
    /// Kind of operation these arguments describe.
    pub fn kind(&self) -> OperationKind {
        match self {
            Params::InsertOne { .. } => OperationKind::InsertOne,
            Params::InsertMany { .. } => OperationKind::InsertMany,
            Params::DeleteOne { .. } => OperationKind::DeleteOne,
            Params::DeleteMany { .. } => OperationKind::DeleteMany,
            Params::UpdateOne { .. } => OperationKind::UpdateOne,
            Params::UpdateMany { .. } => OperationKind::UpdateMany,
            Params::UpdateByKey { .. } => OperationKind::UpdateByKey,
            Params::ReplaceOne { .. } => OperationKind::ReplaceOne,
            Params::Aggregate { .. } => OperationKind::Aggregate,
            Params::CountDocuments { .. } => OperationKind::CountDocuments,
            Params::Distinct { .. } => OperationKind::Distinct,
            Params::Find { .. } => OperationKind::Find,
            Params::FindOne { .. } => OperationKind::FindOne,
            Params::FindOneAndDelete { .. } => OperationKind::FindOneAndDelete,
            Params::FindOneAndReplace { .. } => OperationKind::FindOneAndReplace,
            Params::FindOneAndUpdate { .. } => OperationKind::FindOneAndUpdate,
            Params::Watch { .. } => OperationKind::Watch,
            Params::ListIndexes { .. } => OperationKind::ListIndexes,
            Params::Drop { .. } => OperationKind::Drop,
            Params::BulkWrite { .. } => OperationKind::BulkWrite,
            Params::CursorAll => OperationKind::CursorAll,
            Params::CursorNext => OperationKind::CursorNext,
            Params::CursorDecode => OperationKind::CursorDecode,
            Params::CursorClose => OperationKind::CursorClose,
        }
    }

    /// Diagnostic arguments attached to operation spans, keyed by log field name.
    ///
    /// Options are always included for operations that accept them.
    /// The set of keys depends only on the operation kind.
    pub fn diagnostics(&self) -> Vec<(&'static str, Argument<'_>)> {
        let mut diagnostics = Vec::with_capacity(3);
        if let Some(options) = self.options() {
            diagnostics.push((fields::OPTIONS, options));
        }
        match self {
            Params::InsertOne { document, .. } => {
                diagnostics.push((
                    fields::DOCUMENTS,
                    Argument::Documents(std::slice::from_ref(document)),
                ));
            }
            Params::InsertMany { documents, .. } => {
                diagnostics.push((fields::DOCUMENTS, Argument::Documents(documents)));
            }
            Params::DeleteOne { filter, .. }
            | Params::DeleteMany { filter, .. }
            | Params::CountDocuments { filter, .. }
            | Params::Find { filter, .. }
            | Params::FindOne { filter, .. }
            | Params::FindOneAndDelete { filter, .. } => {
                diagnostics.push((fields::FILTER, Argument::Document(filter)));
            }
            Params::UpdateOne { filter, update, .. }
            | Params::UpdateMany { filter, update, .. }
            | Params::FindOneAndUpdate { filter, update, .. } => {
                diagnostics.push((fields::FILTER, Argument::Document(filter)));
                diagnostics.push((fields::UPDATE, Argument::Update(update)));
            }
            Params::UpdateByKey { key, update, .. } => {
                diagnostics.push((fields::FILTER, Argument::Key(key)));
                diagnostics.push((fields::UPDATE, Argument::Update(update)));
            }
            Params::ReplaceOne {
                filter,
                replacement,
                ..
            }
            | Params::FindOneAndReplace {
                filter,
                replacement,
                ..
            } => {
                diagnostics.push((fields::FILTER, Argument::Document(filter)));
                diagnostics.push((fields::REPLACEMENT, Argument::Document(replacement)));
            }
            Params::Aggregate { pipeline, .. } | Params::Watch { pipeline, .. } => {
                diagnostics.push((fields::PIPELINE, Argument::Documents(pipeline)));
            }
            Params::Distinct {
                field_name, filter, ..
            } => {
                diagnostics.push((fields::FIELD_NAME, Argument::Text(field_name)));
                diagnostics.push((fields::FILTER, Argument::Document(filter)));
            }
            Params::BulkWrite { models, .. } => {
                diagnostics.push((fields::MODELS, Argument::Models(models)));
            }
            Params::ListIndexes { .. }
            | Params::Drop { .. }
            | Params::CursorAll
            | Params::CursorNext
            | Params::CursorDecode
            | Params::CursorClose => (),
        }
        diagnostics
    }

    /// Options argument for operations that accept options.
    ///
    /// Operations called without options render them as `null`.
    fn options(&self) -> Option<Argument<'_>> {
        fn debug<T: std::fmt::Debug>(options: &Option<T>) -> Argument<'_> {
            match options {
                Some(options) => Argument::Debug(options),
                None => Argument::Text("null"),
            }
        }
        let options = match self {
            Params::InsertOne { options, .. } => debug(options),
            Params::InsertMany { options, .. } => debug(options),
            Params::DeleteOne { options, .. } | Params::DeleteMany { options, .. } => {
                debug(options)
            }
            Params::UpdateOne { options, .. }
            | Params::UpdateMany { options, .. }
            | Params::UpdateByKey { options, .. } => debug(options),
            Params::ReplaceOne { options, .. } => debug(options),
            Params::Aggregate { options, .. } => debug(options),
            Params::CountDocuments { options, .. } => debug(options),
            Params::Distinct { options, .. } => debug(options),
            Params::Find { options, .. } => debug(options),
            Params::FindOne { options, .. } => debug(options),
            Params::FindOneAndDelete { options, .. } => debug(options),
            Params::FindOneAndReplace { options, .. } => debug(options),
            Params::FindOneAndUpdate { options, .. } => debug(options),
            Params::Watch { options, .. } => debug(options),
            Params::ListIndexes { options } => debug(options),
            Params::Drop { options } => debug(options),
            Params::BulkWrite { options, .. } => debug(options),
            Params::CursorAll | Params::CursorNext | Params::CursorDecode | Params::CursorClose => {
                return None
            }
        };
        Some(options)
    }
}

/// A single write in a [`Params::BulkWrite`] batch.
///
/// Models target the collection the bulk write is issued against.
#[derive(Clone, Debug)]
pub enum WriteModel {
    InsertOne {
        document: Document,
    },
    UpdateOne {
        filter: Document,
        update: UpdateModifications,
        upsert: Option<bool>,
    },
    UpdateMany {
        filter: Document,
        update: UpdateModifications,
        upsert: Option<bool>,
    },
    ReplaceOne {
        filter: Document,
        replacement: Document,
        upsert: Option<bool>,
    },
    DeleteOne {
        filter: Document,
    },
    DeleteMany {
        filter: Document,
    },
}

impl WriteModel {
    /// Name of the write, matching the server bulk write syntax.
    pub fn name(&self) -> &'static str {
        match self {
            WriteModel::InsertOne { .. } => "insertOne",
            WriteModel::UpdateOne { .. } => "updateOne",
            WriteModel::UpdateMany { .. } => "updateMany",
            WriteModel::ReplaceOne { .. } => "replaceOne",
            WriteModel::DeleteOne { .. } => "deleteOne",
            WriteModel::DeleteMany { .. } => "deleteMany",
        }
    }

    /// Document form of the model used for diagnostics.
    pub fn to_document(&self) -> Document {
        let mut body = Document::new();
        match self {
            WriteModel::InsertOne { document } => {
                body.insert("document", document.clone());
            }
            WriteModel::UpdateOne {
                filter,
                update,
                upsert,
            }
            | WriteModel::UpdateMany {
                filter,
                update,
                upsert,
            } => {
                body.insert("filter", filter.clone());
                body.insert("update", update_to_bson(update));
                if let Some(upsert) = upsert {
                    body.insert("upsert", *upsert);
                }
            }
            WriteModel::ReplaceOne {
                filter,
                replacement,
                upsert,
            } => {
                body.insert("filter", filter.clone());
                body.insert("replacement", replacement.clone());
                if let Some(upsert) = upsert {
                    body.insert("upsert", *upsert);
                }
            }
            WriteModel::DeleteOne { filter } | WriteModel::DeleteMany { filter } => {
                body.insert("filter", filter.clone());
            }
        }
        let mut model = Document::new();
        model.insert(self.name(), body);
        model
    }

    /// Convert the model into the driver's bulk write model for the given namespace.
    pub(crate) fn into_driver_model(
        self,
        namespace: &mongodb::Namespace,
    ) -> mongodb::options::WriteModel {
        use mongodb::options::DeleteManyModel;
        use mongodb::options::DeleteOneModel;
        use mongodb::options::InsertOneModel;
        use mongodb::options::ReplaceOneModel;
        use mongodb::options::UpdateManyModel;
        use mongodb::options::UpdateOneModel;

        let namespace = namespace.clone();
        match self {
            WriteModel::InsertOne { document } => {
                let model = InsertOneModel::builder()
                    .namespace(namespace)
                    .document(document)
                    .build();
                mongodb::options::WriteModel::InsertOne(model)
            }
            WriteModel::UpdateOne {
                filter,
                update,
                upsert,
            } => {
                let mut model = UpdateOneModel::builder()
                    .namespace(namespace)
                    .filter(filter)
                    .update(update)
                    .build();
                model.upsert = upsert;
                mongodb::options::WriteModel::UpdateOne(model)
            }
            WriteModel::UpdateMany {
                filter,
                update,
                upsert,
            } => {
                let mut model = UpdateManyModel::builder()
                    .namespace(namespace)
                    .filter(filter)
                    .update(update)
                    .build();
                model.upsert = upsert;
                mongodb::options::WriteModel::UpdateMany(model)
            }
            WriteModel::ReplaceOne {
                filter,
                replacement,
                upsert,
            } => {
                let mut model = ReplaceOneModel::builder()
                    .namespace(namespace)
                    .filter(filter)
                    .replacement(replacement)
                    .build();
                model.upsert = upsert;
                mongodb::options::WriteModel::ReplaceOne(model)
            }
            WriteModel::DeleteOne { filter } => {
                let model = DeleteOneModel::builder()
                    .namespace(namespace)
                    .filter(filter)
                    .build();
                mongodb::options::WriteModel::DeleteOne(model)
            }
            WriteModel::DeleteMany { filter } => {
                let model = DeleteManyModel::builder()
                    .namespace(namespace)
                    .filter(filter)
                    .build();
                mongodb::options::WriteModel::DeleteMany(model)
            }
        }
    }
}

/// BSON form of update modifications: a document or an aggregation pipeline.
pub(crate) fn update_to_bson(update: &UpdateModifications) -> Bson {
    #[allow(unreachable_patterns)]
    match update {
        UpdateModifications::Document(document) => Bson::Document(document.clone()),
        UpdateModifications::Pipeline(pipeline) => {
            Bson::Array(pipeline.iter().cloned().map(Bson::Document).collect())
        }
        other => Bson::String(format!("{:?}", other)),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use mongodb::bson::doc;
    use mongodb::bson::Bson;
    use mongodb::options::FindOptions;
    use mongodb::options::UpdateModifications;

    use super::Params;
    use super::WriteModel;
    use crate::constants::fields;
    use crate::operation::OperationKind;

    fn keys(params: &Params) -> BTreeSet<&'static str> {
        params.diagnostics().into_iter().map(|(key, _)| key).collect()
    }

    fn set(keys: &[&'static str]) -> BTreeSet<&'static str> {
        keys.iter().copied().collect()
    }

    fn update() -> UpdateModifications {
        UpdateModifications::Document(doc! {"$set": {"seen": true}})
    }

    /// Arguments for every kind, with the diagnostic fields they must log.
    fn sample(kind: OperationKind) -> (Params, BTreeSet<&'static str>) {
        let filter_only = set(&[fields::OPTIONS, fields::FILTER]);
        let filter_update = set(&[fields::OPTIONS, fields::FILTER, fields::UPDATE]);
        let filter_replacement = set(&[fields::OPTIONS, fields::FILTER, fields::REPLACEMENT]);
        match kind {
            OperationKind::InsertOne => (
                Params::InsertOne {
                    document: doc! {"a": 1},
                    options: None,
                },
                set(&[fields::OPTIONS, fields::DOCUMENTS]),
            ),
            OperationKind::InsertMany => (
                Params::InsertMany {
                    documents: vec![doc! {"a": 1}, doc! {"a": 2}],
                    options: None,
                },
                set(&[fields::OPTIONS, fields::DOCUMENTS]),
            ),
            OperationKind::DeleteOne => (
                Params::DeleteOne {
                    filter: doc! {"a": 1},
                    options: None,
                },
                filter_only,
            ),
            OperationKind::DeleteMany => (
                Params::DeleteMany {
                    filter: doc! {},
                    options: None,
                },
                filter_only,
            ),
            OperationKind::UpdateOne => (
                Params::UpdateOne {
                    filter: doc! {"a": 1},
                    update: update(),
                    options: None,
                },
                filter_update,
            ),
            OperationKind::UpdateMany => (
                Params::UpdateMany {
                    filter: doc! {},
                    update: update(),
                    options: None,
                },
                filter_update,
            ),
            OperationKind::UpdateByKey => (
                Params::UpdateByKey {
                    key: Bson::Int32(7),
                    update: update(),
                    options: None,
                },
                filter_update,
            ),
            OperationKind::ReplaceOne => (
                Params::ReplaceOne {
                    filter: doc! {"a": 1},
                    replacement: doc! {"b": 2},
                    options: None,
                },
                filter_replacement,
            ),
            OperationKind::Aggregate => (
                Params::Aggregate {
                    pipeline: vec![doc! {"$match": {}}],
                    options: None,
                },
                set(&[fields::OPTIONS, fields::PIPELINE]),
            ),
            OperationKind::CountDocuments => (
                Params::CountDocuments {
                    filter: doc! {},
                    options: None,
                },
                filter_only,
            ),
            OperationKind::Distinct => (
                Params::Distinct {
                    field_name: "name".into(),
                    filter: doc! {},
                    options: None,
                },
                set(&[fields::OPTIONS, fields::FIELD_NAME, fields::FILTER]),
            ),
            OperationKind::Find => (
                Params::Find {
                    filter: doc! {},
                    options: Some(FindOptions::default()),
                },
                filter_only,
            ),
            OperationKind::FindOne => (
                Params::FindOne {
                    filter: doc! {"a": 1},
                    options: None,
                },
                filter_only,
            ),
            OperationKind::FindOneAndDelete => (
                Params::FindOneAndDelete {
                    filter: doc! {"a": 1},
                    options: None,
                },
                filter_only,
            ),
            OperationKind::FindOneAndReplace => (
                Params::FindOneAndReplace {
                    filter: doc! {},
                    replacement: doc! {"b": 2},
                    options: None,
                },
                filter_replacement,
            ),
            OperationKind::FindOneAndUpdate => (
                Params::FindOneAndUpdate {
                    filter: doc! {},
                    update: update(),
                    options: None,
                },
                filter_update,
            ),
            OperationKind::Watch => (
                Params::Watch {
                    pipeline: vec![],
                    options: None,
                },
                set(&[fields::OPTIONS, fields::PIPELINE]),
            ),
            OperationKind::ListIndexes => {
                (Params::ListIndexes { options: None }, set(&[fields::OPTIONS]))
            }
            OperationKind::Drop => (Params::Drop { options: None }, set(&[fields::OPTIONS])),
            OperationKind::BulkWrite => (
                Params::BulkWrite {
                    models: vec![WriteModel::DeleteOne { filter: doc! {} }],
                    options: None,
                },
                set(&[fields::OPTIONS, fields::MODELS]),
            ),
            OperationKind::CursorAll => (Params::CursorAll, set(&[])),
            OperationKind::CursorNext => (Params::CursorNext, set(&[])),
            OperationKind::CursorDecode => (Params::CursorDecode, set(&[])),
            OperationKind::CursorClose => (Params::CursorClose, set(&[])),
        }
    }

    #[test]
    fn every_kind_has_matching_params_and_diagnostics() {
        for kind in OperationKind::ALL {
            let (params, expected) = sample(kind);
            assert_eq!(params.kind(), kind);
            assert_eq!(keys(&params), expected, "{}", kind);
        }
    }

    #[test]
    fn diagnostics_render_absent_options_as_null() {
        let (params, _) = sample(OperationKind::DeleteOne);
        let diagnostics = params.diagnostics();
        let options = diagnostics
            .iter()
            .find(|(key, _)| *key == fields::OPTIONS)
            .map(|(_, argument)| crate::encode::render(argument));
        assert_eq!(options.as_deref(), Some("null"));
    }

    #[test]
    fn write_model_documents() {
        let model = WriteModel::UpdateOne {
            filter: doc! {"_id": 1},
            update: update(),
            upsert: Some(true),
        };
        let expected = doc! {
            "updateOne": {
                "filter": {"_id": 1},
                "update": {"$set": {"seen": true}},
                "upsert": true
            }
        };
        assert_eq!(model.to_document(), expected);
        let model = WriteModel::DeleteMany { filter: doc! {} };
        assert_eq!(model.to_document(), doc! {"deleteMany": {"filter": {}}});
    }
}
