//! Instrumentation constants shared by hooks and the client facade.

/// Default maximum length of diagnostic fields attached to spans.
pub const DEFAULT_FIELD_LEN_MAX: usize = 3000;

/// Maximum number of bulk write models rendered into diagnostic fields.
pub const BULK_MODELS_SHOWN_MAX: usize = 5;

/// Name of the database to run admin commands against (also known as the admin database).
pub const DB_ADMIN: &str = "admin";

/// Name of the command used to check the server is reachable.
pub const CMD_PING: &str = "ping";

/// Name of the instrumentation library reported to OpenTelemetry.
pub const TRACER_NAME: &str = env!("CARGO_PKG_NAME");

/// Span tags attached to every operation span.
pub mod tags {
    /// Tag describing the component issuing the operation.
    pub const COMPONENT: &str = "component";

    /// Tag describing the kind of span.
    pub const SPAN_KIND: &str = "span.kind";

    /// Tag describing the remote service the span talks to.
    pub const PEER_SERVICE: &str = "peer.service";

    /// Tag naming the database system.
    pub const DB_SYSTEM: &str = "db.system";

    /// Tag naming the target database.
    pub const DB_NAME: &str = "db.name";

    /// Tag naming the target collection.
    pub const DB_COLLECTION: &str = "db.collection";

    /// Tag marking the span as failed.
    pub const ERROR: &str = "error";

    /// Value of the [`COMPONENT`] tag.
    pub const COMPONENT_VALUE: &str = "mongo";

    /// Value of the [`SPAN_KIND`] tag.
    pub const SPAN_KIND_VALUE: &str = "/driver/mongodb";

    /// Value of the [`PEER_SERVICE`] tag.
    pub const PEER_SERVICE_VALUE: &str = "collection";

    /// Value of the [`DB_SYSTEM`] tag.
    pub const DB_SYSTEM_VALUE: &str = "mongodb";
}

/// Span log field keys emitted by the tracing hook.
///
/// These keys are a stable naming contract log consumers can depend on.
pub mod fields {
    pub const OPTIONS: &str = "db.exec.options";
    pub const DOCUMENTS: &str = "db.exec.documents";
    pub const FILTER: &str = "db.exec.filter";
    pub const UPDATE: &str = "db.exec.update";
    pub const REPLACEMENT: &str = "db.exec.replacement";
    pub const PIPELINE: &str = "db.exec.pipeline";
    pub const FIELD_NAME: &str = "db.exec.fieldName";
    pub const MODELS: &str = "db.exec.models";
    pub const ERR: &str = "db.exec.err";

    /// Reason a cursor span was finished without `All` or `Close`.
    pub const CURSOR: &str = "db.exec.cursor";
}
