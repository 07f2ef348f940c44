//! Possible errors encountered by instrumented operations.

/// Errors returned by instrumented MongoDB operations.
///
/// Driver errors are forwarded unchanged through the [`Error::Driver`] variant
/// so callers can inspect them exactly as if they had called the driver directly.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The operation was cancelled by the caller before it completed.
    #[error("the operation was cancelled by the caller")]
    Cancelled,

    /// The operation did not complete before the caller's deadline.
    #[error("the operation deadline was exceeded")]
    DeadlineExceeded,

    /// Error returned by the MongoDB driver.
    #[error(transparent)]
    Driver(#[from] mongodb::error::Error),

    /// The handlers pipeline was misused.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// A handler vetoed the operation before it reached the server.
    ///
    /// Error parameters:
    ///
    /// - Reason the operation was rejected.
    #[error("the operation was rejected: {0}")]
    Rejected(String),
}

impl Error {
    /// A handler vetoed the operation before it reached the server.
    pub fn rejected<S: Into<String>>(reason: S) -> Self {
        Self::Rejected(reason.into())
    }

    /// Check if the error reports the caller gave up on the operation.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::Cancelled | Error::DeadlineExceeded)
    }
}

/// Programming errors detected while running operations through the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The operation already carries a result and can't be executed again.
    #[error("operation {0} was already executed and can't be executed again")]
    // (kind,)
    AlreadyExecuted(&'static str),

    /// A handler stopped the chain without recording a result or an error.
    #[error("operation {0} was not executed: a handler stopped the chain without a result")]
    // (kind,)
    NotExecuted(&'static str),

    /// The operation result does not match the type expected by the caller.
    ///
    /// Error parameters:
    ///
    /// - The result type the caller expected.
    /// - The result type recorded on the operation.
    #[error("operation result type mismatch: expected {expected}, found {found}")]
    ResultMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// The cursor has no current document to decode.
    #[error("the cursor has no current document, advance it first")]
    NoCurrentDocument,

    /// The operation can't be executed by the driver directly.
    #[error("operation {0} must be issued through a cursor")]
    // (kind,)
    NotDriverOperation(&'static str),
}

/// Unable to parse a flat trace string.
#[derive(Debug, thiserror::Error)]
pub enum TraceStringError {
    /// The trace string does not have the `version-trace-span-flags` form.
    ///
    /// Error parameters:
    ///
    /// - The trace string that caused the error.
    #[error("trace string '{0}' does not have the version-trace-span-flags format")]
    Format(String),

    /// The trace string references an invalid trace or span ID.
    ///
    /// Error parameters:
    ///
    /// - The trace string that caused the error.
    #[error("trace string '{0}' references an invalid trace or span id")]
    InvalidIds(String),

    /// The trace string version is not supported.
    ///
    /// Error parameters:
    ///
    /// - The unsupported version.
    #[error("trace string version '{0}' is not supported")]
    UnsupportedVersion(String),
}

/// Errors related to the [MongoDB Client](mongodb::Client).
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Unable to create a MongoDB client.
    #[error("unable to create a MongoDB client")]
    CreateFailed,

    /// The MongoDB server did not respond to a ping.
    #[error("the MongoDB server did not respond to a ping")]
    PingFailed,

    /// The configured connection string is not valid.
    ///
    /// Error parameters:
    ///
    /// - The connection string that caused the error.
    #[error("the configured connection string is not valid: '{0}'")]
    UriNotValid(String),
}

impl ClientError {
    /// The configured connection string is not valid.
    pub fn uri_not_valid<S: Into<String>>(uri: S) -> Self {
        Self::UriNotValid(uri.into())
    }
}

/// Errors while installing the tracing provider.
#[derive(Debug, thiserror::Error)]
pub enum TraceInstallError {
    /// Unable to build the span exporter.
    #[error("unable to build the span exporter for endpoint '{0}'")]
    // (endpoint,)
    Exporter(String),
}

#[cfg(test)]
mod tests {
    use super::Error;
    use super::PipelineError;

    #[test]
    fn cancellation_kinds() {
        assert!(Error::Cancelled.is_cancellation());
        assert!(Error::DeadlineExceeded.is_cancellation());
        assert!(!Error::rejected("policy").is_cancellation());
        assert!(!Error::from(PipelineError::NotExecuted("Find")).is_cancellation());
    }

    #[test]
    fn driver_errors_are_transparent() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "connection reset");
        let driver = mongodb::error::Error::from(io);
        let expected = driver.to_string();
        let error = Error::from(driver);
        assert_eq!(error.to_string(), expected);
    }
}
