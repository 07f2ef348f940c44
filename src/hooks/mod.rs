//! Handlers shipped with the crate to observe operations.
pub mod logging;
pub mod metrics;
pub mod tracing;

pub use self::logging::LogHook;
pub use self::metrics::MetricsHook;
pub use self::tracing::TracingHook;
pub use self::tracing::TracingHookOptions;
