//! Prometheus metrics about operations issued through the pipeline.
use anyhow::Result;
use once_cell::sync::Lazy;
use prometheus::Counter;
use prometheus::CounterVec;
use prometheus::HistogramOpts;
use prometheus::HistogramTimer;
use prometheus::HistogramVec;
use prometheus::Opts;
use prometheus::Registry;

use crate::operation::Operation;
use crate::pipeline::Handler;
use crate::pipeline::Next;

/// Duration (in seconds) of MongoDB operations issued to the server.
pub static MONGODB_OPS_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "mongodb_traced_operations_duration",
            "Duration (in seconds) of MongoDB operations issued to the server",
        )
        .buckets(vec![
            0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
        ]),
        &["op"],
    )
    .expect("failed to initialise MONGODB_OPS_DURATION histogram")
});

/// Number of MongoDB operations that returned an error.
pub static MONGODB_OPS_ERR: Lazy<CounterVec> = Lazy::new(|| {
    CounterVec::new(
        Opts::new(
            "mongodb_traced_operations_error",
            "Number of MongoDB operations that returned an error",
        ),
        &["op"],
    )
    .expect("failed to initialise MONGODB_OPS_ERR counter")
});

/// Register operation metrics with the given registry.
pub fn register(registry: &Registry) -> Result<()> {
    let collectors: [Box<dyn prometheus::core::Collector>; 2] = [
        Box::new(MONGODB_OPS_DURATION.clone()),
        Box::new(MONGODB_OPS_ERR.clone()),
    ];
    for collector in collectors {
        registry.register(collector)?;
    }
    Ok(())
}

/// Observe the execution of a MongoDB server operation.
///
/// ## Returns
///
/// - A [`Counter`] to increment in case of error.
/// - A started timer to observe the duration of the operation.
#[inline]
pub fn observe_mongodb_op(op: &str) -> (Counter, HistogramTimer) {
    let err_count = MONGODB_OPS_ERR.with_label_values(&[op]);
    let timer = MONGODB_OPS_DURATION.with_label_values(&[op]).start_timer();
    (err_count, timer)
}

/// Handler observing operation durations and errors.
#[derive(Clone, Copy, Debug, Default)]
pub struct MetricsHook;

#[async_trait::async_trait]
impl Handler for MetricsHook {
    async fn handle(&self, op: &mut Operation, next: Next<'_>) {
        let (err_count, timer) = observe_mongodb_op(op.kind().as_str());
        next.run(op).await;
        if op.error().is_some() {
            err_count.inc();
        }
        timer.observe_duration();
    }
}
