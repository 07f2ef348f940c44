//! Structured logs for operations issued through the pipeline.
use std::time::Instant;

use slog::Logger;

use crate::operation::Operation;
use crate::pipeline::Handler;
use crate::pipeline::Next;

/// Handler logging the outcome of every operation.
///
/// Successful operations are logged at debug level and failures at warning level.
/// Operations cancelled by the caller or past their deadline are logged at info level.
#[derive(Clone)]
pub struct LogHook {
    logger: Logger,
}

impl LogHook {
    pub fn new(logger: Logger) -> LogHook {
        LogHook { logger }
    }
}

#[async_trait::async_trait]
impl Handler for LogHook {
    async fn handle(&self, op: &mut Operation, next: Next<'_>) {
        let start = Instant::now();
        next.run(op).await;
        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
        match op.error() {
            None => slog::debug!(
                self.logger,
                "MongoDB operation completed";
                "op" => %op.kind(),
                "ns" => %op.namespace(),
                "duration_ms" => duration_ms,
            ),
            Some(error) if error.is_cancellation() => slog::info!(
                self.logger,
                "MongoDB operation abandoned by the caller";
                "op" => %op.kind(),
                "ns" => %op.namespace(),
                "duration_ms" => duration_ms,
                "error" => %error,
            ),
            Some(error) => slog::warn!(
                self.logger,
                "MongoDB operation failed";
                "op" => %op.kind(),
                "ns" => %op.namespace(),
                "duration_ms" => duration_ms,
                "error" => %error,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::Mutex;

    use mongodb::bson::doc;
    use slog::Level;
    use slog::Logger;
    use slog::Never;
    use slog::OwnedKVList;
    use slog::Record;

    use super::LogHook;
    use crate::context::CallContext;
    use crate::operation::OperationKind;
    use crate::pipeline::Pipeline;
    use crate::testing::MockDriver;

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<(Level, String)>>>);

    impl slog::Drain for Capture {
        type Ok = ();
        type Err = Never;

        fn log(&self, record: &Record, _: &OwnedKVList) -> Result<(), Never> {
            self.0
                .lock()
                .unwrap()
                .push((record.level(), record.msg().to_string()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn log_by_outcome() {
        let capture = Capture::default();
        let logger = Logger::root(capture.clone(), slog::o!());
        let driver = MockDriver::default().fail(OperationKind::ReplaceOne, "duplicate key");
        let driver = Arc::new(driver);
        let pipeline = Pipeline::builder().handler(LogHook::new(logger)).build();
        let coll = driver.client(pipeline).database("app").collection("users");
        let cx = CallContext::new();

        coll.find_one(&cx, doc! {}, None).await.unwrap();
        let result = coll.replace_one(&cx, doc! {}, doc! {"a": 1}, None).await;
        assert!(result.is_err());

        let records = capture.0.lock().unwrap().clone();
        assert_eq!(
            records,
            vec![
                (Level::Debug, "MongoDB operation completed".to_string()),
                (Level::Warning, "MongoDB operation failed".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn cancellations_are_not_warnings() {
        let capture = Capture::default();
        let logger = Logger::root(capture.clone(), slog::o!());
        let driver = Arc::new(MockDriver::default());
        let pipeline = Pipeline::builder().handler(LogHook::new(logger)).build();
        let coll = driver.client(pipeline).database("app").collection("users");
        let token = tokio_util::sync::CancellationToken::new();
        token.cancel();
        let cx = CallContext::new().with_cancellation(token);

        let result = coll.count_documents(&cx, doc! {}, None).await;
        assert!(result.is_err());

        let records = capture.0.lock().unwrap().clone();
        assert_eq!(
            records,
            vec![(Level::Info, "MongoDB operation abandoned by the caller".to_string())]
        );
    }
}
