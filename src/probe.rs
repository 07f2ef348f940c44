//! Command line modes exercising the instrumented client.
use std::sync::Arc;

use anyhow::Context;
use anyhow::Result;
use mongodb::bson::Document;
use mongodb::options::FindOptions;
use prometheus::Registry;
use slog::Drain;
use slog::Logger;

use crate::cli::Cli;
use crate::cli::Mode;
use crate::cli::ProbeArgs;
use crate::client::InstrumentedClient;
use crate::conf::Conf;
use crate::context::CallContext;
use crate::hooks::LogHook;
use crate::hooks::MetricsHook;
use crate::hooks::TracingHook;
use crate::hooks::TracingHookOptions;
use crate::pipeline::Pipeline;
use crate::trace::OtelTracer;

/// Errors specific to the command line modes.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// The probe filter is not a valid JSON document.
    ///
    /// Error parameters:
    ///
    /// - The filter that caused the error.
    #[error("the probe filter is not a valid JSON document: '{0}'")]
    InvalidFilter(String),

    /// The parent trace string is not valid.
    #[error("the parent trace string is not valid")]
    InvalidParent,
}

/// Run the selected mode to completion.
pub async fn run(args: Cli, conf: Conf) -> Result<()> {
    let logger = logger();
    let tracing = crate::trace::install(&conf.tracing)?;
    slog::debug!(
        logger, "Tracing initialised";
        "backend" => ?conf.tracing.backend,
        "owned_provider" => tracing.owns_provider(),
    );

    let result = match args.mode {
        Mode::Ping => ping(&logger, &conf).await,
        Mode::Probe(probe_args) => probe(&logger, &conf, probe_args).await,
    };

    if let Err(error) = tracing.shutdown() {
        slog::warn!(logger, "Unable to flush spans on shutdown"; "error" => %error);
    }
    result
}

async fn ping(logger: &Logger, conf: &Conf) -> Result<()> {
    crate::client::connect(&conf.mongodb).await?;
    slog::info!(logger, "MongoDB server is reachable"; "uri" => &conf.mongodb.uri);
    Ok(())
}

async fn probe(logger: &Logger, conf: &Conf, args: ProbeArgs) -> Result<()> {
    let filter: Document = serde_json::from_str(&args.filter)
        .with_context(|| ProbeError::InvalidFilter(args.filter.clone()))?;

    let registry = Registry::new();
    crate::hooks::metrics::register(&registry)?;
    let options = TracingHookOptions::from(&conf.instrumentation);
    let pipeline = Pipeline::builder()
        .logger(logger.clone())
        .strict(false)
        .handler(LogHook::new(logger.clone()))
        .handler(MetricsHook)
        .handler(TracingHook::with_options(Arc::new(OtelTracer::global()), options))
        .build();

    let client = crate::client::connect(&conf.mongodb).await?;
    let client = InstrumentedClient::new(client, Arc::new(pipeline));
    let database = args.database.as_deref().unwrap_or(&conf.mongodb.database);
    let collection = client.database(database).collection(&args.collection);

    let cx = match &args.parent {
        None => CallContext::current(),
        Some(parent) => {
            let parent =
                crate::trace::context_from_trace_string(parent).context(ProbeError::InvalidParent)?;
            CallContext::new().with_trace_context(parent)
        }
    };

    let count = collection.count_documents(&cx, filter.clone(), None).await?;
    let options = FindOptions::builder().limit(args.limit).build();
    let mut cursor = collection.find(&cx, filter, options).await?;
    if let Some(trace) = crate::trace::trace_string(cursor.correlation().trace_context()) {
        slog::info!(logger, "Reading documents"; "trace" => trace);
    }

    let mut read = 0;
    while cursor.next(&cx).await? {
        let document: Document = cursor.decode(&cx).await?;
        slog::debug!(logger, "Read document"; "id" => ?document.get("_id"));
        read += 1;
    }
    cursor.close(&cx).await?;
    slog::info!(
        logger, "Probe completed";
        "ns" => %collection.namespace(),
        "matching" => count,
        "read" => read,
    );

    if args.metrics {
        let metrics = prometheus::TextEncoder::new().encode_to_string(&registry.gather())?;
        println!("{}", metrics);
    }
    Ok(())
}

/// Build the process root logger.
fn logger() -> Logger {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    Logger::root(drain, slog::o!("app" => env!("CARGO_PKG_NAME")))
}
