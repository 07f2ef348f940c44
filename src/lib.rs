//! Instrumented MongoDB client.
//!
//! Every operation issued through an [`InstrumentedClient`] is described by an
//! [`Operation`] and run through a [`Pipeline`] of handlers before reaching the driver.
//! The crate ships hooks to trace, measure and log operations:
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use mongodb_traced::hooks::TracingHook;
//! use mongodb_traced::trace::OtelTracer;
//! use mongodb_traced::CallContext;
//! use mongodb_traced::InstrumentedClient;
//! use mongodb_traced::Pipeline;
//!
//! # async fn example(client: mongodb::Client) -> Result<(), mongodb_traced::Error> {
//! let pipeline = Pipeline::builder()
//!     .handler(TracingHook::new(Arc::new(OtelTracer::global())))
//!     .build();
//! let client = InstrumentedClient::new(client, Arc::new(pipeline));
//! let users = client.database("app").collection("users");
//! let cx = CallContext::current();
//! let count = users.count_documents(&cx, mongodb::bson::doc! {}, None).await?;
//! # Ok(())
//! # }
//! ```
use anyhow::Result;
use clap::Parser;

mod cli;
pub mod client;
pub mod conf;
pub mod constants;
pub mod context;
pub mod encode;
pub mod errors;
pub mod hooks;
pub mod operation;
pub mod pipeline;
mod probe;
pub mod trace;

#[cfg(test)]
mod testing;

pub use self::client::Cursor;
pub use self::client::InstrumentedClient;
pub use self::client::InstrumentedCollection;
pub use self::client::InstrumentedDatabase;
pub use self::context::CallContext;
pub use self::encode::Timestamp;
pub use self::errors::Error;
pub use self::operation::Operation;
pub use self::operation::OperationKind;
pub use self::pipeline::Handler;
pub use self::pipeline::Next;
pub use self::pipeline::Pipeline;

use self::cli::Cli;

/// Parse command line options and run the selected mode.
pub fn run() -> Result<()> {
    let args = Cli::parse();
    let mut conf = self::conf::load(&args.config, self::conf::Conf::default())?;
    self::conf::apply_env_overrides(&mut conf);
    tokio::runtime::Runtime::new()?.block_on(self::probe::run(args, conf))
}
