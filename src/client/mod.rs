//! Instrumented MongoDB client facade, configuration and initialisation.
//!
//! The facade mirrors the driver's client, database and collection handles.
//! Every call is described as an [`Operation`](crate::operation::Operation) and
//! run through the shared [`Pipeline`] before reaching the driver.
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use anyhow::Result;
use mongodb::options::ClientOptions;
use mongodb::options::ReadPreference;
use mongodb::options::SelectionCriteria;
use mongodb::Client;

use crate::conf::MongoConf;
use crate::errors::ClientError;
use crate::pipeline::Pipeline;

pub mod admin;
mod collection;
mod cursor;
mod driver;

pub use self::collection::InstrumentedCollection;
pub use self::cursor::Cursor;
pub use self::driver::Driver;
pub use self::driver::MongoDriver;
pub use self::driver::RawCursor;

/// Instrumented equivalent of a [`mongodb::Client`].
#[derive(Clone)]
pub struct InstrumentedClient {
    driver: Arc<dyn Driver>,
    pipeline: Arc<Pipeline>,
}

impl InstrumentedClient {
    /// Instrument a MongoDB client with the given pipeline.
    pub fn new(client: Client, pipeline: Arc<Pipeline>) -> InstrumentedClient {
        InstrumentedClient::with_driver(Arc::new(MongoDriver::new(client)), pipeline)
    }

    /// Instrument any [`Driver`] implementation with the given pipeline.
    pub fn with_driver(driver: Arc<dyn Driver>, pipeline: Arc<Pipeline>) -> InstrumentedClient {
        InstrumentedClient { driver, pipeline }
    }

    pub fn database(&self, name: &str) -> InstrumentedDatabase {
        InstrumentedDatabase {
            driver: Arc::clone(&self.driver),
            name: name.to_string(),
            pipeline: Arc::clone(&self.pipeline),
        }
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }
}

/// Instrumented equivalent of a [`mongodb::Database`].
#[derive(Clone)]
pub struct InstrumentedDatabase {
    driver: Arc<dyn Driver>,
    name: String,
    pipeline: Arc<Pipeline>,
}

impl InstrumentedDatabase {
    pub fn collection(&self, name: &str) -> InstrumentedCollection {
        InstrumentedCollection::new(
            Arc::clone(&self.driver),
            Arc::clone(&self.pipeline),
            crate::operation::Namespace::new(self.name.clone(), name),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Create a new MongoDB client and check the server is reachable.
pub async fn connect(conf: &MongoConf) -> Result<Client> {
    let mut options = ClientOptions::parse(&conf.uri)
        .await
        .with_context(|| ClientError::uri_not_valid(&conf.uri))?;
    options.app_name = Some(conf.app_name.clone());
    options.connect_timeout = Some(Duration::from_secs(conf.connect_timeout));
    options.max_pool_size = Some(conf.max_pool_size);
    options.min_pool_size = Some(conf.min_pool_size);
    options.retry_writes = Some(conf.retry_writes);
    if options.selection_criteria.is_none() {
        options.selection_criteria = Some(SelectionCriteria::ReadPreference(
            ReadPreference::PrimaryPreferred {
                options: Default::default(),
            },
        ));
    }

    let client = Client::with_options(options).context(ClientError::CreateFailed)?;
    self::admin::ping(&client)
        .await
        .context(ClientError::PingFailed)?;
    Ok(client)
}
