//! Configuration logic and models.
use std::fs::File;
use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_FIELD_LEN_MAX;

/// Environment variable overriding the configured MongoDB connection string.
pub const ENV_MONGODB_URI: &str = "MONGODB_TRACED_URI";

/// Errors while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfError {
    /// Unable to load configuration from file.
    ///
    /// Error parameters:
    ///
    /// - Path to the configuration file.
    #[error("unable to load configuration from file: '{0}'")]
    Load(String),

    /// Unable to open the configuration file.
    ///
    /// Error parameters:
    ///
    /// - Path to the configuration file.
    #[error("unable to open the configuration file: '{0}'")]
    Open(String),
}

/// Instrumented MongoDB client configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Conf {
    /// Instrumentation hooks configuration.
    #[serde(default)]
    pub instrumentation: InstrumentationConf,

    /// MongoDB client configuration.
    #[serde(default)]
    pub mongodb: MongoConf,

    /// Tracing provider configuration.
    #[serde(default)]
    pub tracing: TracingConf,
}

/// MongoDB client configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MongoConf {
    /// Name passed to the MongoDB server from the client.
    #[serde(default = "MongoConf::default_app_name")]
    pub app_name: String,

    /// Timeout (in seconds) for connections to establish.
    #[serde(default = "MongoConf::default_connect_timeout")]
    pub connect_timeout: u64,

    /// Database used by commands that don't specify one.
    #[serde(default = "MongoConf::default_database")]
    pub database: String,

    /// Maximum number of connections in the pool.
    #[serde(default = "MongoConf::default_max_pool_size")]
    pub max_pool_size: u32,

    /// Minimum number of connections in the pool.
    #[serde(default = "MongoConf::default_min_pool_size")]
    pub min_pool_size: u32,

    /// Retry write operations that fail due to transient errors.
    #[serde(default = "MongoConf::default_retry_writes")]
    pub retry_writes: bool,

    /// MongoDB connection string.
    #[serde(default = "MongoConf::default_uri")]
    pub uri: String,
}

impl Default for MongoConf {
    fn default() -> Self {
        MongoConf {
            app_name: MongoConf::default_app_name(),
            connect_timeout: MongoConf::default_connect_timeout(),
            database: MongoConf::default_database(),
            max_pool_size: MongoConf::default_max_pool_size(),
            min_pool_size: MongoConf::default_min_pool_size(),
            retry_writes: MongoConf::default_retry_writes(),
            uri: MongoConf::default_uri(),
        }
    }
}

impl MongoConf {
    fn default_app_name() -> String {
        env!("CARGO_PKG_NAME").to_string()
    }

    fn default_connect_timeout() -> u64 {
        10
    }

    fn default_database() -> String {
        "test".to_string()
    }

    fn default_max_pool_size() -> u32 {
        32
    }

    fn default_min_pool_size() -> u32 {
        1
    }

    fn default_retry_writes() -> bool {
        true
    }

    fn default_uri() -> String {
        "mongodb://localhost:27017".to_string()
    }
}

/// Instrumentation hooks configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentationConf {
    /// Maximum length (in bytes) of diagnostic fields attached to spans.
    #[serde(default = "InstrumentationConf::default_max_field_len")]
    pub max_field_len: usize,

    /// Keep spans for cursor returning operations open until the cursor is consumed.
    #[serde(default = "InstrumentationConf::default_track_cursors")]
    pub track_cursors: bool,
}

impl Default for InstrumentationConf {
    fn default() -> Self {
        InstrumentationConf {
            max_field_len: InstrumentationConf::default_max_field_len(),
            track_cursors: InstrumentationConf::default_track_cursors(),
        }
    }
}

impl InstrumentationConf {
    fn default_max_field_len() -> usize {
        DEFAULT_FIELD_LEN_MAX
    }

    fn default_track_cursors() -> bool {
        true
    }
}

/// Tracing provider configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TracingConf {
    /// Where spans are sent to.
    #[serde(default)]
    pub backend: TracingBackend,

    /// OTLP collector endpoint spans are exported to with the `agent` backend.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Sampling strategy for traces started by this process.
    #[serde(default)]
    pub sampler: SamplerConf,

    /// Service name reported along with spans.
    #[serde(default = "TracingConf::default_service_name")]
    pub service_name: String,
}

impl Default for TracingConf {
    fn default() -> Self {
        TracingConf {
            backend: TracingBackend::default(),
            endpoint: None,
            sampler: SamplerConf::default(),
            service_name: TracingConf::default_service_name(),
        }
    }
}

impl TracingConf {
    fn default_service_name() -> String {
        env!("CARGO_PKG_NAME").to_string()
    }
}

/// Where spans are sent to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TracingBackend {
    /// Export spans to an OTLP collector agent managed by this process.
    #[default]
    Agent,

    /// Use the tracer provider already installed by the application.
    Bridge,
}

/// Sampling strategy for traces started by this process.
///
/// Traces started by a remote parent follow the parent sampling decision.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SamplerConf {
    /// Sample all traces.
    #[default]
    Always,

    /// Sample no traces.
    Never,

    /// Sample a fraction of traces.
    Probabilistic {
        /// Fraction of traces to sample, between 0 and 1.
        probability: f64,
    },
}

/// Load configuration from file, if the file exists.
pub fn load<C>(path: &str, default: C) -> Result<C>
where
    C: serde::de::DeserializeOwned,
{
    // Check if the configuration file exists and return the default if it does not.
    if !PathBuf::from(path).exists() {
        return Ok(default);
    }

    let file = File::open(path).with_context(|| ConfError::Open(path.into()))?;
    let conf = serde_yaml::from_reader(file).with_context(|| ConfError::Load(path.into()))?;
    Ok(conf)
}

/// Apply overrides from environment variables to the configuration.
pub fn apply_env_overrides(conf: &mut Conf) {
    if let Ok(uri) = std::env::var(ENV_MONGODB_URI) {
        if !uri.is_empty() {
            conf.mongodb.uri = uri;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::load;
    use super::Conf;
    use super::SamplerConf;
    use super::TracingBackend;

    #[test]
    fn missing_file_returns_default() {
        let conf = load("/this/path/does/not/exist.yaml", Conf::default()).unwrap();
        assert_eq!(conf, Conf::default());
        assert_eq!(conf.mongodb.min_pool_size, 1);
        assert_eq!(conf.mongodb.max_pool_size, 32);
        assert_eq!(conf.mongodb.connect_timeout, 10);
        assert_eq!(conf.instrumentation.max_field_len, 3000);
        assert!(conf.instrumentation.track_cursors);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let name = format!("mongodb-traced-conf-{}.yaml", std::process::id());
        let path = std::env::temp_dir().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            concat!(
                "mongodb:\n",
                "  uri: mongodb://db:27017\n",
                "tracing:\n",
                "  backend: bridge\n",
                "  sampler:\n",
                "    type: probabilistic\n",
                "    probability: 0.25",
            )
        )
        .unwrap();
        drop(file);

        let conf = load(path.to_str().unwrap(), Conf::default()).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(conf.mongodb.uri, "mongodb://db:27017");
        assert_eq!(conf.mongodb.max_pool_size, 32);
        assert_eq!(conf.tracing.backend, TracingBackend::Bridge);
        assert_eq!(
            conf.tracing.sampler,
            SamplerConf::Probabilistic { probability: 0.25 }
        );
        assert_eq!(conf.instrumentation.max_field_len, 3000);
    }

    #[test]
    fn invalid_file_fails() {
        let name = format!("mongodb-traced-bad-{}.yaml", std::process::id());
        let path = std::env::temp_dir().join(name);
        std::fs::write(&path, "mongodb: [not, a, map]").unwrap();
        let result = load(path.to_str().unwrap(), Conf::default());
        std::fs::remove_file(&path).unwrap();
        assert!(result.is_err());
    }
}
