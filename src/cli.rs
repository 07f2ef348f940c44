use clap::Args;
use clap::Parser;
use clap::Subcommand;

/// Exercise an instrumented MongoDB client against a deployment.
#[derive(Debug, Parser)]
#[command(version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(long, short, default_value = "mongodb-traced.yaml", global = true)]
    pub config: String,

    #[command(subcommand)]
    pub mode: Mode,
}

/// Select what to run against the deployment.
#[derive(Clone, Debug, Subcommand)]
pub enum Mode {
    /// Check the MongoDB server is reachable.
    Ping,

    /// Read documents from a collection through the instrumented client.
    Probe(ProbeArgs),
}

/// Options for the probe mode.
#[derive(Args, Clone, Debug)]
pub struct ProbeArgs {
    /// Collection to read documents from.
    #[arg(long)]
    pub collection: String,

    /// Database to read documents from, instead of the configured one.
    #[arg(long)]
    pub database: Option<String>,

    /// Query filter, as a JSON document.
    #[arg(long, default_value = "{}")]
    pub filter: String,

    /// Maximum number of documents to read.
    #[arg(long, default_value_t = 10)]
    pub limit: i64,

    /// Print the collected Prometheus metrics once done.
    #[arg(long)]
    pub metrics: bool,

    /// Trace string of the remote span to attach operations to.
    #[arg(long)]
    pub parent: Option<String>,
}
