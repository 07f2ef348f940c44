//! Functions to handle admin commands against MongoDB.
use std::future::IntoFuture;

use mongodb::bson::doc;
use mongodb::bson::Document;
use mongodb::error::Result as MdbResult;
use mongodb::Client;
use opentelemetry::trace::FutureExt;
use opentelemetry::trace::Status;
use opentelemetry::trace::TraceContextExt;

use crate::constants::CMD_PING;
use crate::constants::DB_ADMIN;

/// Run the ping command against the admin database.
///
/// Admin commands are not data access operations and do not go through
/// the handlers pipeline. They are traced and observed directly instead.
pub async fn ping(client: &Client) -> MdbResult<Document> {
    let trace = crate::trace::command_context(CMD_PING);
    let (err_count, _timer) = crate::hooks::metrics::observe_mongodb_op(CMD_PING);

    let admin = client.database(DB_ADMIN);
    let result = admin
        .run_command(doc! {CMD_PING: 1})
        .into_future()
        .with_context(trace.clone())
        .await;
    if let Err(error) = &result {
        err_count.inc();
        trace.span().set_status(Status::error(error.to_string()));
    }
    trace.span().end();
    result
}
