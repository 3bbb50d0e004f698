//! Runs a single invocation from a local payload file, with real HTTP calls.
//! Uses the same env vars as the lambda.

use lambda_runtime::Error;
use sqs_forwarder::logging::init_tracing;
use sqs_forwarder::{Config, DedupSet, Forwarder, ReqwestTransport};
use std::env::args;
use std::sync::Arc;
use tracing::info;

fn print_help() {
    println!("Forwards the records of a local payload file the same way the lambda does.");
    println!();
    println!("Usage: forward-local <payload_file>, e.g. forward-local sqs_event.json");
    println!();
    println!("FORWARD_URL        static destination URL");
    println!("FORWARD_ROUTING    static | body (default static)");
    println!("FORWARD_DEDUP      body | record | off (default body)");
    println!("FORWARD_INTAKE     records | raw (default records)");
    println!("FORWARD_LOG_FORMAT compact | json (default compact)");
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let payload_file = match args().nth(1) {
        Some(v) if v != "--help" && v != "-h" => v,
        _ => {
            print_help();
            return Ok(());
        }
    };

    init_tracing();

    let config = Config::from_env()?;
    config.log_summary();

    // there is no point proceeding if the payload cannot be read
    let payload = match std::fs::read(&payload_file) {
        Ok(v) => v,
        Err(e) => return Err(Error::from(format!("Failed to read payload from {payload_file}: {e}"))),
    };
    info!("Payload from: {}", payload_file);

    let forwarder = Forwarder::new(config, ReqwestTransport::new()?, Arc::new(DedupSet::new()));
    let report = forwarder.handle_bytes(&payload).await;

    for (idx, outcome) in report.outcomes.iter().enumerate() {
        info!("#{idx}: {:?}", outcome);
    }

    println!("{}", serde_json::to_string_pretty(&report.response)?);

    Ok(())
}
