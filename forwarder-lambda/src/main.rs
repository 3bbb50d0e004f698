use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;
use sqs_forwarder::config::print_env_vars;
use sqs_forwarder::logging::init_tracing;
use sqs_forwarder::{Config, DedupSet, Forwarder, InvocationResponse, ReqwestTransport};
use std::sync::Arc;
use tracing::debug;

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_tracing();
    print_env_vars();

    // config and the dedup set are created once per cold start and shared by all invocations
    let config = Config::from_env()?;
    config.log_summary();

    let forwarder = Arc::new(Forwarder::new(
        config,
        ReqwestTransport::new()?,
        Arc::new(DedupSet::new()),
    ));

    let handler = service_fn(move |event: LambdaEvent<Value>| {
        let forwarder = Arc::clone(&forwarder);
        async move { my_handler(&forwarder, event).await }
    });

    if let Err(e) = lambda_runtime::run(handler).await {
        debug!("Runtime error: {:?}", e);
        return Err(e);
    }

    Ok(())
}

/// Never returns an error: bad payloads and bad config are reported in the response,
/// so the platform does not retry the batch.
async fn my_handler(
    forwarder: &Forwarder<ReqwestTransport>,
    event: LambdaEvent<Value>,
) -> Result<InvocationResponse, Error> {
    let (event, ctx) = event.into_parts();
    debug!("Context: {:?}", ctx);

    let report = forwarder.handle_event(event).await;

    debug!("Outcomes: {:?}", report.outcomes);

    Ok(report.response)
}
