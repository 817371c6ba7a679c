//! Replace SCP - Lambda
//!
//! EventBridge-triggered handler for Organizations CloudTrail events
//! (`CreateAccountResult`, `InviteAccountToOrganization`,
//! `CreateOrganizationalUnit`). Configuration comes from the function's
//! environment and is read once per cold start.

use anyhow::Context;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;
use tracing::{error, info};

use scp_replacer::logging::{init_logging, LogFormat};
use scp_replacer::{ReplaceConfig, ReplaceOutcome, ScpReplacementAgent};

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = ReplaceConfig::from_env().context("Invalid Lambda configuration")?;
    init_logging(config.log_level, LogFormat::Json)?;

    let agent = ScpReplacementAgent::new(config).await;
    let agent = &agent;

    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| async move {
        handle(agent, event).await
    }))
    .await
}

async fn handle(
    agent: &ScpReplacementAgent,
    event: LambdaEvent<Value>,
) -> Result<ReplaceOutcome, Error> {
    let (payload, context) = event.into_parts();
    info!(request_id = %context.request_id, event = %payload, "Received event");

    agent.handle_event(&payload).await.map_err(|e| {
        error!(request_id = %context.request_id, error = %e, "SCP replacement failed");
        Error::from(e)
    })
}
