//! # SNS Slack Notifier Lambda
//!
//! Entry point for the Lambda function subscribed to the alerts SNS topic.
//! Configuration is resolved once per cold start and reused by warm invocations.

use anyhow::{Context, Result};
use lambda_runtime::{service_fn, LambdaEvent};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info};

use sns_slack_notifier::telemetry::{self, LogBuffer, TelemetryConfig};
use sns_slack_notifier::{RelayConfig, RelayHandler, SsmParameterStore};

#[tokio::main]
async fn main() -> Result<()> {
    let telemetry_config = TelemetryConfig::from_env();
    let log_buffer = telemetry::init_tracing(&telemetry_config)?;

    info!("Starting SNS Slack notifier");

    let handler = match build_handler().await {
        Ok(handler) => Arc::new(handler),
        Err(e) => {
            error!("Failed to initialize: {:#}", e);
            flush(&log_buffer);
            return Err(e);
        }
    };
    flush(&log_buffer);

    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| {
        let handler = Arc::clone(&handler);
        let log_buffer = log_buffer.clone();
        async move {
            info!(request_id = %event.context.request_id, "Handling invocation");
            let result = handler.handle(event.payload).await;
            flush(&log_buffer);
            result.map_err(lambda_runtime::Error::from)
        }
    }))
    .await
    .map_err(|e| anyhow::anyhow!("Lambda runtime error: {}", e))
}

async fn build_handler() -> Result<RelayHandler> {
    let store = SsmParameterStore::from_env().await;
    let config = RelayConfig::from_env(&store)
        .await
        .context("Failed to load relay configuration")?;

    RelayHandler::new(Arc::new(config)).context("Failed to create relay handler")
}

fn flush(log_buffer: &Option<LogBuffer>) {
    if let Some(buffer) = log_buffer {
        if let Err(e) = buffer.flush_to_stdout() {
            eprintln!("Failed to flush buffered logs: {}", e);
        }
    }
}
