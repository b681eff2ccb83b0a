use crate::config::{FailurePolicy, RelayConfig};
use crate::error::RelayError;
use crate::formatter::format_message;
use crate::slack_client::SlackClient;
use crate::types::{DeliveryResult, InboundEvent};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Invocation handler: one SNS event in, at most one Slack delivery out
pub struct RelayHandler {
    config: Arc<RelayConfig>,
    slack_client: SlackClient,
}

impl RelayHandler {
    pub fn new(config: Arc<RelayConfig>) -> Result<Self, RelayError> {
        let slack_client = SlackClient::new(&config)?;
        Ok(Self {
            config,
            slack_client,
        })
    }

    /// Handle a raw invocation payload.
    ///
    /// Returns `Ok(None)` only when delivery failed at the transport layer and the failure policy
    /// is [`FailurePolicy::LogAndContinue`].
    pub async fn handle(&self, payload: Value) -> Result<Option<DeliveryResult>, RelayError> {
        let result = self.process(payload).await;

        if let Err(e) = &result {
            error!(error = %e, retryable = e.is_retryable(), "Failed to relay notification");
        }

        result
    }

    async fn process(&self, payload: Value) -> Result<Option<DeliveryResult>, RelayError> {
        match payload.get("Records") {
            Some(records) => info!("Event: {}", records),
            None => warn!("Event has no Records"),
        }

        let event = InboundEvent::from_payload(payload)?;
        info!("Event subject: {}", event.subject);
        info!("Event message: {}", event.body.as_text());

        let attachments = format_message(&event.subject, &event.body);

        match self.slack_client.send(&event.subject, &attachments).await {
            Ok(delivery) => Ok(Some(delivery)),
            Err(e) => match self.config.failure_policy {
                FailurePolicy::Propagate => Err(e.into()),
                FailurePolicy::LogAndContinue => {
                    warn!(
                        error = %e,
                        "Delivery failed; continuing without a result"
                    );
                    Ok(None)
                }
            },
        }
    }
}
