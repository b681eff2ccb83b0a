use crate::config::RelayConfig;
use crate::error::{RelayError, TransportError};
use crate::types::{DeliveryResult, SlackAttachment, SlackWebhookPayload};
use reqwest::{header, Client, Url};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Slack incoming webhook client with a fixed sender identity and channel.
///
/// The underlying HTTP client keeps its connection pool, so one instance should serve every
/// invocation of a warm runtime.
pub struct SlackClient {
    http_client: Client,
    webhook_url: Url,
    username: String,
    channel: String,
    timeout: Duration,
}

impl SlackClient {
    /// Create new Slack client
    pub fn new(config: &RelayConfig) -> Result<Self, RelayError> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .https_only(config.webhook_url.scheme() == "https")
            .build()
            .map_err(|e| {
                RelayError::Configuration(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            http_client,
            webhook_url: config.webhook_url.clone(),
            username: config.username.clone(),
            channel: config.channel.clone(),
            timeout: config.timeout,
        })
    }

    /// Wrap formatted attachments with the sender identity
    pub fn build_payload(&self, attachments: &[SlackAttachment]) -> SlackWebhookPayload {
        SlackWebhookPayload {
            username: self.username.clone(),
            channel: self.channel.clone(),
            attachments: attachments.to_vec(),
        }
    }

    /// Post attachments to the webhook.
    ///
    /// Any HTTP response counts as delivered, including non-2xx statuses; only failures to
    /// obtain a response are returned as errors.
    pub async fn send(
        &self,
        subject: &str,
        attachments: &[SlackAttachment],
    ) -> Result<DeliveryResult, TransportError> {
        let payload = self.build_payload(attachments);
        debug!(channel = %self.channel, "Sending message to Slack webhook");

        let response = self
            .http_client
            .post(self.webhook_url.clone())
            .header(header::CONTENT_TYPE, "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        // The status already proves delivery, so a broken body read only loses the body
        let body = match response.bytes().await {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                warn!(
                    channel = %self.channel,
                    status = status.as_u16(),
                    error = %e.without_url(),
                    "Failed to read Slack webhook response body"
                );
                String::new()
            }
        };

        if status.is_success() {
            info!(
                channel = %self.channel,
                status = status.as_u16(),
                "Successfully sent message to Slack channel {}",
                self.channel
            );
        } else {
            warn!(
                channel = %self.channel,
                status = status.as_u16(),
                response = %body,
                "Slack webhook responded with a non-success status"
            );
        }

        Ok(DeliveryResult {
            message: subject.to_string(),
            status_code: status.as_u16(),
            response: body,
        })
    }

    fn transport_error(&self, err: reqwest::Error) -> TransportError {
        let err = TransportError::from_reqwest(err, self.timeout);
        error!(
            channel = %self.channel,
            retryable = err.is_retryable(),
            "{}",
            err
        );
        err
    }
}
