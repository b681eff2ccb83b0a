use std::error::Error as StdError;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the relay
#[derive(Error, Debug)]
pub enum RelayError {
    /// Missing or invalid configuration, or the parameter store could not supply a value
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invocation payload did not carry the expected SNS subject/message
    #[error("Malformed invocation event: {0}")]
    Extraction(String),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl RelayError {
    /// Check if the invoker may retry the same event
    pub fn is_retryable(&self) -> bool {
        match self {
            RelayError::Transport(e) => e.is_retryable(),
            RelayError::Configuration(_) | RelayError::Extraction(_) => false,
        }
    }
}

/// Failures talking to the Slack webhook. A received HTTP response is never a transport error.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Timeout occurred when sending message to Slack after {}s: {detail}", .timeout.as_secs())]
    Timeout { timeout: Duration, detail: String },

    #[error("Could not connect to Slack: {0}")]
    Connect(String),

    #[error("Error occurred when communicating with Slack: {0}")]
    Request(String),
}

impl TransportError {
    /// Classify a reqwest error. The webhook URL is stripped since it embeds the secret token.
    pub fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        let err = err.without_url();
        let detail = error_chain(&err);

        if err.is_timeout() {
            TransportError::Timeout { timeout, detail }
        } else if err.is_connect() {
            TransportError::Connect(detail)
        } else {
            TransportError::Request(detail)
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransportError::Timeout { .. } | TransportError::Connect(_)
        )
    }
}

/// Render an error with all of its sources, e.g. "error sending request: tcp connect error: Connection refused"
fn error_chain(err: &dyn StdError) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !rendered.contains(&cause_text) {
            rendered.push_str(": ");
            rendered.push_str(&cause_text);
        }
        source = cause.source();
    }
    rendered
}
