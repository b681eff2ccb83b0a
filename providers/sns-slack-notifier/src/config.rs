//! Relay configuration, resolved once per cold start
//!
//! Identity and tuning come from the environment; the webhook URL is a secret stored in the
//! parameter store and referenced by name.

use crate::error::RelayError;
use crate::parameter_store::ParameterStore;
use reqwest::Url;
use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;
use tracing::info;

pub const ENV_WEBHOOK_PARAMETER: &str = "PARAMETER_SLACK_WEBHOOK_URL";
pub const ENV_WEBHOOK_PARAMETER_ALIAS: &str = "SLACK_WEBHOOK_PARAMETER";
pub const ENV_WEBHOOK_URL: &str = "SLACK_WEBHOOK_URL";
pub const ENV_USERNAME: &str = "SLACK_USERNAME";
pub const ENV_CHANNEL: &str = "SLACK_CHANNEL";
pub const ENV_TIMEOUT_SECONDS: &str = "SLACK_TIMEOUT_SECONDS";
pub const ENV_FAILURE_POLICY: &str = "DELIVERY_FAILURE_POLICY";

/// Every variable `from_env` reads
const ENV_KEYS: [&str; 7] = [
    ENV_WEBHOOK_PARAMETER,
    ENV_WEBHOOK_PARAMETER_ALIAS,
    ENV_WEBHOOK_URL,
    ENV_USERNAME,
    ENV_CHANNEL,
    ENV_TIMEOUT_SECONDS,
    ENV_FAILURE_POLICY,
];

pub const DEFAULT_TIMEOUT_SECONDS: u64 = 15;

/// What the handler does when the webhook cannot be reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Fail the invocation so the invoker can retry or dead-letter the event
    #[default]
    Propagate,
    /// Log the transport error and return an empty result
    LogAndContinue,
}

impl FailurePolicy {
    pub fn parse(value: &str) -> Result<Self, RelayError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "propagate" | "strict" => Ok(FailurePolicy::Propagate),
            "log_and_continue" | "lenient" => Ok(FailurePolicy::LogAndContinue),
            other => Err(RelayError::Configuration(format!(
                "{} must be 'propagate' or 'log_and_continue', got '{}'",
                ENV_FAILURE_POLICY, other
            ))),
        }
    }
}

/// Immutable relay configuration
#[derive(Clone)]
pub struct RelayConfig {
    pub webhook_url: Url,
    pub username: String,
    pub channel: String,
    pub timeout: Duration,
    pub failure_policy: FailurePolicy,
}

// Webhook URLs embed their auth token, so only the host is printed
impl fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayConfig")
            .field("webhook_host", &self.webhook_url.host_str())
            .field("username", &self.username)
            .field("channel", &self.channel)
            .field("timeout", &self.timeout)
            .field("failure_policy", &self.failure_policy)
            .finish()
    }
}

impl RelayConfig {
    /// Create a configuration with default timeout and failure policy
    pub fn new(webhook_url: Url, username: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            webhook_url,
            username: username.into(),
            channel: channel.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
            failure_policy: FailurePolicy::default(),
        }
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the failure policy
    pub fn with_failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }

    /// Create config from environment variables
    pub async fn from_env(store: &dyn ParameterStore) -> Result<Self, RelayError> {
        let props = env_properties(&ENV_KEYS)?;
        Self::from_properties(&props, store).await
    }

    /// Create config from a property map, fetching the webhook URL from the store
    pub async fn from_properties(
        props: &HashMap<String, String>,
        store: &dyn ParameterStore,
    ) -> Result<Self, RelayError> {
        let raw_url = match non_empty(props, ENV_WEBHOOK_URL) {
            Some(url) => {
                info!("Using webhook URL from {}", ENV_WEBHOOK_URL);
                url.to_string()
            }
            None => {
                let parameter = non_empty(props, ENV_WEBHOOK_PARAMETER)
                    .or_else(|| non_empty(props, ENV_WEBHOOK_PARAMETER_ALIAS))
                    .ok_or_else(|| {
                        RelayError::Configuration(format!(
                            "{} (or {}) is not set",
                            ENV_WEBHOOK_PARAMETER, ENV_WEBHOOK_PARAMETER_ALIAS
                        ))
                    })?;
                info!(parameter = %parameter, "Resolving webhook URL from parameter store");
                store.get_parameter(parameter, true).await?
            }
        };

        let webhook_url = parse_webhook_url(raw_url.trim())?;
        let username = required(props, ENV_USERNAME)?;
        let channel = required(props, ENV_CHANNEL)?;

        let timeout = match non_empty(props, ENV_TIMEOUT_SECONDS) {
            Some(value) => parse_timeout(value)?,
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
        };

        let failure_policy = match non_empty(props, ENV_FAILURE_POLICY) {
            Some(value) => FailurePolicy::parse(value)?,
            None => FailurePolicy::default(),
        };

        let config = Self {
            webhook_url,
            username,
            channel,
            timeout,
            failure_policy,
        };
        info!(config = ?config, "Loaded relay configuration");
        Ok(config)
    }
}

/// Read the listed variables, skipping unset ones. Unrelated variables are never touched.
fn env_properties(keys: &[&str]) -> Result<HashMap<String, String>, RelayError> {
    let mut props = HashMap::new();
    for key in keys {
        match std::env::var(key) {
            Ok(value) => {
                props.insert(key.to_string(), value);
            }
            Err(std::env::VarError::NotPresent) => {}
            Err(std::env::VarError::NotUnicode(_)) => {
                return Err(RelayError::Configuration(format!(
                    "{} is not valid unicode",
                    key
                )))
            }
        }
    }
    Ok(props)
}

fn non_empty<'a>(props: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    props
        .get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

fn required(props: &HashMap<String, String>, key: &str) -> Result<String, RelayError> {
    non_empty(props, key)
        .map(str::to_string)
        .ok_or_else(|| RelayError::Configuration(format!("{} is not set", key)))
}

fn parse_timeout(value: &str) -> Result<Duration, RelayError> {
    match value.parse::<u64>() {
        Ok(seconds) if seconds > 0 => Ok(Duration::from_secs(seconds)),
        _ => Err(RelayError::Configuration(format!(
            "{} must be a positive number of seconds, got '{}'",
            ENV_TIMEOUT_SECONDS, value
        ))),
    }
}

fn parse_webhook_url(raw: &str) -> Result<Url, RelayError> {
    let url = Url::parse(raw)
        .map_err(|e| RelayError::Configuration(format!("Webhook URL is not a valid URL: {}", e)))?;

    let allowed = match url.scheme() {
        "https" => url.host().is_some(),
        // Plain http only reaches a local endpoint, never a remote webhook
        "http" => is_loopback(&url),
        _ => false,
    };

    if allowed {
        Ok(url)
    } else {
        Err(RelayError::Configuration(format!(
            "Webhook URL must be an https URL (http is allowed only for loopback), got scheme '{}'",
            url.scheme()
        )))
    }
}

fn is_loopback(url: &Url) -> bool {
    match url.host_str() {
        Some(host) if host.eq_ignore_ascii_case("localhost") => true,
        Some(host) => host
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse::<IpAddr>()
            .map(|addr| addr.is_loopback())
            .unwrap_or(false),
        None => false,
    }
}
