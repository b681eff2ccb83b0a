//! Relays SNS notifications to a Slack incoming webhook
//!
//! Each invocation takes the first SNS record, classifies its message as a structured alert or
//! plain text, renders a color-coded Block Kit attachment and posts it once to the configured
//! webhook.

pub mod config;
pub mod error;
pub mod formatter;
pub mod handler;
pub mod parameter_store;
pub mod slack_client;
pub mod telemetry;
pub mod types;

pub use config::{FailurePolicy, RelayConfig};
pub use error::{RelayError, TransportError};
pub use handler::RelayHandler;
pub use parameter_store::{ParameterStore, SsmParameterStore};
