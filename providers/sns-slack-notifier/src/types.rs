use crate::error::RelayError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// Field names that make a message body a structured alert, in display order
pub const REQUIRED_ALERT_FIELDS: [&str; 3] = ["AlertType", "AlertCode", "AlertCause"];

/// Lambda invocation payload delivered by an SNS subscription
#[derive(Debug, Clone, Deserialize)]
pub struct SnsInvocation {
    #[serde(rename = "Records", default)]
    pub records: Vec<SnsRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SnsRecord {
    #[serde(rename = "Sns")]
    pub sns: Option<SnsEnvelope>,
}

/// The `Sns` object of a record. `Message` is normally a string but direct test invocations may
/// hand in an object.
#[derive(Debug, Clone, Deserialize)]
pub struct SnsEnvelope {
    /// Outer `None` when the key is absent, inner `None` when SNS sent `null` (no subject set)
    #[serde(rename = "Subject", default, deserialize_with = "present")]
    pub subject: Option<Option<String>>,
    #[serde(rename = "Message")]
    pub message: Option<Value>,
}

/// Mark a field as present even when its value is `null`
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Severity of a formatted message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Success,
    Neutral,
}

impl Severity {
    /// Map an `AlertType` value to a severity
    pub fn from_alert_type(alert_type: &str) -> Self {
        match alert_type {
            "Error" => Severity::Error,
            "Success" => Severity::Success,
            _ => Severity::Neutral,
        }
    }

    /// Get Slack attachment color for severity
    pub fn slack_color(&self) -> &'static str {
        match self {
            Severity::Error => "#D70040",   // Red
            Severity::Success => "#50C878", // Green
            Severity::Neutral => "#1F51FF", // Blue
        }
    }

    /// Get Slack emoji shortcode for severity
    pub fn icon(&self) -> Option<&'static str> {
        match self {
            Severity::Error => Some(":warning:"),
            Severity::Success => Some(":white_check_mark:"),
            Severity::Neutral => None,
        }
    }
}

/// The exact `{AlertType, AlertCode, AlertCause}` record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredAlert {
    #[serde(rename = "AlertType")]
    pub alert_type: String,
    #[serde(rename = "AlertCode")]
    pub alert_code: String,
    #[serde(rename = "AlertCause")]
    pub alert_cause: String,
}

impl StructuredAlert {
    /// Build from a JSON object whose key set is exactly the required fields.
    /// Non-string values are rendered as JSON text.
    pub fn from_fields(fields: &Map<String, Value>) -> Option<Self> {
        if fields.len() != REQUIRED_ALERT_FIELDS.len()
            || !REQUIRED_ALERT_FIELDS.iter().all(|key| fields.contains_key(*key))
        {
            return None;
        }

        let field = |key: &str| fields.get(key).map(value_to_text).unwrap_or_default();

        Some(Self {
            alert_type: field("AlertType"),
            alert_code: field("AlertCode"),
            alert_cause: field("AlertCause"),
        })
    }

    pub fn severity(&self) -> Severity {
        Severity::from_alert_type(&self.alert_type)
    }
}

/// Message body of an SNS notification, classified once when the event is decoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    PlainText(String),
    Alert(StructuredAlert),
}

impl MessageBody {
    /// Classify a raw SNS message string. JSON is decoded when possible, otherwise the text is
    /// kept verbatim.
    pub fn from_raw(raw: &str) -> Self {
        match serde_json::from_str::<Value>(raw) {
            Ok(value) => Self::from_value(value),
            Err(_) => {
                warn_not_an_object();
                MessageBody::PlainText(raw.to_string())
            }
        }
    }

    /// Classify an already decoded JSON value
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(fields) => match StructuredAlert::from_fields(&fields) {
                Some(alert) => MessageBody::Alert(alert),
                None => {
                    warn!(
                        required_fields = ?REQUIRED_ALERT_FIELDS,
                        "Message formatting was not applied because not all required fields were identified"
                    );
                    MessageBody::PlainText(Value::Object(fields).to_string())
                }
            },
            other => {
                warn_not_an_object();
                MessageBody::PlainText(value_to_text(&other))
            }
        }
    }

    /// Text rendered into the message, used for logging
    pub fn as_text(&self) -> String {
        match self {
            MessageBody::PlainText(text) => text.clone(),
            MessageBody::Alert(alert) => serde_json::to_string(alert).unwrap_or_default(),
        }
    }
}

fn warn_not_an_object() {
    warn!("Message formatting was not applied because the message is not a JSON object");
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// A decoded notification: subject plus classified body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub subject: String,
    pub body: MessageBody,
}

impl InboundEvent {
    /// Extract the first record's subject and message. Additional records are ignored.
    pub fn from_invocation(invocation: SnsInvocation) -> Result<Self, RelayError> {
        let record = invocation
            .records
            .into_iter()
            .next()
            .ok_or_else(|| RelayError::Extraction("event contains no Records".to_string()))?;

        let sns = record
            .sns
            .ok_or_else(|| RelayError::Extraction("record is missing the Sns object".to_string()))?;

        // Publishers may omit the subject, in which case SNS sends null
        let subject = sns
            .subject
            .ok_or_else(|| RelayError::Extraction("Sns.Subject is missing".to_string()))?
            .unwrap_or_default();

        let body = match sns.message {
            Some(Value::String(raw)) => MessageBody::from_raw(&raw),
            Some(Value::Null) | None => {
                return Err(RelayError::Extraction(
                    "Sns.Message is missing".to_string(),
                ))
            }
            Some(value) => MessageBody::from_value(value),
        };

        Ok(Self { subject, body })
    }

    /// Decode a raw invocation payload
    pub fn from_payload(payload: Value) -> Result<Self, RelayError> {
        let invocation: SnsInvocation = serde_json::from_value(payload)
            .map_err(|e| RelayError::Extraction(format!("invalid SNS event: {}", e)))?;
        Self::from_invocation(invocation)
    }
}

/// Slack incoming webhook request body
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SlackWebhookPayload {
    pub username: String,
    pub channel: String,
    pub attachments: Vec<SlackAttachment>,
}

/// Colored attachment wrapping the Block Kit blocks
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SlackAttachment {
    pub blocks: Vec<SlackBlock>,
    pub color: String,
}

/// Slack Block Kit block types
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlackBlock {
    Section {
        #[serde(skip_serializing_if = "Option::is_none")]
        text: Option<SlackText>,
        #[serde(skip_serializing_if = "Option::is_none")]
        fields: Option<Vec<SlackText>>,
    },
    Divider,
}

impl SlackBlock {
    pub fn text_section(text: SlackText) -> Self {
        SlackBlock::Section {
            text: Some(text),
            fields: None,
        }
    }

    pub fn fields_section(fields: Vec<SlackText>) -> Self {
        SlackBlock::Section {
            text: None,
            fields: Some(fields),
        }
    }
}

/// Slack text object
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SlackText {
    #[serde(rename = "type")]
    pub text_type: String, // "plain_text" or "mrkdwn"
    pub text: String,
}

impl SlackText {
    pub fn markdown(text: impl Into<String>) -> Self {
        Self {
            text_type: "mrkdwn".to_string(),
            text: text.into(),
        }
    }
}

/// Outcome of a delivered webhook request, returned as the invocation result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeliveryResult {
    pub message: String,
    pub status_code: u16,
    pub response: String,
}
