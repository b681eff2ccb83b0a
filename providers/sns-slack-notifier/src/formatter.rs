use crate::types::{MessageBody, Severity, SlackAttachment, SlackBlock, SlackText, StructuredAlert};

/// Substrings that mark a plain-text message as a failure (matched case-insensitively)
pub const ERROR_KEYWORDS: [&str; 4] = ["fail", "error", "exception", "not authorized"];

/// Placeholder shown in the resource field of structured alerts
const RESOURCE_PLACEHOLDER: &str = "ResourceName";

/// Format a notification as a single colored Slack attachment with Block Kit blocks
pub fn format_message(subject: &str, body: &MessageBody) -> Vec<SlackAttachment> {
    let attachment = match body {
        MessageBody::Alert(alert) => format_alert(subject, alert),
        MessageBody::PlainText(text) => format_plain(subject, text),
    };

    vec![attachment]
}

/// Rich layout: header, divider, type/code + resource fields, cause
fn format_alert(subject: &str, alert: &StructuredAlert) -> SlackAttachment {
    let severity = alert.severity();

    SlackAttachment {
        blocks: vec![
            header_block(subject, severity),
            SlackBlock::Divider,
            SlackBlock::fields_section(vec![
                SlackText::markdown(format!("*{}*:\n{}", alert.alert_type, alert.alert_code)),
                SlackText::markdown(format!("*Resource:*\n{}", RESOURCE_PLACEHOLDER)),
            ]),
            SlackBlock::text_section(SlackText::markdown(alert.alert_cause.clone())),
        ],
        color: severity.slack_color().to_string(),
    }
}

/// Plain layout: header, divider, body verbatim
fn format_plain(subject: &str, text: &str) -> SlackAttachment {
    let severity = classify_text(text);

    SlackAttachment {
        blocks: vec![
            header_block(subject, severity),
            SlackBlock::Divider,
            SlackBlock::text_section(SlackText::markdown(text)),
        ],
        color: severity.slack_color().to_string(),
    }
}

/// Plain text is either a failure or a success, never neutral
pub fn classify_text(text: &str) -> Severity {
    let lowered = text.to_lowercase();
    if ERROR_KEYWORDS.iter().any(|keyword| lowered.contains(keyword)) {
        Severity::Error
    } else {
        Severity::Success
    }
}

fn header_block(subject: &str, severity: Severity) -> SlackBlock {
    let header = match (severity.icon(), subject.is_empty()) {
        (Some(icon), false) => format!("*{} {}*", icon, subject),
        (Some(icon), true) => icon.to_string(),
        (None, _) => format!("*{}*", subject),
    };

    SlackBlock::text_section(SlackText::markdown(header))
}
