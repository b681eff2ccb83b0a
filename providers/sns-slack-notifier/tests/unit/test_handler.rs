use reqwest::Url;
use serde_json::{json, Value};
use sns_slack_notifier::types::SlackWebhookPayload;
use sns_slack_notifier::{FailurePolicy, RelayConfig, RelayError, RelayHandler};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sns_event(subject: &str, message: &str) -> Value {
    json!({
        "Records": [{
            "EventSource": "aws:sns",
            "EventVersion": "1.0",
            "EventSubscriptionArn": "arn:aws:sns:us-east-1:123456789012:alerts:2bcfbf39",
            "Sns": {
                "Type": "Notification",
                "MessageId": "95df01b4-ee98-5cb9-9903-4c221d41eb5e",
                "TopicArn": "arn:aws:sns:us-east-1:123456789012:alerts",
                "Subject": subject,
                "Message": message,
                "Timestamp": "2026-10-18T12:00:00.000Z"
            }
        }]
    })
}

fn handler_for(server_uri: &str, policy: FailurePolicy) -> RelayHandler {
    let url = Url::parse(&format!("{}/services/T000/B000/XXXX", server_uri)).unwrap();
    let config = RelayConfig::new(url, "AWS Alerts", "#ops")
        .with_timeout(Duration::from_secs(1))
        .with_failure_policy(policy);
    RelayHandler::new(Arc::new(config)).unwrap()
}

async fn ok_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;
    server
}

async fn delivered_payload(server: &MockServer) -> SlackWebhookPayload {
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1, "exactly one delivery attempt");
    requests[0].body_json().unwrap()
}

#[tokio::test]
async fn test_structured_success_alert() {
    let server = ok_server().await;
    let handler = handler_for(&server.uri(), FailurePolicy::Propagate);

    let result = handler
        .handle(sns_event(
            "DB Backup",
            r#"{"AlertType":"Success","AlertCode":"OK200","AlertCause":"Backup completed"}"#,
        ))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(result.message, "DB Backup");
    assert_eq!(result.status_code, 200);
    assert_eq!(result.response, "ok");

    let payload = delivered_payload(&server).await;
    let attachments = serde_json::to_value(&payload.attachments).unwrap();
    assert_eq!(attachments.as_array().unwrap().len(), 1);
    assert_eq!(attachments[0]["color"], "#50C878");

    let blocks = attachments[0]["blocks"].as_array().unwrap();
    assert_eq!(blocks.len(), 4);
    assert_eq!(blocks[0]["text"]["text"], "*:white_check_mark: DB Backup*");
    assert_eq!(blocks[1]["type"], "divider");
    assert_eq!(blocks[2]["fields"][0]["text"], "*Success*:\nOK200");
    assert_eq!(blocks[3]["text"]["text"], "Backup completed");
}

#[tokio::test]
async fn test_plain_failure_message() {
    let server = ok_server().await;
    let handler = handler_for(&server.uri(), FailurePolicy::Propagate);

    handler
        .handle(sns_event("Deploy", "Step 3 failed unexpectedly"))
        .await
        .unwrap();

    let payload = serde_json::to_value(delivered_payload(&server).await).unwrap();
    assert_eq!(payload["username"], "AWS Alerts");
    assert_eq!(payload["channel"], "#ops");
    assert_eq!(payload["attachments"][0]["color"], "#D70040");

    let blocks = payload["attachments"][0]["blocks"].as_array().unwrap();
    assert_eq!(blocks.len(), 3);
    assert_eq!(blocks[0]["text"]["text"], "*:warning: Deploy*");
    assert_eq!(blocks[2]["text"]["text"], "Step 3 failed unexpectedly");
}

#[tokio::test]
async fn test_incomplete_alert_rendered_as_plain_text() {
    let server = ok_server().await;
    let handler = handler_for(&server.uri(), FailurePolicy::Propagate);

    handler
        .handle(sns_event(
            "Nightly job",
            r#"{"AlertType":"Success","AlertCode":"OK200"}"#,
        ))
        .await
        .unwrap();

    let payload = serde_json::to_value(delivered_payload(&server).await).unwrap();
    let blocks = payload["attachments"][0]["blocks"].as_array().unwrap();
    assert_eq!(blocks.len(), 3);

    let rendered: Value = serde_json::from_str(blocks[2]["text"]["text"].as_str().unwrap()).unwrap();
    assert_eq!(rendered, json!({"AlertType": "Success", "AlertCode": "OK200"}));
    assert_eq!(payload["attachments"][0]["color"], "#50C878");
}

#[tokio::test]
async fn test_timeout_propagates_under_strict_policy() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;
    let handler = handler_for(&server.uri(), FailurePolicy::Propagate);

    let err = handler
        .handle(sns_event("Deploy", "done"))
        .await
        .unwrap_err();

    assert!(matches!(err, RelayError::Transport(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_timeout_swallowed_under_lenient_policy() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;
    let handler = handler_for(&server.uri(), FailurePolicy::LogAndContinue);

    let result = handler.handle(sns_event("Deploy", "done")).await.unwrap();

    assert!(result.is_none());
}

#[tokio::test]
async fn test_connection_failure_swallowed_under_lenient_policy() {
    let handler = handler_for("http://127.0.0.1:1", FailurePolicy::LogAndContinue);

    let result = handler.handle(sns_event("Deploy", "done")).await.unwrap();

    assert!(result.is_none());
}

#[tokio::test]
async fn test_malformed_event_is_not_delivered() {
    let server = ok_server().await;
    let handler = handler_for(&server.uri(), FailurePolicy::LogAndContinue);

    let err = handler
        .handle(json!({"Records": [{"Sns": {"Message": "no subject"}}]}))
        .await
        .unwrap_err();

    assert!(matches!(err, RelayError::Extraction(_)));
    assert!(!err.is_retryable());
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_null_subject_is_delivered_with_empty_message() {
    let server = ok_server().await;
    let handler = handler_for(&server.uri(), FailurePolicy::Propagate);

    let mut event = sns_event("unused", "Step 3 failed unexpectedly");
    event["Records"][0]["Sns"]["Subject"] = Value::Null;

    let result = handler.handle(event).await.unwrap().unwrap();

    assert_eq!(result.message, "");
    assert_eq!(result.status_code, 200);

    let payload = serde_json::to_value(delivered_payload(&server).await).unwrap();
    let blocks = payload["attachments"][0]["blocks"].as_array().unwrap();
    assert_eq!(blocks[0]["text"]["text"], ":warning:");
    assert_eq!(blocks[2]["text"]["text"], "Step 3 failed unexpectedly");
}

#[tokio::test]
async fn test_invocation_output_shape() {
    let server = ok_server().await;
    let handler = handler_for(&server.uri(), FailurePolicy::Propagate);

    let result = handler.handle(sns_event("Deploy", "done")).await.unwrap();

    assert_eq!(
        serde_json::to_value(result).unwrap(),
        json!({"message": "Deploy", "status_code": 200, "response": "ok"})
    );
}
