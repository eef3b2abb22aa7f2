//! SendGrid v3 API email service implementation

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{TimeZone, Utc};
use clap::Parser;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::domain::communication::{
    email_addresses::EmailAddress,
    mailer::{ConfigValidation, ConnectionTest, Mailer, Message, ProviderError, SentEmail},
    suppressions::BounceType,
    webhooks::{DeliveryEvent, DeliveryEventKind},
};

const NAME: &str = "sendgrid";

/// SendGrid configuration
#[derive(Clone, Default, Debug, Parser)]
pub struct SendGridConfig {
    /// API key with mail send permission
    #[clap(long = "sendgrid-api-key", env = "SENDGRID_API_KEY", default_value = "")]
    pub api_key: String,

    /// API base URL
    #[clap(
        long = "sendgrid-api-url",
        env = "SENDGRID_API_URL",
        default_value = "https://api.sendgrid.com/v3"
    )]
    pub api_url: String,

    /// The sender email address
    #[clap(long = "sendgrid-sender", env = "SENDGRID_SENDER", default_value = "")]
    pub sender: String,

    /// The sender display name
    #[clap(long = "sendgrid-sender-name", env = "SENDGRID_SENDER_NAME")]
    pub sender_name: Option<String>,

    /// Ask SendGrid to track opens and clicks
    #[clap(long = "sendgrid-tracking", env = "SENDGRID_TRACKING", default_value = "false")]
    pub tracking: bool,
}

/// SendGrid mailer
#[derive(Debug, Clone)]
pub struct SendGridMailer {
    config: SendGridConfig,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    field: Option<String>,
}

impl SendGridMailer {
    /// Create a new SendGrid mailer
    pub fn new(config: SendGridConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.config.api_url.trim_end_matches('/'))
    }

    fn address(address: &EmailAddress) -> Value {
        json!({ "email": address.as_str() })
    }

    /// The `mail/send` request body for a message
    pub fn payload(&self, message: &Message) -> Value {
        let mut personalization = json!({
            "to": message.to.iter().map(Self::address).collect::<Vec<_>>(),
        });

        if !message.cc.is_empty() {
            personalization["cc"] = message.cc.iter().map(Self::address).collect();
        }

        if !message.bcc.is_empty() {
            personalization["bcc"] = message.bcc.iter().map(Self::address).collect();
        }

        let mut from = json!({
            "email": message
                .from
                .as_ref()
                .map(|from| from.as_str())
                .unwrap_or(&self.config.sender),
        });

        if let Some(name) = message.from_name.as_ref().or(self.config.sender_name.as_ref()) {
            from["name"] = json!(name);
        }

        let mut content = vec![json!({ "type": "text/plain", "value": message.plain_body })];

        if !message.html_body.is_empty() {
            content.push(json!({ "type": "text/html", "value": message.html_body }));
        }

        let mut custom_args = json!({
            "email_type": message.email_type,
            "request_id": message.id.to_string(),
        });

        if let Some(correlation_id) = &message.correlation_id {
            custom_args["correlation_id"] = json!(correlation_id);
        }

        let mut payload = json!({
            "personalizations": [personalization],
            "from": from,
            "subject": message.subject,
            "content": content,
            "custom_args": custom_args,
            "categories": [message.email_type],
            "tracking_settings": {
                "click_tracking": { "enable": self.config.tracking },
                "open_tracking": { "enable": self.config.tracking },
            },
        });

        if let Some(reply_to) = &message.reply_to {
            payload["reply_to"] = Self::address(reply_to);
        }

        if !message.attachments.is_empty() {
            payload["attachments"] = message
                .attachments
                .iter()
                .map(|attachment| {
                    json!({
                        "content": STANDARD.encode(&attachment.content),
                        "filename": attachment.filename,
                        "type": attachment.content_type,
                        "disposition": "attachment",
                    })
                })
                .collect();
        }

        payload
    }

    async fn error_from_response(response: reqwest::Response) -> ProviderError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        error_from_body(status, &body)
    }
}

fn error_from_body(status: StatusCode, body: &str) -> ProviderError {
    let detail = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|body| body.errors.into_iter().next());

    let (code, message) = match detail {
        Some(detail) => (detail.field, detail.message),
        None if body.is_empty() => (None, status.to_string()),
        None => (None, body.to_string()),
    };

    ProviderError::response(NAME, Some(status.as_u16()), code, message)
}

fn request_error(err: reqwest::Error, timeout: Duration) -> ProviderError {
    if err.is_timeout() {
        ProviderError::timeout(NAME, timeout)
    } else {
        ProviderError::connection(NAME, err.to_string())
    }
}

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[async_trait]
impl Mailer for SendGridMailer {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn send_email(&self, message: &Message) -> Result<SentEmail, ProviderError> {
        let response = self
            .client
            .post(self.url("mail/send"))
            .bearer_auth(&self.config.api_key)
            .timeout(REQUEST_TIMEOUT)
            .json(&self.payload(message))
            .send()
            .await
            .map_err(|err| request_error(err, REQUEST_TIMEOUT))?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let message_id = response
            .headers()
            .get("x-message-id")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| {
                warn!(request_id = %message.id, "SendGrid response had no X-Message-Id");

                message.id.to_string()
            });

        debug!(request_id = %message.id, %message_id, "SendGrid accepted message");

        Ok(SentEmail {
            message_id,
            metadata: json!({ "status": response.status().as_u16() }),
        })
    }

    fn validate_config(&self) -> ConfigValidation {
        let mut errors = Vec::new();

        if self.config.api_key.is_empty() {
            errors.push("SENDGRID_API_KEY is not set".to_string());
        }

        if self.config.sender.is_empty() {
            errors.push("SENDGRID_SENDER is not set".to_string());
        } else if EmailAddress::new(&self.config.sender).is_err() {
            errors.push(format!(
                "SENDGRID_SENDER is not a valid address: {}",
                self.config.sender
            ));
        }

        if reqwest::Url::parse(&self.config.api_url).is_err() {
            errors.push(format!("SENDGRID_API_URL is not a URL: {}", self.config.api_url));
        }

        ConfigValidation::from_errors(errors)
    }

    async fn test_connection(&self) -> ConnectionTest {
        let result = async {
            let response = self
                .client
                .get(self.url("scopes"))
                .bearer_auth(&self.config.api_key)
                .timeout(REQUEST_TIMEOUT)
                .send()
                .await
                .map_err(|err| request_error(err, REQUEST_TIMEOUT))?;

            if response.status().is_success() {
                Ok(())
            } else {
                Err(Self::error_from_response(response).await)
            }
        }
        .await;

        result.into()
    }
}

#[derive(Debug, Deserialize)]
struct WebhookEvent {
    email: String,
    event: String,
    #[serde(default)]
    timestamp: Option<i64>,
    #[serde(default)]
    sg_message_id: Option<String>,
    #[serde(default)]
    email_type: Option<String>,
    #[serde(default, rename = "type")]
    bounce_type: Option<String>,
    #[serde(default)]
    bounce_classification: Option<String>,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    useragent: Option<String>,
}

/// `sg_message_id` is the `X-Message-Id` followed by a filter suffix
fn base_message_id(sg_message_id: &str) -> &str {
    sg_message_id.split('.').next().unwrap_or(sg_message_id)
}

fn bounce_type(event: &WebhookEvent) -> BounceType {
    match (event.bounce_type.as_deref(), event.bounce_classification.as_deref()) {
        (_, Some("Invalid Address")) => BounceType::Hard,
        (Some("blocked"), _) => BounceType::Soft,
        (Some("bounce"), _) => BounceType::Hard,
        _ => BounceType::Undetermined,
    }
}

/// Parses a SendGrid event webhook body.
///
/// Entries with an unknown event name or an invalid address are skipped.
pub fn parse_events(body: &Value) -> Result<Vec<DeliveryEvent>, serde_json::Error> {
    let raw: Vec<Value> = serde_json::from_value(body.clone())?;
    let mut events = Vec::with_capacity(raw.len());

    for value in raw {
        let event: WebhookEvent = match serde_json::from_value(value.clone()) {
            Ok(event) => event,
            Err(err) => {
                debug!(error = %err, "Skipping malformed SendGrid event");
                continue;
            }
        };

        let kind = match event.event.as_str() {
            "delivered" => DeliveryEventKind::Delivered,
            "open" => DeliveryEventKind::Opened,
            "click" => DeliveryEventKind::Clicked,
            "bounce" | "dropped" => DeliveryEventKind::Bounced,
            "spamreport" => DeliveryEventKind::Complained,
            "unsubscribe" | "group_unsubscribe" => DeliveryEventKind::Unsubscribed,
            "deferred" => DeliveryEventKind::Deferred,
            _ => continue,
        };

        let Ok(email) = EmailAddress::new(&event.email) else {
            debug!(email = %event.email, "Skipping SendGrid event with invalid address");
            continue;
        };

        let mut delivery = DeliveryEvent::new(
            event
                .sg_message_id
                .as_deref()
                .map(base_message_id)
                .unwrap_or_default(),
            email,
            kind,
        );

        delivery.timestamp = event
            .timestamp
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
            .unwrap_or_else(Utc::now);
        delivery.email_type = event.email_type.clone();
        delivery.reason = event.reason.clone();
        delivery.url = event.url.clone();
        delivery.device = event.useragent.clone();

        if kind == DeliveryEventKind::Bounced {
            delivery.bounce_type = Some(bounce_type(&event));
        }

        delivery.metadata = value;
        events.push(delivery);
    }

    Ok(events)
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use crate::domain::communication::mailer::{Attachment, ProviderErrorKind};

    use super::*;

    fn mailer() -> SendGridMailer {
        SendGridMailer::new(SendGridConfig {
            api_key: "SG.key".to_string(),
            api_url: "https://api.sendgrid.com/v3".to_string(),
            sender: "quotes@acme.test".to_string(),
            sender_name: Some("Acme Movers".to_string()),
            tracking: true,
        })
    }

    #[test]
    fn test_payload_maps_message() {
        let message = Message::builder()
            .to(EmailAddress::new_unchecked("ada@example.com"))
            .bcc(EmailAddress::new_unchecked("audit@acme.test"))
            .reply_to(EmailAddress::new_unchecked("hello@acme.test"))
            .subject("Your quote")
            .html("<p>Hi</p>")
            .plain("Hi")
            .correlation_id("Q-3")
            .email_type("customer_confirmation")
            .attachment(Attachment {
                filename: "quote.pdf".to_string(),
                content_type: "application/pdf".to_string(),
                content: b"pdf".to_vec(),
            })
            .build();

        let payload = mailer().payload(&message);

        assert_eq!(payload["personalizations"][0]["to"][0]["email"], "ada@example.com");
        assert_eq!(payload["personalizations"][0]["bcc"][0]["email"], "audit@acme.test");
        assert!(payload["personalizations"][0].get("cc").is_none());
        assert_eq!(payload["from"]["name"], "Acme Movers");
        assert_eq!(payload["reply_to"]["email"], "hello@acme.test");
        assert_eq!(payload["content"][1]["type"], "text/html");
        assert_eq!(payload["custom_args"]["correlation_id"], "Q-3");
        assert_eq!(payload["custom_args"]["email_type"], "customer_confirmation");
        assert_eq!(payload["tracking_settings"]["open_tracking"]["enable"], true);
        assert_eq!(payload["attachments"][0]["content"], "cGRm");
    }

    #[test]
    fn test_error_body_is_normalized() {
        let err = error_from_body(
            StatusCode::BAD_REQUEST,
            r#"{"errors":[{"message":"Does not contain a valid address.","field":"personalizations.0.to.0.email"}]}"#,
        );

        assert_eq!(err.kind, ProviderErrorKind::Response);
        assert_eq!(err.status, Some(400));
        assert_eq!(err.code.as_deref(), Some("personalizations.0.to.0.email"));
        assert_eq!(err.message, "Does not contain a valid address.");

        let err = error_from_body(StatusCode::SERVICE_UNAVAILABLE, "");
        assert_eq!(err.status, Some(503));
        assert_eq!(err.message, "503 Service Unavailable");
    }

    #[test]
    fn test_validate_config() {
        assert!(mailer().validate_config().is_valid);

        let validation = SendGridMailer::new(SendGridConfig::default()).validate_config();

        assert!(!validation.is_valid);
        assert_eq!(validation.errors.len(), 3);
    }

    #[test]
    fn test_parse_events() -> TestResult {
        let body = json!([
            {"email": "ada@example.com", "event": "delivered", "timestamp": 1700000000,
             "sg_message_id": "abc123.filter0001.1.0", "email_type": "customer_confirmation"},
            {"email": "bob@example.com", "event": "bounce", "type": "bounce",
             "reason": "550 5.1.1 unknown user", "sg_message_id": "def456.filter"},
            {"email": "eve@example.com", "event": "spamreport", "sg_message_id": "ghi"},
            {"email": "ada@example.com", "event": "processed"},
            {"email": "not-an-address", "event": "open"}
        ]);

        let events = parse_events(&body)?;

        assert_eq!(events.len(), 3);
        assert_eq!(events[0].message_id, "abc123");
        assert_eq!(events[0].event, DeliveryEventKind::Delivered);
        assert_eq!(events[0].timestamp.timestamp(), 1700000000);
        assert_eq!(events[0].email_type.as_deref(), Some("customer_confirmation"));
        assert_eq!(events[1].bounce_type, Some(BounceType::Hard));
        assert_eq!(events[2].event, DeliveryEventKind::Complained);

        Ok(())
    }

    #[test]
    fn test_parse_events_rejects_non_array() {
        assert!(parse_events(&json!({"event": "delivered"})).is_err());
    }
}
