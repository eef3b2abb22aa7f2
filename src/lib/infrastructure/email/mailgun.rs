//! Mailgun messages API email service implementation

use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use clap::Parser;
use reqwest::{
    multipart::{Form, Part},
    Client, StatusCode,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::domain::communication::{
    email_addresses::EmailAddress,
    mailer::{ConfigValidation, ConnectionTest, Mailer, Message, ProviderError, SentEmail},
    suppressions::BounceType,
    webhooks::{DeliveryEvent, DeliveryEventKind},
};

const NAME: &str = "mailgun";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Mailgun configuration
#[derive(Clone, Default, Debug, Parser)]
pub struct MailgunConfig {
    /// Private API key
    #[clap(long = "mailgun-api-key", env = "MAILGUN_API_KEY", default_value = "")]
    pub api_key: String,

    /// Sending domain
    #[clap(long = "mailgun-domain", env = "MAILGUN_DOMAIN", default_value = "")]
    pub domain: String,

    /// API base URL (use the EU endpoint for EU domains)
    #[clap(
        long = "mailgun-api-url",
        env = "MAILGUN_API_URL",
        default_value = "https://api.mailgun.net/v3"
    )]
    pub api_url: String,

    /// The sender email address
    #[clap(long = "mailgun-sender", env = "MAILGUN_SENDER", default_value = "")]
    pub sender: String,

    /// The sender display name
    #[clap(long = "mailgun-sender-name", env = "MAILGUN_SENDER_NAME")]
    pub sender_name: Option<String>,

    /// Ask Mailgun to track opens and clicks
    #[clap(long = "mailgun-tracking", env = "MAILGUN_TRACKING", default_value = "false")]
    pub tracking: bool,
}

/// Mailgun mailer
#[derive(Debug, Clone)]
pub struct MailgunMailer {
    config: MailgunConfig,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

fn join(addresses: &[EmailAddress]) -> String {
    addresses
        .iter()
        .map(EmailAddress::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

/// Mailgun wraps ids in angle brackets in responses but not in webhooks
fn bare_message_id(id: &str) -> String {
    id.trim().trim_start_matches('<').trim_end_matches('>').to_string()
}

impl MailgunMailer {
    /// Create a new Mailgun mailer
    pub fn new(config: MailgunConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.config.api_url.trim_end_matches('/'))
    }

    /// The text fields of the `messages` form for a message
    pub fn form_fields(&self, message: &Message) -> Vec<(String, String)> {
        let sender = message
            .from
            .as_ref()
            .map(|from| from.as_str())
            .unwrap_or(&self.config.sender);

        let from = match message.from_name.as_ref().or(self.config.sender_name.as_ref()) {
            Some(name) => format!("{name} <{sender}>"),
            None => sender.to_string(),
        };

        let tracking = if self.config.tracking { "yes" } else { "no" };

        let mut fields = vec![
            ("from".to_string(), from),
            ("to".to_string(), join(&message.to)),
            ("subject".to_string(), message.subject.clone()),
            ("text".to_string(), message.plain_body.clone()),
            ("o:tag".to_string(), message.email_type.clone()),
            ("o:tracking".to_string(), tracking.to_string()),
            ("v:email_type".to_string(), message.email_type.clone()),
            ("v:request_id".to_string(), message.id.to_string()),
        ];

        if !message.html_body.is_empty() {
            fields.push(("html".to_string(), message.html_body.clone()));
        }

        if !message.cc.is_empty() {
            fields.push(("cc".to_string(), join(&message.cc)));
        }

        if !message.bcc.is_empty() {
            fields.push(("bcc".to_string(), join(&message.bcc)));
        }

        if let Some(reply_to) = &message.reply_to {
            fields.push(("h:Reply-To".to_string(), reply_to.to_string()));
        }

        if let Some(correlation_id) = &message.correlation_id {
            fields.push(("v:correlation_id".to_string(), correlation_id.clone()));
        }

        fields
    }

    fn form(&self, message: &Message) -> Result<Form, ProviderError> {
        let mut form = Form::new();

        for (name, value) in self.form_fields(message) {
            form = form.text(name, value);
        }

        for attachment in &message.attachments {
            let part = Part::bytes(attachment.content.clone())
                .file_name(attachment.filename.clone())
                .mime_str(&attachment.content_type)
                .map_err(|err| ProviderError::payload(NAME, err.to_string()))?;

            form = form.part("attachment", part);
        }

        Ok(form)
    }

    async fn error_from_response(response: reqwest::Response) -> ProviderError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        error_from_body(status, &body)
    }
}

fn error_from_body(status: StatusCode, body: &str) -> ProviderError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .map(|body| body.message)
        .unwrap_or_else(|_| {
            if body.is_empty() {
                status.to_string()
            } else {
                body.to_string()
            }
        });

    ProviderError::response(NAME, Some(status.as_u16()), None, message)
}

fn request_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::timeout(NAME, REQUEST_TIMEOUT)
    } else {
        ProviderError::connection(NAME, err.to_string())
    }
}

#[async_trait]
impl Mailer for MailgunMailer {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn send_email(&self, message: &Message) -> Result<SentEmail, ProviderError> {
        let response = self
            .client
            .post(self.url(&format!("{}/messages", self.config.domain)))
            .basic_auth("api", Some(&self.config.api_key))
            .timeout(REQUEST_TIMEOUT)
            .multipart(self.form(message)?)
            .send()
            .await
            .map_err(request_error)?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let body: SendResponse = response
            .json()
            .await
            .map_err(|err| ProviderError::connection(NAME, err.to_string()))?;

        let message_id = bare_message_id(&body.id);

        debug!(request_id = %message.id, %message_id, "Mailgun accepted message");

        Ok(SentEmail {
            message_id,
            metadata: json!({ "id": body.id }),
        })
    }

    fn validate_config(&self) -> ConfigValidation {
        let mut errors = Vec::new();

        if self.config.api_key.is_empty() {
            errors.push("MAILGUN_API_KEY is not set".to_string());
        }

        if self.config.domain.is_empty() {
            errors.push("MAILGUN_DOMAIN is not set".to_string());
        }

        if self.config.sender.is_empty() {
            errors.push("MAILGUN_SENDER is not set".to_string());
        } else if EmailAddress::new(&self.config.sender).is_err() {
            errors.push(format!(
                "MAILGUN_SENDER is not a valid address: {}",
                self.config.sender
            ));
        }

        if reqwest::Url::parse(&self.config.api_url).is_err() {
            errors.push(format!("MAILGUN_API_URL is not a URL: {}", self.config.api_url));
        }

        ConfigValidation::from_errors(errors)
    }

    async fn test_connection(&self) -> ConnectionTest {
        let result = async {
            let response = self
                .client
                .get(self.url(&format!("domains/{}", self.config.domain)))
                .basic_auth("api", Some(&self.config.api_key))
                .timeout(REQUEST_TIMEOUT)
                .send()
                .await
                .map_err(request_error)?;

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

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EventData {
    event: String,
    recipient: String,
    timestamp: Option<f64>,
    severity: Option<String>,
    url: Option<String>,
    message: EventMessage,
    #[serde(rename = "user-variables")]
    user_variables: UserVariables,
    #[serde(rename = "delivery-status")]
    delivery_status: DeliveryStatus,
    #[serde(rename = "client-info")]
    client_info: ClientInfo,
    geolocation: Geolocation,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EventMessage {
    headers: EventHeaders,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EventHeaders {
    #[serde(rename = "message-id")]
    message_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UserVariables {
    email_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DeliveryStatus {
    message: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ClientInfo {
    #[serde(rename = "user-agent")]
    user_agent: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Geolocation {
    country: Option<String>,
    city: Option<String>,
}

/// Parses a Mailgun webhook body (`{"signature": ..., "event-data": ...}`).
///
/// Returns no events for an unknown event name or an invalid recipient.
pub fn parse_events(body: &Value) -> Result<Vec<DeliveryEvent>, serde_json::Error> {
    let raw = body.get("event-data").cloned().unwrap_or(Value::Null);
    let data: EventData = serde_json::from_value(raw.clone())?;

    let permanent = data.severity.as_deref() == Some("permanent");

    let kind = match data.event.as_str() {
        "delivered" => DeliveryEventKind::Delivered,
        "opened" => DeliveryEventKind::Opened,
        "clicked" => DeliveryEventKind::Clicked,
        "failed" if permanent => DeliveryEventKind::Bounced,
        "failed" => DeliveryEventKind::Deferred,
        "complained" => DeliveryEventKind::Complained,
        "unsubscribed" => DeliveryEventKind::Unsubscribed,
        other => {
            debug!(event = other, "Ignoring Mailgun event");
            return Ok(Vec::new());
        }
    };

    let Ok(email) = EmailAddress::new(&data.recipient) else {
        debug!(recipient = %data.recipient, "Skipping Mailgun event with invalid recipient");
        return Ok(Vec::new());
    };

    let mut event = DeliveryEvent::new(bare_message_id(&data.message.headers.message_id), email, kind);

    event.timestamp = data
        .timestamp
        .and_then(|ts| Utc.timestamp_millis_opt((ts * 1000.0) as i64).single())
        .unwrap_or_else(Utc::now);
    event.email_type = data.user_variables.email_type;
    event.url = data.url;
    event.device = data.client_info.user_agent;
    event.location = match (data.geolocation.city, data.geolocation.country) {
        (Some(city), Some(country)) => Some(format!("{city}, {country}")),
        (city, country) => city.or(country),
    };
    event.reason = data
        .delivery_status
        .message
        .filter(|message| !message.is_empty())
        .or(data.delivery_status.description);

    if kind == DeliveryEventKind::Bounced {
        event.bounce_type = Some(BounceType::Hard);
    }

    event.metadata = raw;

    Ok(vec![event])
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    fn mailer() -> MailgunMailer {
        MailgunMailer::new(MailgunConfig {
            api_key: "key".to_string(),
            domain: "mg.acme.test".to_string(),
            api_url: "https://api.mailgun.net/v3".to_string(),
            sender: "quotes@acme.test".to_string(),
            sender_name: None,
            tracking: false,
        })
    }

    fn field<'a>(fields: &'a [(String, String)], name: &str) -> Option<&'a str> {
        fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    #[test]
    fn test_form_fields() {
        let message = Message::builder()
            .to(EmailAddress::new_unchecked("ada@example.com"))
            .to(EmailAddress::new_unchecked("bob@example.com"))
            .subject("New quote")
            .plain("Body")
            .correlation_id("Q-5")
            .email_type("business_notification")
            .build();

        let fields = mailer().form_fields(&message);

        assert_eq!(field(&fields, "from"), Some("quotes@acme.test"));
        assert_eq!(field(&fields, "to"), Some("ada@example.com,bob@example.com"));
        assert_eq!(field(&fields, "v:correlation_id"), Some("Q-5"));
        assert_eq!(field(&fields, "v:email_type"), Some("business_notification"));
        assert_eq!(field(&fields, "o:tracking"), Some("no"));
        assert_eq!(field(&fields, "html"), None);
        assert_eq!(field(&fields, "cc"), None);
    }

    #[test]
    fn test_error_body() {
        let err = error_from_body(StatusCode::UNAUTHORIZED, r#"{"message":"Invalid private key"}"#);

        assert_eq!(err.status, Some(401));
        assert_eq!(err.message, "Invalid private key");

        let err = error_from_body(StatusCode::BAD_GATEWAY, "upstream down");
        assert_eq!(err.message, "upstream down");
    }

    #[test]
    fn test_bare_message_id() {
        assert_eq!(bare_message_id("<20240101.1@mg.acme.test>"), "20240101.1@mg.acme.test");
        assert_eq!(bare_message_id("plain@id"), "plain@id");
    }

    #[test]
    fn test_validate_config() {
        assert!(mailer().validate_config().is_valid);

        let validation = MailgunMailer::new(MailgunConfig {
            domain: String::new(),
            ..mailer().config
        })
        .validate_config();

        assert_eq!(validation.errors, vec!["MAILGUN_DOMAIN is not set".to_string()]);
    }

    #[test]
    fn test_parse_permanent_failure_as_hard_bounce() -> TestResult {
        let body = json!({
            "signature": {"token": "t", "timestamp": "1", "signature": "s"},
            "event-data": {
                "event": "failed",
                "severity": "permanent",
                "recipient": "Bob@Example.com",
                "timestamp": 1700000000.5,
                "message": {"headers": {"message-id": "20240101.1@mg.acme.test"}},
                "user-variables": {"email_type": "customer_confirmation"},
                "delivery-status": {"message": "", "description": "No such mailbox", "code": 550}
            }
        });

        let events = parse_events(&body)?;

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, DeliveryEventKind::Bounced);
        assert_eq!(events[0].bounce_type, Some(BounceType::Hard));
        assert_eq!(events[0].message_id, "20240101.1@mg.acme.test");
        assert_eq!(events[0].reason.as_deref(), Some("No such mailbox"));
        assert_eq!(events[0].email_type.as_deref(), Some("customer_confirmation"));
        assert_eq!(events[0].timestamp.timestamp(), 1700000000);

        Ok(())
    }

    #[test]
    fn test_parse_temporary_failure_and_clicks() -> TestResult {
        let deferred = parse_events(&json!({
            "event-data": {"event": "failed", "severity": "temporary", "recipient": "a@example.com"}
        }))?;
        assert_eq!(deferred[0].event, DeliveryEventKind::Deferred);

        let clicked = parse_events(&json!({
            "event-data": {
                "event": "clicked",
                "recipient": "a@example.com",
                "url": "https://acme.test",
                "geolocation": {"country": "GB", "city": "Leeds"}
            }
        }))?;
        assert_eq!(clicked[0].url.as_deref(), Some("https://acme.test"));
        assert_eq!(clicked[0].location.as_deref(), Some("Leeds, GB"));

        assert!(parse_events(&json!({"event-data": {"event": "stored", "recipient": "a@example.com"}}))?.is_empty());

        Ok(())
    }
}
