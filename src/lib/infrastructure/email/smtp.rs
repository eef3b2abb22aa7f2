//! SMTP email service implementation

use std::time::Duration;

use async_trait::async_trait;
use clap::Parser;
use lettre::{
    address::Address,
    message::{
        header::{ContentType, Header, HeaderName, HeaderValue},
        Attachment, Mailbox, MultiPart, SinglePart,
    },
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
        Error as SmtpError,
    },
    AsyncSmtpTransport, AsyncTransport, Tokio1Executor,
};
use tracing::debug;
use uuid::Uuid;

use crate::domain::communication::mailer::{
    ConfigValidation, ConnectionTest, Mailer, Message, ProviderError, SentEmail,
};

const NAME: &str = "smtp";

/// SMTP configuration
#[derive(Clone, Default, Debug, Parser)]
pub struct SMTPConfig {
    /// The SMTP host
    #[clap(long = "smtp-host", env = "SMTP_HOST", default_value = "")]
    pub host: String,

    /// The SMTP port
    #[clap(long = "smtp-port", env = "SMTP_PORT", default_value = "587")]
    pub port: u16,

    /// The SMTP username
    #[clap(long = "smtp-user", env = "SMTP_USER", default_value = "")]
    pub username: String,

    /// The SMTP password
    #[clap(long = "smtp-password", env = "SMTP_PASSWORD", default_value = "")]
    pub password: String,

    /// The sender email address
    #[clap(long = "smtp-sender", env = "SMTP_SENDER", default_value = "")]
    pub sender: String,

    /// The sender display name
    #[clap(long = "smtp-sender-name", env = "SMTP_SENDER_NAME")]
    pub sender_name: Option<String>,

    /// Verify the TLS certificate
    #[clap(long = "smtp-verify-tls", env = "SMTP_VERIFY_TLS", default_value = "true")]
    pub verify_tls: bool,

    /// Enable STARTTLS (TLS upgrade on connection)
    #[clap(long = "smtp-starttls", env = "SMTP_STARTTLS", default_value = "true")]
    pub starttls: bool,

    /// Socket timeout in milliseconds
    #[clap(long = "smtp-timeout-ms", env = "SMTP_TIMEOUT_MS", default_value = "30000")]
    pub timeout_ms: u64,
}

macro_rules! custom_header {
    ($name:ident, $header:literal) => {
        #[derive(Debug, Clone, PartialEq, Eq)]
        struct $name(String);

        impl Header for $name {
            fn name() -> HeaderName {
                HeaderName::new_from_ascii_str($header)
            }

            fn parse(s: &str) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
                Ok(Self(s.to_string()))
            }

            fn display(&self) -> HeaderValue {
                HeaderValue::new(Self::name(), self.0.clone())
            }
        }
    };
}

custom_header!(CorrelationId, "X-Correlation-Id");
custom_header!(EmailType, "X-Email-Type");

/// SMTP mailer
#[derive(Debug, Default, Clone)]
pub struct SMTPMailer {
    config: SMTPConfig,
}

impl SMTPMailer {
    /// Create a new SMTP mailer
    pub fn new(config: SMTPConfig) -> Self {
        Self { config }
    }

    /// Builds the async transport from the configuration
    pub fn mailer(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, ProviderError> {
        let relay = if self.config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.host)
        }
        .map_err(|err| ProviderError::configuration(NAME, err.to_string()))?;

        let tls = TlsParameters::builder(self.config.host.to_string())
            .dangerous_accept_invalid_certs(!self.config.verify_tls)
            .build()
            .map_err(|err| ProviderError::configuration(NAME, err.to_string()))?;

        let mut relay = relay
            .port(self.config.port)
            .tls(Tls::Opportunistic(tls))
            .timeout(Some(Duration::from_millis(self.config.timeout_ms)));

        if !self.config.username.is_empty() {
            relay = relay.credentials(Credentials::new(
                self.config.username.clone(),
                self.config.password.clone(),
            ));
        }

        Ok(relay.build())
    }

    fn sender(&self, message: &Message) -> Result<Mailbox, ProviderError> {
        let address = message
            .from
            .as_ref()
            .map(|from| from.as_str())
            .unwrap_or(&self.config.sender);

        let name = message
            .from_name
            .clone()
            .or_else(|| self.config.sender_name.clone());

        Ok(Mailbox::new(name, parse_address(address)?))
    }

    /// `<uuid@sender-domain>`
    fn message_id(&self, sender: &Mailbox) -> String {
        format!("<{}@{}>", Uuid::now_v7(), sender.email.domain())
    }

    /// Maps a [`Message`] into a MIME message with our message id.
    pub fn build(&self, message: &Message) -> Result<(lettre::Message, String), ProviderError> {
        let sender = self.sender(message)?;
        let message_id = self.message_id(&sender);

        let mut builder = lettre::Message::builder()
            .from(sender)
            .subject(message.subject.clone())
            .message_id(Some(message_id.clone()))
            .header(EmailType(message.email_type.clone()));

        for to in &message.to {
            builder = builder.to(Mailbox::new(None, parse_address(to.as_str())?));
        }

        for cc in &message.cc {
            builder = builder.cc(Mailbox::new(None, parse_address(cc.as_str())?));
        }

        for bcc in &message.bcc {
            builder = builder.bcc(Mailbox::new(None, parse_address(bcc.as_str())?));
        }

        if let Some(reply_to) = &message.reply_to {
            builder = builder.reply_to(Mailbox::new(None, parse_address(reply_to.as_str())?));
        }

        if let Some(correlation_id) = &message.correlation_id {
            builder = builder.header(CorrelationId(correlation_id.clone()));
        }

        let body = if message.html_body.is_empty() {
            MultiPart::alternative().singlepart(SinglePart::plain(message.plain_body.clone()))
        } else {
            MultiPart::alternative_plain_html(message.plain_body.clone(), message.html_body.clone())
        };

        let email = if message.attachments.is_empty() {
            builder.multipart(body)
        } else {
            let mut mixed = MultiPart::mixed().multipart(body);

            for attachment in &message.attachments {
                let content_type = ContentType::parse(&attachment.content_type)
                    .map_err(|err| ProviderError::payload(NAME, err.to_string()))?;

                mixed = mixed.singlepart(
                    Attachment::new(attachment.filename.clone())
                        .body(attachment.content.clone(), content_type),
                );
            }

            builder.multipart(mixed)
        }
        .map_err(|err| ProviderError::payload(NAME, err.to_string()))?;

        Ok((email, message_id))
    }
}

fn parse_address(address: &str) -> Result<Address, ProviderError> {
    address
        .parse()
        .map_err(|err| ProviderError::payload(NAME, format!("{address}: {err}")))
}

/// Maps a transport error onto a [`ProviderError`], keeping the SMTP reply
/// code when the server sent one.
fn smtp_error(err: SmtpError) -> ProviderError {
    match err.status() {
        Some(code) => ProviderError::response(
            NAME,
            code.to_string().parse().ok(),
            None,
            err.to_string(),
        ),
        None => ProviderError::connection(NAME, err.to_string()),
    }
}

#[async_trait]
impl Mailer for SMTPMailer {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn send_email(&self, message: &Message) -> Result<SentEmail, ProviderError> {
        let (email, message_id) = self.build(message)?;

        let response = self.mailer()?.send(email).await.map_err(smtp_error)?;

        debug!(
            request_id = %message.id,
            code = %response.code(),
            "SMTP server accepted message"
        );

        Ok(SentEmail {
            message_id,
            metadata: serde_json::json!({
                "code": response.code().to_string(),
                "response": response.message().collect::<Vec<_>>(),
            }),
        })
    }

    fn validate_config(&self) -> ConfigValidation {
        let mut errors = Vec::new();

        if self.config.host.is_empty() {
            errors.push("SMTP_HOST is not set".to_string());
        }

        if self.config.port == 0 {
            errors.push("SMTP_PORT must be greater than zero".to_string());
        }

        if self.config.sender.is_empty() {
            errors.push("SMTP_SENDER is not set".to_string());
        } else if self.config.sender.parse::<Address>().is_err() {
            errors.push(format!("SMTP_SENDER is not a valid address: {}", self.config.sender));
        }

        if !self.config.username.is_empty() && self.config.password.is_empty() {
            errors.push("SMTP_PASSWORD is required when SMTP_USER is set".to_string());
        }

        ConfigValidation::from_errors(errors)
    }

    async fn test_connection(&self) -> ConnectionTest {
        let result = async {
            let connected = self.mailer()?.test_connection().await.map_err(smtp_error)?;

            if connected {
                Ok(())
            } else {
                Err(ProviderError::connection(NAME, "server did not answer NOOP"))
            }
        }
        .await;

        result.into()
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use crate::domain::communication::{
        email_addresses::EmailAddress,
        mailer::{Attachment as MessageAttachment, ProviderErrorKind},
    };

    use super::*;

    fn config() -> SMTPConfig {
        SMTPConfig {
            host: "smtp.example.com".to_string(),
            port: 587,
            username: "user".to_string(),
            password: "secret".to_string(),
            sender: "quotes@acme.test".to_string(),
            sender_name: Some("Acme Movers".to_string()),
            verify_tls: true,
            starttls: true,
            timeout_ms: 1000,
        }
    }

    fn message() -> Message {
        Message::builder()
            .to(EmailAddress::new_unchecked("ada@example.com"))
            .cc(EmailAddress::new_unchecked("ops@acme.test"))
            .subject("Your quote")
            .html("<p>Hello</p>")
            .plain("Hello")
            .correlation_id("Q-7")
            .email_type("customer_confirmation")
            .build()
    }

    #[test]
    fn test_build_sets_headers_and_message_id() -> TestResult {
        let mailer = SMTPMailer::new(config());

        let (email, message_id) = mailer.build(&message())?;
        let formatted = String::from_utf8(email.formatted())?;

        assert!(message_id.ends_with("@acme.test>"));
        assert!(formatted.contains("X-Correlation-Id: Q-7"));
        assert!(formatted.contains("X-Email-Type: customer_confirmation"));
        assert!(formatted.contains("Cc: ops@acme.test"));
        assert!(formatted.contains("From: \"Acme Movers\" <quotes@acme.test>")
            || formatted.contains("From: Acme Movers <quotes@acme.test>"));
        assert!(formatted.contains("multipart/alternative"));

        Ok(())
    }

    #[test]
    fn test_build_with_attachment_is_mixed() -> TestResult {
        let mailer = SMTPMailer::new(config());

        let message = Message {
            attachments: vec![MessageAttachment {
                filename: "quote.pdf".to_string(),
                content_type: "application/pdf".to_string(),
                content: b"%PDF".to_vec(),
            }],
            ..message()
        };

        let (email, _) = mailer.build(&message)?;
        let formatted = String::from_utf8(email.formatted())?;

        assert!(formatted.contains("multipart/mixed"));
        assert!(formatted.contains("quote.pdf"));

        Ok(())
    }

    #[test]
    fn test_invalid_attachment_type_is_a_payload_error() {
        let mailer = SMTPMailer::new(config());

        let message = Message {
            attachments: vec![MessageAttachment {
                filename: "x".to_string(),
                content_type: "not a mime type".to_string(),
                content: Vec::new(),
            }],
            ..message()
        };

        let err = mailer.build(&message).unwrap_err();

        assert_eq!(err.kind, ProviderErrorKind::Payload);
    }

    #[test]
    fn test_validate_config() {
        assert!(SMTPMailer::new(config()).validate_config().is_valid);

        let validation = SMTPMailer::new(SMTPConfig {
            host: String::new(),
            sender: "not an address".to_string(),
            password: String::new(),
            ..config()
        })
        .validate_config();

        assert!(!validation.is_valid);
        assert_eq!(validation.errors.len(), 3);
    }

    #[test]
    fn test_no_credentials_is_valid() {
        let validation = SMTPMailer::new(SMTPConfig {
            username: String::new(),
            password: String::new(),
            ..config()
        })
        .validate_config();

        assert!(validation.is_valid);
    }
}
