//! Email message

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::communication::email_addresses::EmailAddress;

/// Delivery priority, highest first
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Must go out before anything else
    Critical,

    /// Customer-facing confirmations
    High,

    /// The default
    #[default]
    Normal,

    /// Can wait
    Low,
}

impl Priority {
    /// Sort key; lower is served first
    pub fn rank(&self) -> u8 {
        match self {
            Self::Critical => 0,
            Self::High => 1,
            Self::Normal => 2,
            Self::Low => 3,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Normal => "normal",
            Self::Low => "low",
        };

        write!(f, "{name}")
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "critical" => Ok(Self::Critical),
            "high" => Ok(Self::High),
            "normal" => Ok(Self::Normal),
            "low" => Ok(Self::Low),
            _ => Err(format!("invalid priority: {s}")),
        }
    }
}

/// A file attached to a message
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// File name shown to the recipient
    pub filename: String,

    /// MIME type, e.g. `application/pdf`
    pub content_type: String,

    /// Raw file content
    pub content: Vec<u8>,
}

impl fmt::Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attachment")
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("size", &self.content.len())
            .finish()
    }
}

/// One logical email, independent of transport.
///
/// Built once by the caller through [`Message::builder`] and never changed
/// afterwards; the dispatcher only ever reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Unique id of this request
    pub id: Uuid,

    /// Primary recipients
    pub to: Vec<EmailAddress>,

    /// Carbon copy recipients
    pub cc: Vec<EmailAddress>,

    /// Blind carbon copy recipients
    pub bcc: Vec<EmailAddress>,

    /// Sender override; providers fall back to their configured sender
    pub from: Option<EmailAddress>,

    /// Display name for the sender
    pub from_name: Option<String>,

    /// Reply-to address
    pub reply_to: Option<EmailAddress>,

    /// The subject of the email
    pub subject: String,

    /// The HTML body of the email
    pub html_body: String,

    /// The plain text body of the email
    pub plain_body: String,

    /// Business correlation id, e.g. the quote id
    pub correlation_id: Option<String>,

    /// Email type tag, e.g. `customer_confirmation`
    pub email_type: String,

    /// Delivery priority
    pub priority: Priority,

    /// Attached files
    pub attachments: Vec<Attachment>,
}

impl Message {
    /// Starts building a message
    pub fn builder() -> MessageBuilder {
        MessageBuilder::default()
    }

    /// Every recipient across `to`, `cc` and `bcc`
    pub fn recipients(&self) -> impl Iterator<Item = &EmailAddress> {
        self.to.iter().chain(self.cc.iter()).chain(self.bcc.iter())
    }

    /// Lists what makes this message unsendable
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.to.is_empty() {
            problems.push("at least one recipient is required".to_string());
        }

        if self.subject.trim().is_empty() {
            problems.push("subject is required".to_string());
        }

        if self.html_body.trim().is_empty() && self.plain_body.trim().is_empty() {
            problems.push("an HTML or plain text body is required".to_string());
        }

        problems
    }
}

/// Builder for [`Message`]
#[derive(Debug, Default)]
pub struct MessageBuilder {
    to: Vec<EmailAddress>,
    cc: Vec<EmailAddress>,
    bcc: Vec<EmailAddress>,
    from: Option<EmailAddress>,
    from_name: Option<String>,
    reply_to: Option<EmailAddress>,
    subject: String,
    html_body: String,
    plain_body: String,
    correlation_id: Option<String>,
    email_type: Option<String>,
    priority: Priority,
    attachments: Vec<Attachment>,
}

impl MessageBuilder {
    /// Adds a primary recipient
    pub fn to(mut self, address: EmailAddress) -> Self {
        self.to.push(address);
        self
    }

    /// Adds a carbon copy recipient
    pub fn cc(mut self, address: EmailAddress) -> Self {
        self.cc.push(address);
        self
    }

    /// Adds a blind carbon copy recipient
    pub fn bcc(mut self, address: EmailAddress) -> Self {
        self.bcc.push(address);
        self
    }

    /// Sets the sender
    pub fn from(mut self, address: EmailAddress, name: Option<String>) -> Self {
        self.from = Some(address);
        self.from_name = name;
        self
    }

    /// Sets the reply-to address
    pub fn reply_to(mut self, address: EmailAddress) -> Self {
        self.reply_to = Some(address);
        self
    }

    /// Sets the subject
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Sets the HTML body
    pub fn html(mut self, html: impl Into<String>) -> Self {
        self.html_body = html.into();
        self
    }

    /// Sets the plain text body
    pub fn plain(mut self, plain: impl Into<String>) -> Self {
        self.plain_body = plain.into();
        self
    }

    /// Sets the business correlation id
    pub fn correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Sets the email type tag
    pub fn email_type(mut self, email_type: impl Into<String>) -> Self {
        self.email_type = Some(email_type.into());
        self
    }

    /// Sets the priority
    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Adds an attachment
    pub fn attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Finishes the message
    pub fn build(self) -> Message {
        Message {
            id: Uuid::now_v7(),
            to: self.to,
            cc: self.cc,
            bcc: self.bcc,
            from: self.from,
            from_name: self.from_name,
            reply_to: self.reply_to,
            subject: self.subject,
            html_body: self.html_body,
            plain_body: self.plain_body,
            correlation_id: self.correlation_id,
            email_type: self.email_type.unwrap_or_else(|| "general".to_string()),
            priority: self.priority,
            attachments: self.attachments,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_rank_orders_critical_first() {
        let mut priorities = vec![Priority::Low, Priority::Critical, Priority::Normal, Priority::High];

        priorities.sort_by_key(Priority::rank);

        assert_eq!(
            priorities,
            vec![Priority::Critical, Priority::High, Priority::Normal, Priority::Low]
        );
    }

    #[test]
    fn test_message_without_recipient_or_body_has_problems() {
        let message = Message::builder().subject("Hello").build();

        assert_eq!(
            message.problems(),
            vec![
                "at least one recipient is required".to_string(),
                "an HTML or plain text body is required".to_string(),
            ]
        );
    }

    #[test]
    fn test_recipients_include_cc_and_bcc() {
        let message = Message::builder()
            .to(EmailAddress::new_unchecked("a@example.com"))
            .cc(EmailAddress::new_unchecked("b@example.com"))
            .bcc(EmailAddress::new_unchecked("c@example.com"))
            .subject("Hi")
            .plain("Body")
            .build();

        assert_eq!(message.recipients().count(), 3);
        assert!(message.problems().is_empty());
        assert_eq!(message.email_type, "general");
    }
}
