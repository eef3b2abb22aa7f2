//! Template-based send requests

use serde::{Deserialize, Serialize};

use crate::domain::communication::{
    email_addresses::EmailAddress,
    mailer::{Attachment, Message, Priority},
    templates::RenderedEmail,
};

/// A send request whose bodies come from a named template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplatedEmail {
    /// Primary recipients
    pub to: Vec<EmailAddress>,

    /// Carbon copy recipients
    pub cc: Vec<EmailAddress>,

    /// Blind carbon copy recipients
    pub bcc: Vec<EmailAddress>,

    /// Reply-to address
    pub reply_to: Option<EmailAddress>,

    /// Template name
    pub template: String,

    /// Template variables
    pub context: serde_json::Value,

    /// Business correlation id
    pub correlation_id: Option<String>,

    /// Email type tag; defaults to the template name
    pub email_type: Option<String>,

    /// Delivery priority
    pub priority: Priority,

    /// Attached files
    pub attachments: Vec<Attachment>,
}

impl TemplatedEmail {
    /// A request for one recipient
    pub fn new(to: EmailAddress, template: impl Into<String>, context: serde_json::Value) -> Self {
        Self {
            to: vec![to],
            cc: Vec::new(),
            bcc: Vec::new(),
            reply_to: None,
            template: template.into(),
            context,
            correlation_id: None,
            email_type: None,
            priority: Priority::Normal,
            attachments: Vec::new(),
        }
    }

    /// Builds the message from the rendered template
    pub fn into_message(self, rendered: RenderedEmail) -> Message {
        let email_type = self.email_type.unwrap_or_else(|| self.template.clone());

        let mut builder = Message::builder()
            .subject(rendered.subject)
            .html(rendered.html)
            .plain(rendered.text)
            .email_type(email_type)
            .priority(self.priority);

        for address in self.to {
            builder = builder.to(address);
        }

        for address in self.cc {
            builder = builder.cc(address);
        }

        for address in self.bcc {
            builder = builder.bcc(address);
        }

        if let Some(reply_to) = self.reply_to {
            builder = builder.reply_to(reply_to);
        }

        if let Some(correlation_id) = self.correlation_id {
            builder = builder.correlation_id(correlation_id);
        }

        for attachment in self.attachments {
            builder = builder.attachment(attachment);
        }

        builder.build()
    }
}
