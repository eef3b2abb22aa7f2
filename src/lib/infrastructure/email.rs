//! Email provider adapters

use std::sync::Arc;

use clap::Parser;

use crate::domain::communication::mailer::Mailer;

pub mod mailgun;
pub mod sendgrid;
pub mod smtp;

use mailgun::{MailgunConfig, MailgunMailer};
use sendgrid::{SendGridConfig, SendGridMailer};
use smtp::{SMTPConfig, SMTPMailer};

/// Credentials and endpoints for every supported provider
#[derive(Clone, Debug, Parser)]
pub struct ProviderSettings {
    /// SMTP relay
    #[clap(flatten)]
    pub smtp: SMTPConfig,

    /// SendGrid API
    #[clap(flatten)]
    pub sendgrid: SendGridConfig,

    /// Mailgun API
    #[clap(flatten)]
    pub mailgun: MailgunConfig,
}

impl ProviderSettings {
    /// Every provider adapter; the dispatcher decides which ones it uses
    pub fn providers(&self) -> Vec<Arc<dyn Mailer>> {
        vec![
            Arc::new(SMTPMailer::new(self.smtp.clone())),
            Arc::new(SendGridMailer::new(self.sendgrid.clone())),
            Arc::new(MailgunMailer::new(self.mailgun.clone())),
        ]
    }
}
