//! Email templates

mod builtin;
mod errors;
mod fallback;
mod renderer;
mod text;

use serde::{Deserialize, Serialize};

pub use errors::TemplateError;
pub use renderer::{RenderedEmail, TemplateRenderer};

/// The business sending the email, exposed to templates as `business`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessIdentity {
    /// Trading name
    pub name: String,

    /// Sender address
    pub email: String,

    /// Contact phone number
    pub phone: String,

    /// Public website
    pub website: String,

    /// Inbox that receives new quote notifications
    pub notification_email: String,
}
