//! Provider-agnostic email dispatch

mod config;
mod errors;
mod request;
mod result;
mod service;

pub use config::DispatcherConfig;
pub use errors::DispatchError;
pub use request::TemplatedEmail;
pub use result::{AttemptError, DeliveryAttempt, DeliveryResult, DeliveryStatus, ProviderHealth};
pub use service::{EmailDispatcher, EmailDispatcherImpl};
