//! Quote notifier service

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};

#[cfg(test)]
use mockall::mock;

use crate::domain::communication::{
    dispatcher::{DeliveryResult, EmailDispatcher, TemplatedEmail},
    email_addresses::EmailAddress,
    mailer::{Message, Priority},
    queue::QueueService,
    templates::TemplateRenderer,
};

use super::{CustomerDetails, NotificationError, NotificationOutcome, QuoteNotificationReport};

/// Emails sent when a quote is submitted
#[async_trait]
pub trait QuoteNotifier: Send + Sync + 'static {
    /// Confirms the quote request to the customer
    async fn send_customer_confirmation(
        &self,
        customer: &CustomerDetails,
        quote_id: &str,
    ) -> Result<DeliveryResult, NotificationError>;

    /// Tells the business about a new quote request
    async fn send_business_notification(
        &self,
        customer: &CustomerDetails,
        quote_id: &str,
    ) -> Result<DeliveryResult, NotificationError>;

    /// Sends both notifications.
    ///
    /// Never fails: the quote is already stored, so email problems are
    /// reported through [`QuoteNotificationReport::requires_follow_up`].
    async fn notify_quote_submitted(
        &self,
        customer: &CustomerDetails,
        quote_id: &str,
    ) -> QuoteNotificationReport;
}

#[cfg(test)]
mock! {
    pub QuoteNotifier {}

    #[async_trait]
    impl QuoteNotifier for QuoteNotifier {
        async fn send_customer_confirmation(
            &self,
            customer: &CustomerDetails,
            quote_id: &str,
        ) -> Result<DeliveryResult, NotificationError>;
        async fn send_business_notification(
            &self,
            customer: &CustomerDetails,
            quote_id: &str,
        ) -> Result<DeliveryResult, NotificationError>;
        async fn notify_quote_submitted(
            &self,
            customer: &CustomerDetails,
            quote_id: &str,
        ) -> QuoteNotificationReport;
    }
}

/// Quote notifier implementation
pub struct QuoteNotifierImpl<D>
where
    D: EmailDispatcher,
{
    dispatcher: Arc<D>,
    templates: Arc<TemplateRenderer>,
    queue: Option<Arc<dyn QueueService>>,
}

impl<D> QuoteNotifierImpl<D>
where
    D: EmailDispatcher,
{
    /// Creates a new notifier
    pub fn new(dispatcher: Arc<D>, templates: Arc<TemplateRenderer>) -> Self {
        Self {
            dispatcher,
            templates,
            queue: None,
        }
    }

    /// Hands failed notifications to `queue` for another try
    pub fn with_queue(mut self, queue: Arc<dyn QueueService>) -> Self {
        self.queue = Some(queue);
        self
    }

    fn context(&self, customer: &CustomerDetails, quote_id: &str) -> serde_json::Value {
        json!({
            "quote_id": quote_id,
            "customer": customer,
        })
    }

    fn customer_confirmation(
        &self,
        customer: &CustomerDetails,
        quote_id: &str,
    ) -> Result<Message, NotificationError> {
        let mut request = TemplatedEmail::new(
            customer.email.clone(),
            TemplateRenderer::CUSTOMER_CONFIRMATION,
            self.context(customer, quote_id),
        );
        request.correlation_id = Some(quote_id.to_string());
        request.priority = Priority::High;
        request.reply_to = EmailAddress::new(&self.templates.identity().email).ok();

        let rendered = self.templates.render(&request.template, &request.context)?;

        Ok(request.into_message(rendered))
    }

    fn business_notification(
        &self,
        customer: &CustomerDetails,
        quote_id: &str,
    ) -> Result<Message, NotificationError> {
        let inbox = EmailAddress::new(&self.templates.identity().notification_email)?;

        let mut request = TemplatedEmail::new(
            inbox,
            TemplateRenderer::BUSINESS_NOTIFICATION,
            self.context(customer, quote_id),
        );
        request.correlation_id = Some(quote_id.to_string());
        request.priority = Priority::Critical;
        request.reply_to = Some(customer.email.clone());

        let rendered = self.templates.render(&request.template, &request.context)?;

        Ok(request.into_message(rendered))
    }

    async fn deliver(&self, message: Result<Message, NotificationError>) -> NotificationOutcome {
        let message = match message {
            Ok(message) => message,
            Err(err) => {
                return NotificationOutcome::Failed {
                    error: err.to_string(),
                }
            }
        };

        let err = match self.dispatcher.send(&message).await {
            Ok(result) => return NotificationOutcome::Dispatched { result },
            Err(err) => err,
        };

        let Some(queue) = self.queue.as_ref().filter(|_| err.is_retryable()) else {
            return NotificationOutcome::Failed {
                error: err.to_string(),
            };
        };

        let request_id = message.id;
        let priority = message.priority;

        match queue.enqueue(message, priority).await {
            Ok(queue_item_id) => {
                info!(
                    request_id = %request_id,
                    queue_item_id = %queue_item_id,
                    "Notification queued after failed delivery"
                );

                NotificationOutcome::Queued {
                    queue_item_id,
                    error: err.to_string(),
                }
            }
            Err(queue_err) => {
                warn!(request_id = %request_id, error = %queue_err, "Could not queue notification");

                NotificationOutcome::Failed {
                    error: err.to_string(),
                }
            }
        }
    }
}

#[async_trait]
impl<D> QuoteNotifier for QuoteNotifierImpl<D>
where
    D: EmailDispatcher,
{
    async fn send_customer_confirmation(
        &self,
        customer: &CustomerDetails,
        quote_id: &str,
    ) -> Result<DeliveryResult, NotificationError> {
        let message = self.customer_confirmation(customer, quote_id)?;

        Ok(self.dispatcher.send(&message).await?)
    }

    async fn send_business_notification(
        &self,
        customer: &CustomerDetails,
        quote_id: &str,
    ) -> Result<DeliveryResult, NotificationError> {
        let message = self.business_notification(customer, quote_id)?;

        Ok(self.dispatcher.send(&message).await?)
    }

    async fn notify_quote_submitted(
        &self,
        customer: &CustomerDetails,
        quote_id: &str,
    ) -> QuoteNotificationReport {
        let customer_confirmation = self
            .deliver(self.customer_confirmation(customer, quote_id))
            .await;
        let business_notification = self
            .deliver(self.business_notification(customer, quote_id))
            .await;

        let report =
            QuoteNotificationReport::new(quote_id, customer_confirmation, business_notification);

        if report.requires_follow_up {
            warn!(
                quote_id,
                customer = %customer.email,
                customer_confirmation = ?report.customer_confirmation,
                business_notification = ?report.business_notification,
                "Quote notifications incomplete, manual follow-up required"
            );
        } else {
            info!(quote_id, "Quote notifications sent");
        }

        report
    }
}
