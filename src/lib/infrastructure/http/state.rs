//! Application state module

use std::{fmt, sync::Arc};

use chrono::{DateTime, Utc};

use crate::domain::communication::{
    analytics::{AnalyticsRecorder, TrackingConfig},
    dispatcher::EmailDispatcher,
    notifications::QuoteNotifier,
    queue::QueueService,
    suppressions::SuppressionService,
    webhooks::DeliveryEventHandler,
};

/// Global application state
pub struct AppState<S, D, N>
where
    S: SuppressionService,
    D: EmailDispatcher,
    N: QuoteNotifier,
{
    /// The time the server started
    pub start_time: DateTime<Utc>,

    /// Shared secret expected in the `X-Webhook-Token` header
    pub webhook_token: Option<String>,

    /// Open and click tracking, when enabled
    pub tracking: Option<TrackingConfig>,

    /// Suppression list
    pub suppressions: Arc<S>,

    /// Email dispatcher
    pub dispatcher: Arc<D>,

    /// Quote notifications
    pub notifier: Arc<N>,

    /// Delivery queue
    pub queue: Arc<dyn QueueService>,

    /// Analytics log
    pub analytics: Arc<AnalyticsRecorder>,

    /// Routes provider callbacks to analytics and suppressions
    pub events: Arc<DeliveryEventHandler<S>>,
}

impl<S, D, N> AppState<S, D, N>
where
    S: SuppressionService,
    D: EmailDispatcher,
    N: QuoteNotifier,
{
    /// Create a new application state
    pub fn new(
        suppressions: Arc<S>,
        dispatcher: Arc<D>,
        notifier: Arc<N>,
        queue: Arc<dyn QueueService>,
        analytics: Arc<AnalyticsRecorder>,
    ) -> Self {
        let events = Arc::new(DeliveryEventHandler::new(
            suppressions.clone(),
            analytics.clone(),
        ));

        Self {
            start_time: Utc::now(),
            webhook_token: None,
            tracking: None,
            suppressions,
            dispatcher,
            notifier,
            queue,
            analytics,
            events,
        }
    }

    /// Requires `X-Webhook-Token` on webhook and admin routes
    pub fn with_webhook_token(mut self, token: Option<String>) -> Self {
        self.webhook_token = token.filter(|token| !token.is_empty());
        self
    }

    /// Enables the open and click tracking endpoints
    pub fn with_tracking(mut self, tracking: Option<TrackingConfig>) -> Self {
        self.tracking = tracking;
        self
    }
}

impl<S, D, N> Clone for AppState<S, D, N>
where
    S: SuppressionService,
    D: EmailDispatcher,
    N: QuoteNotifier,
{
    fn clone(&self) -> Self {
        Self {
            start_time: self.start_time,
            webhook_token: self.webhook_token.clone(),
            tracking: self.tracking.clone(),
            suppressions: self.suppressions.clone(),
            dispatcher: self.dispatcher.clone(),
            notifier: self.notifier.clone(),
            queue: self.queue.clone(),
            analytics: self.analytics.clone(),
            events: self.events.clone(),
        }
    }
}

impl<S, D, N> fmt::Debug for AppState<S, D, N>
where
    S: SuppressionService,
    D: EmailDispatcher,
    N: QuoteNotifier,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("start_time", &self.start_time)
            .field("webhook_token", &self.webhook_token.as_ref().map(|_| "***"))
            .field("tracking", &self.tracking.as_ref().map(|t| &t.base_url))
            .field("suppressions", &"SuppressionService")
            .field("dispatcher", &"EmailDispatcher")
            .field("notifier", &"QuoteNotifier")
            .field("queue", &"QueueService")
            .finish()
    }
}
