//! Analytics recorder

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use super::{AnalyticsEvent, EventMetadata, EventType};

/// Totals and rates over a window. Rates are percentages of `sent`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmailStats {
    /// Messages accepted by a provider
    pub sent: u64,
    /// Delivered
    pub delivered: u64,
    /// Opened
    pub opened: u64,
    /// Clicked
    pub clicked: u64,
    /// Bounced
    pub bounced: u64,
    /// Complained
    pub complained: u64,
    /// Unsubscribed
    pub unsubscribed: u64,

    /// `delivered / sent`
    pub delivery_rate: f64,
    /// `opened / sent`
    pub open_rate: f64,
    /// `clicked / sent`
    pub click_rate: f64,
    /// `bounced / sent`
    pub bounce_rate: f64,
    /// `complained / sent`
    pub complaint_rate: f64,
    /// `unsubscribed / sent`
    pub unsubscribe_rate: f64,
}

impl EmailStats {
    fn count(&mut self, event_type: EventType) {
        match event_type {
            EventType::Sent => self.sent += 1,
            EventType::Delivered => self.delivered += 1,
            EventType::Opened => self.opened += 1,
            EventType::Clicked => self.clicked += 1,
            EventType::Bounced => self.bounced += 1,
            EventType::Complained => self.complained += 1,
            EventType::Unsubscribed => self.unsubscribed += 1,
        }
    }

    fn with_rates(mut self) -> Self {
        let sent = self.sent;
        let rate = |count: u64| {
            if sent == 0 {
                0.0
            } else {
                (count as f64 / sent as f64 * 10_000.0).round() / 100.0
            }
        };

        self.delivery_rate = rate(self.delivered);
        self.open_rate = rate(self.opened);
        self.click_rate = rate(self.clicked);
        self.bounce_rate = rate(self.bounced);
        self.complaint_rate = rate(self.complained);
        self.unsubscribe_rate = rate(self.unsubscribed);

        self
    }
}

/// Append-only event log with on-demand aggregation
#[derive(Debug, Default)]
pub struct AnalyticsRecorder {
    events: RwLock<Vec<AnalyticsEvent>>,
}

impl AnalyticsRecorder {
    /// Creates an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event
    pub async fn record(&self, event: AnalyticsEvent) {
        debug!(
            message_id = %event.message_id,
            event = %event.event_type,
            "analytics event recorded"
        );

        self.events.write().await.push(event);
    }

    /// Every event recorded for a message, in arrival order
    pub async fn events_for(&self, message_id: &str) -> Vec<AnalyticsEvent> {
        self.events
            .read()
            .await
            .iter()
            .filter(|event| event.message_id == message_id)
            .cloned()
            .collect()
    }

    /// Totals and rates for events with `start <= timestamp < end`
    pub async fn stats(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> EmailStats {
        let events = self.events.read().await;

        events
            .iter()
            .filter(|event| event.timestamp >= start && event.timestamp < end)
            .fold(EmailStats::default(), |mut stats, event| {
                stats.count(event.event_type);
                stats
            })
            .with_rates()
    }

    /// Like [`AnalyticsRecorder::stats`], broken down by email type.
    ///
    /// Provider callbacks rarely carry the email type, so events without one
    /// inherit it from the `sent` event of the same message (matched by
    /// provider message id or by request id). Events that
    /// still have no type are filed under `unknown`.
    pub async fn stats_by_type(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> BTreeMap<String, EmailStats> {
        let events = self.events.read().await;

        let mut sent_types: HashMap<&str, &str> = HashMap::new();

        for event in events.iter().filter(|event| event.event_type == EventType::Sent) {
            let Some(email_type) = event.email_type.as_deref() else {
                continue;
            };

            sent_types.insert(event.message_id.as_str(), email_type);

            // tracking links carry our request id rather than the provider's
            if let EventMetadata::Sent { request_id, .. } = &event.metadata {
                sent_types.insert(request_id.as_str(), email_type);
            }
        }

        let mut breakdown: BTreeMap<String, EmailStats> = BTreeMap::new();

        for event in events
            .iter()
            .filter(|event| event.timestamp >= start && event.timestamp < end)
        {
            let email_type = event
                .email_type
                .as_deref()
                .or_else(|| sent_types.get(event.message_id.as_str()).copied())
                .unwrap_or("unknown");

            breakdown
                .entry(email_type.to_string())
                .or_default()
                .count(event.event_type);
        }

        breakdown
            .into_iter()
            .map(|(email_type, stats)| (email_type, stats.with_rates()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn window() -> (DateTime<Utc>, DateTime<Utc>) {
        (Utc::now() - Duration::hours(1), Utc::now() + Duration::hours(1))
    }

    #[tokio::test]
    async fn test_rates_are_percentages_of_sent() {
        let recorder = AnalyticsRecorder::new();

        for id in ["1", "2", "3", "4"] {
            recorder
                .record(AnalyticsEvent::new(id, EventType::Sent).with_email_type("customer_confirmation"))
                .await;
        }

        recorder.record(AnalyticsEvent::new("1", EventType::Delivered)).await;
        recorder.record(AnalyticsEvent::new("2", EventType::Delivered)).await;
        recorder.record(AnalyticsEvent::new("3", EventType::Delivered)).await;
        recorder.record(AnalyticsEvent::new("1", EventType::Opened)).await;
        recorder
            .record(AnalyticsEvent::new("4", EventType::Bounced).with_metadata(EventMetadata::Bounce {
                bounce_type: "hard".to_string(),
                reason: None,
            }))
            .await;

        let (start, end) = window();
        let stats = recorder.stats(start, end).await;

        assert_eq!(stats.sent, 4);
        assert_eq!(stats.delivery_rate, 75.0);
        assert_eq!(stats.open_rate, 25.0);
        assert_eq!(stats.bounce_rate, 25.0);
        assert_eq!(stats.click_rate, 0.0);
    }

    #[tokio::test]
    async fn test_rates_are_zero_without_sends() {
        let recorder = AnalyticsRecorder::new();

        recorder.record(AnalyticsEvent::new("x", EventType::Opened)).await;

        let (start, end) = window();
        let stats = recorder.stats(start, end).await;

        assert_eq!(stats.opened, 1);
        assert_eq!(stats.open_rate, 0.0);
    }

    #[tokio::test]
    async fn test_window_excludes_old_events() {
        let recorder = AnalyticsRecorder::new();

        recorder
            .record(AnalyticsEvent::new("old", EventType::Sent).at(Utc::now() - Duration::days(2)))
            .await;
        recorder.record(AnalyticsEvent::new("new", EventType::Sent)).await;

        let (start, end) = window();

        assert_eq!(recorder.stats(start, end).await.sent, 1);
    }

    #[tokio::test]
    async fn test_breakdown_inherits_type_from_sent_event() {
        let recorder = AnalyticsRecorder::new();

        recorder
            .record(AnalyticsEvent::new("a", EventType::Sent).with_email_type("customer_confirmation"))
            .await;
        recorder
            .record(AnalyticsEvent::new("b", EventType::Sent).with_email_type("business_notification"))
            .await;
        recorder.record(AnalyticsEvent::new("a", EventType::Opened)).await;
        recorder.record(AnalyticsEvent::new("zzz", EventType::Clicked)).await;

        let (start, end) = window();
        let breakdown = recorder.stats_by_type(start, end).await;

        assert_eq!(breakdown["customer_confirmation"].opened, 1);
        assert_eq!(breakdown["customer_confirmation"].open_rate, 100.0);
        assert_eq!(breakdown["business_notification"].sent, 1);
        assert_eq!(breakdown["unknown"].clicked, 1);
    }

    #[tokio::test]
    async fn test_tracking_events_match_sent_by_request_id() {
        let recorder = AnalyticsRecorder::new();

        recorder
            .record(
                AnalyticsEvent::new("provider-1", EventType::Sent)
                    .with_email_type("business_notification")
                    .with_metadata(EventMetadata::Sent {
                        provider: "smtp".to_string(),
                        request_id: "request-1".to_string(),
                    }),
            )
            .await;
        recorder.record(AnalyticsEvent::new("request-1", EventType::Opened)).await;

        let (start, end) = window();
        let breakdown = recorder.stats_by_type(start, end).await;

        assert_eq!(breakdown["business_notification"].opened, 1);
        assert!(!breakdown.contains_key("unknown"));
    }

    #[tokio::test]
    async fn test_events_for_message() {
        let recorder = AnalyticsRecorder::new();

        recorder.record(AnalyticsEvent::new("a", EventType::Sent)).await;
        recorder.record(AnalyticsEvent::new("b", EventType::Sent)).await;
        recorder.record(AnalyticsEvent::new("a", EventType::Delivered)).await;

        let events = recorder.events_for("a").await;

        assert_eq!(
            events.iter().map(|e| e.event_type).collect::<Vec<_>>(),
            vec![EventType::Sent, EventType::Delivered]
        );
    }
}
