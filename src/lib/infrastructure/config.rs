//! Command-line / environment configuration for the email services

use std::time::Duration;

use clap::Parser;
use tracing::warn;

use crate::domain::communication::{
    analytics::TrackingConfig,
    dispatcher::DispatcherConfig,
    queue::QueueConfig,
    retry::RetryPolicy,
    suppressions::{SuppressionConfig, UndeterminedBouncePolicy},
    templates::BusinessIdentity,
};

/// Dispatcher settings
#[derive(Clone, Debug, Parser)]
pub struct DispatchSettings {
    /// Provider tried first
    #[arg(long, env = "EMAIL_PRIMARY_PROVIDER", default_value = "smtp")]
    pub primary_provider: String,

    /// Providers tried after the primary, comma separated
    #[arg(long, env = "EMAIL_FALLBACK_PROVIDERS", value_delimiter = ',')]
    pub fallback_providers: Vec<String>,

    /// Attempts per provider
    #[arg(long, env = "EMAIL_MAX_RETRIES", default_value = "3")]
    pub max_retries: u32,

    /// Backoff before the second attempt, in milliseconds
    #[arg(long, env = "EMAIL_RETRY_BASE_DELAY_MS", default_value = "1000")]
    pub retry_base_delay_ms: u64,

    /// Backoff ceiling, in milliseconds
    #[arg(long, env = "EMAIL_RETRY_MAX_DELAY_MS", default_value = "30000")]
    pub retry_max_delay_ms: u64,

    /// Upper bound for one provider call, in milliseconds
    #[arg(long, env = "EMAIL_ATTEMPT_TIMEOUT_MS", default_value = "30000")]
    pub attempt_timeout_ms: u64,

    /// Render and validate but never send
    #[arg(long, env = "EMAIL_DRY_RUN", default_value = "false")]
    pub dry_run: bool,

    /// Public base URL of the open/click tracking endpoints
    #[arg(long, env = "EMAIL_TRACKING_BASE_URL")]
    pub tracking_base_url: Option<String>,

    /// Secret used to sign click-tracking links
    #[arg(long, env = "EMAIL_TRACKING_SECRET")]
    pub tracking_secret: Option<String>,
}

impl DispatchSettings {
    /// Retry policy for inline provider attempts
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            Duration::from_millis(self.retry_base_delay_ms),
            Duration::from_millis(self.retry_max_delay_ms),
        )
    }

    /// Tracking is on only when both the base URL and the secret are set
    pub fn tracking(&self) -> Option<TrackingConfig> {
        match (&self.tracking_base_url, &self.tracking_secret) {
            (Some(base_url), Some(secret)) if !base_url.is_empty() && !secret.is_empty() => {
                Some(TrackingConfig {
                    base_url: base_url.clone(),
                    secret: secret.clone(),
                })
            }
            (Some(base_url), _) if !base_url.is_empty() => {
                warn!("EMAIL_TRACKING_BASE_URL is set without EMAIL_TRACKING_SECRET, tracking disabled");
                None
            }
            _ => None,
        }
    }

    /// The dispatcher configuration
    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            primary_provider: self.primary_provider.trim().to_string(),
            fallback_providers: self
                .fallback_providers
                .iter()
                .map(|name| name.trim().to_string())
                .collect(),
            retry: self.retry_policy(),
            attempt_timeout: Duration::from_millis(self.attempt_timeout_ms),
            dry_run: self.dry_run,
            tracking: self.tracking(),
        }
    }
}

/// Delivery queue settings
#[derive(Clone, Debug, Parser)]
pub struct QueueSettings {
    /// Items dispatched per pass
    #[arg(long = "queue-batch-size", env = "EMAIL_QUEUE_BATCH_SIZE", default_value = "10")]
    pub batch_size: usize,

    /// Time between passes, in milliseconds
    #[arg(long = "queue-interval-ms", env = "EMAIL_QUEUE_INTERVAL_MS", default_value = "5000")]
    pub interval_ms: u64,

    /// Items the queue holds before refusing more
    #[arg(long = "queue-max-size", env = "EMAIL_QUEUE_MAX_SIZE", default_value = "1000")]
    pub max_size: usize,

    /// Dispatches per item before it is marked failed
    #[arg(id = "queue_max_retries", long = "queue-max-retries", env = "EMAIL_QUEUE_MAX_RETRIES", default_value = "3")]
    pub max_retries: u32,

    /// Keep delivered items until they are cleared
    #[arg(long = "queue-retain-completed", env = "EMAIL_QUEUE_RETAIN_COMPLETED", default_value = "false")]
    pub retain_completed: bool,
}

impl QueueSettings {
    /// The queue configuration; backoff between passes reuses the dispatcher's curve
    pub fn queue_config(&self, dispatch: &DispatchSettings) -> QueueConfig {
        QueueConfig {
            batch_size: self.batch_size.max(1),
            interval: Duration::from_millis(self.interval_ms),
            max_size: self.max_size,
            retry: RetryPolicy {
                max_retries: self.max_retries,
                ..dispatch.retry_policy()
            },
            retain_completed: self.retain_completed,
        }
    }
}

/// Suppression settings
#[derive(Clone, Debug, Parser)]
pub struct SuppressionSettings {
    /// Soft bounces before an address is suppressed
    #[arg(long, env = "EMAIL_SOFT_BOUNCE_LIMIT", default_value = "5")]
    pub soft_bounce_limit: u32,

    /// How bounces of undetermined type are treated: soft, hard or ignore
    #[arg(long, env = "EMAIL_UNDETERMINED_BOUNCE_POLICY", default_value = "soft")]
    pub undetermined_bounce_policy: UndeterminedBouncePolicy,
}

impl SuppressionSettings {
    /// The suppression configuration
    pub fn suppression_config(&self) -> SuppressionConfig {
        SuppressionConfig {
            soft_bounce_limit: self.soft_bounce_limit,
            undetermined_bounces: self.undetermined_bounce_policy,
        }
    }
}

/// Business identity exposed to templates
#[derive(Clone, Debug, Parser)]
pub struct BusinessSettings {
    /// Trading name
    #[arg(long, env = "BUSINESS_NAME", default_value = "")]
    pub business_name: String,

    /// Sender / reply-to address
    #[arg(long, env = "BUSINESS_EMAIL", default_value = "")]
    pub business_email: String,

    /// Contact phone number
    #[arg(long, env = "BUSINESS_PHONE", default_value = "")]
    pub business_phone: String,

    /// Public website
    #[arg(long, env = "BUSINESS_WEBSITE", default_value = "")]
    pub business_website: String,

    /// Inbox for new quote notifications
    #[arg(long, env = "BUSINESS_NOTIFICATION_EMAIL", default_value = "")]
    pub business_notification_email: String,
}

impl From<BusinessSettings> for BusinessIdentity {
    fn from(settings: BusinessSettings) -> Self {
        BusinessIdentity {
            name: settings.business_name,
            email: settings.business_email,
            phone: settings.business_phone,
            website: settings.business_website,
            notification_email: settings.business_notification_email,
        }
    }
}
