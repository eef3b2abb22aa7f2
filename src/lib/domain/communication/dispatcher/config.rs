//! Dispatcher configuration

use std::time::Duration;

use crate::domain::communication::{analytics::TrackingConfig, retry::RetryPolicy};

/// Dispatcher settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Provider tried first
    pub primary_provider: String,

    /// Providers tried after the primary, in order
    pub fallback_providers: Vec<String>,

    /// Per-provider retry ceiling and backoff
    pub retry: RetryPolicy,

    /// Upper bound for a single provider call
    pub attempt_timeout: Duration,

    /// Render and validate, but never call a provider
    pub dry_run: bool,

    /// Open and click tracking, when enabled
    pub tracking: Option<TrackingConfig>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            primary_provider: "smtp".to_string(),
            fallback_providers: Vec::new(),
            retry: RetryPolicy::default(),
            attempt_timeout: Duration::from_secs(30),
            dry_run: false,
            tracking: None,
        }
    }
}

impl DispatcherConfig {
    /// Primary followed by fallbacks, without duplicates
    pub fn provider_order(&self) -> Vec<&str> {
        let mut order: Vec<&str> = Vec::new();

        for name in std::iter::once(&self.primary_provider).chain(&self.fallback_providers) {
            let name = name.trim();

            if !name.is_empty() && !order.contains(&name) {
                order.push(name);
            }
        }

        order
    }
}
