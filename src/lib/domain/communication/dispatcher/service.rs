//! Dispatcher service

use std::{sync::Arc, time::Instant};

use async_trait::async_trait;
use chrono::Utc;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[cfg(test)]
use mockall::mock;

use crate::domain::communication::{
    analytics::{add_click_tracking, add_open_tracking, AnalyticsEvent, AnalyticsRecorder, EventMetadata, EventType},
    classifier::Severity,
    mailer::{Mailer, Message, ProviderError},
    retry::RetryDecision,
    suppressions::SuppressionService,
    templates::TemplateRenderer,
};

use super::{
    AttemptError, DeliveryAttempt, DeliveryResult, DispatchError, DispatcherConfig,
    ProviderHealth, TemplatedEmail,
};

/// Email dispatcher
#[async_trait]
pub trait EmailDispatcher: Send + Sync + 'static {
    /// Sends a message, trying providers in order.
    ///
    /// # Arguments
    /// * `message` - The [`Message`] to deliver. It is never modified.
    ///
    /// # Returns
    /// - [`Ok`] with a [`DeliveryResult`] when a provider accepted the message,
    ///   the dry run rehearsed it, or a suppressed recipient short-circuited it.
    /// - [`Err`] with a [`DispatchError`] when the message is invalid or every
    ///   provider and attempt failed.
    async fn send(&self, message: &Message) -> Result<DeliveryResult, DispatchError>;

    /// Renders a template and sends the result.
    async fn send_template(&self, request: &TemplatedEmail) -> Result<DeliveryResult, DispatchError>;

    /// Configuration and connectivity of every registered provider
    async fn provider_health(&self) -> Vec<ProviderHealth>;
}

#[cfg(test)]
mock! {
    pub EmailDispatcher {}

    #[async_trait]
    impl EmailDispatcher for EmailDispatcher {
        async fn send(&self, message: &Message) -> Result<DeliveryResult, DispatchError>;
        async fn send_template(&self, request: &TemplatedEmail) -> Result<DeliveryResult, DispatchError>;
        async fn provider_health(&self) -> Vec<ProviderHealth>;
    }
}

/// Email dispatcher implementation
pub struct EmailDispatcherImpl<S>
where
    S: SuppressionService,
{
    config: DispatcherConfig,
    registered: Vec<Arc<dyn Mailer>>,
    providers: Vec<Arc<dyn Mailer>>,
    suppressions: Arc<S>,
    templates: Arc<TemplateRenderer>,
    analytics: Arc<AnalyticsRecorder>,
}

impl<S> std::fmt::Debug for EmailDispatcherImpl<S>
where
    S: SuppressionService,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailDispatcherImpl")
            .field("config", &self.config)
            .field(
                "providers",
                &self.providers.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl<S> EmailDispatcherImpl<S>
where
    S: SuppressionService,
{
    /// Creates a new dispatcher.
    ///
    /// The trial order is the configured primary followed by the fallbacks;
    /// names with no registered provider, or whose provider reports an
    /// invalid configuration, are skipped.
    pub fn new(
        config: DispatcherConfig,
        registered: Vec<Arc<dyn Mailer>>,
        suppressions: Arc<S>,
        templates: Arc<TemplateRenderer>,
        analytics: Arc<AnalyticsRecorder>,
    ) -> Self {
        let mut providers = Vec::new();

        for name in config.provider_order() {
            let Some(provider) = registered.iter().find(|p| p.name() == name) else {
                warn!(provider = name, "provider is not registered, skipping");
                continue;
            };

            let validation = provider.validate_config();

            if !validation.is_valid {
                warn!(provider = name, errors = ?validation.errors, "provider is not configured, skipping");
                continue;
            }

            providers.push(provider.clone());
        }

        if providers.is_empty() && !config.dry_run {
            error!("no email providers are configured");
        }

        Self {
            config,
            registered,
            providers,
            suppressions,
            templates,
            analytics,
        }
    }

    /// Names of the providers in trial order
    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    async fn check_suppressions(&self, message: &Message) -> Option<DeliveryResult> {
        let started = Instant::now();

        for recipient in message.recipients() {
            match self.suppressions.is_suppressed(recipient).await {
                Ok(check) if check.blocked => {
                    info!(
                        request_id = %message.id,
                        recipient = %recipient,
                        reason = ?check.reason,
                        "recipient is suppressed, not sending"
                    );

                    return Some(DeliveryResult::suppressed(check, started.elapsed()));
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(
                        request_id = %message.id,
                        recipient = %recipient,
                        error = %err,
                        "suppression lookup failed, continuing"
                    );
                }
            }
        }

        None
    }

    fn with_tracking(&self, message: &Message) -> Option<Message> {
        let tracking = self.config.tracking.as_ref()?;

        if message.html_body.is_empty() {
            return None;
        }

        let tracking_id = message.id.to_string();
        let html = add_click_tracking(&message.html_body, &tracking_id, tracking);
        let html = add_open_tracking(&html, &tracking_id, tracking);

        Some(Message {
            html_body: html,
            ..message.clone()
        })
    }

    async fn attempt(&self, provider: &dyn Mailer, message: &Message) -> Result<String, ProviderError> {
        match timeout(self.config.attempt_timeout, provider.send_email(message)).await {
            Ok(result) => result.map(|sent| sent.message_id),
            Err(_) => Err(ProviderError::timeout(
                provider.name(),
                self.config.attempt_timeout,
            )),
        }
    }

    async fn deliver(&self, message: &Message, started: Instant) -> Result<DeliveryResult, DispatchError> {
        let mut attempt_log = Vec::new();
        let mut last_error = None;

        for provider in &self.providers {
            let name = provider.name();

            for attempt in 1..=self.config.retry.max_retries.max(1) {
                let attempt_started = Instant::now();
                let started_at = Utc::now();

                match self.attempt(provider.as_ref(), message).await {
                    Ok(message_id) => {
                        attempt_log.push(DeliveryAttempt {
                            provider: name.to_string(),
                            attempt,
                            started_at,
                            success: true,
                            error: None,
                            duration: attempt_started.elapsed(),
                        });

                        info!(
                            request_id = %message.id,
                            correlation_id = ?message.correlation_id,
                            email_type = %message.email_type,
                            provider = name,
                            attempt,
                            message_id = %message_id,
                            "email sent"
                        );

                        self.analytics
                            .record(
                                AnalyticsEvent::new(&message_id, EventType::Sent)
                                    .with_email_type(&message.email_type)
                                    .with_metadata(EventMetadata::Sent {
                                        provider: name.to_string(),
                                        request_id: message.id.to_string(),
                                    }),
                            )
                            .await;

                        return Ok(DeliveryResult::sent(
                            name,
                            message_id,
                            attempt_log,
                            started.elapsed(),
                        ));
                    }
                    Err(err) => {
                        let decision = self.config.retry.decide(&err, name, attempt);

                        log_failure(message, &err, &decision, attempt);

                        attempt_log.push(DeliveryAttempt {
                            provider: name.to_string(),
                            attempt,
                            started_at,
                            success: false,
                            error: Some(AttemptError::new(&err, decision.classification)),
                            duration: attempt_started.elapsed(),
                        });

                        last_error = Some(err);

                        if !decision.retry {
                            break;
                        }

                        sleep(decision.delay).await;
                    }
                }
            }
        }

        let Some(last_error) = last_error else {
            return Err(DispatchError::NoProviders);
        };

        error!(
            request_id = %message.id,
            correlation_id = ?message.correlation_id,
            email_type = %message.email_type,
            attempts = attempt_log.len(),
            error = %last_error,
            "email delivery failed on every provider"
        );

        Err(DispatchError::AllProvidersFailed {
            attempts: attempt_log,
            last_error,
        })
    }
}

fn log_failure(message: &Message, err: &ProviderError, decision: &RetryDecision, attempt: u32) {
    let category = decision.classification.category;

    match decision.classification.severity {
        Severity::Critical | Severity::Error => error!(
            request_id = %message.id,
            provider = %err.provider,
            attempt,
            %category,
            retry = decision.retry,
            error = %err,
            "provider attempt failed"
        ),
        Severity::Warning => warn!(
            request_id = %message.id,
            provider = %err.provider,
            attempt,
            %category,
            retry = decision.retry,
            delay_ms = decision.delay.as_millis() as u64,
            error = %err,
            "provider attempt failed"
        ),
        Severity::Info => info!(
            request_id = %message.id,
            provider = %err.provider,
            attempt,
            %category,
            error = %err,
            "provider rejected message"
        ),
    }
}

#[async_trait]
impl<S> EmailDispatcher for EmailDispatcherImpl<S>
where
    S: SuppressionService,
{
    async fn send(&self, message: &Message) -> Result<DeliveryResult, DispatchError> {
        let started = Instant::now();

        let problems = message.problems();
        if !problems.is_empty() {
            info!(request_id = %message.id, ?problems, "rejecting invalid email");

            return Err(DispatchError::Validation(problems));
        }

        if let Some(suppressed) = self.check_suppressions(message).await {
            return Ok(suppressed);
        }

        let tracked = self.with_tracking(message);
        let message = tracked.as_ref().unwrap_or(message);

        if self.config.dry_run {
            let message_id = format!("dry-run-{}", Uuid::now_v7());

            info!(
                request_id = %message.id,
                email_type = %message.email_type,
                subject = %message.subject,
                recipients = message.recipients().count(),
                message_id = %message_id,
                "dry run, email not sent"
            );

            return Ok(DeliveryResult::dry_run(message_id, started.elapsed()));
        }

        if self.providers.is_empty() {
            return Err(DispatchError::NoProviders);
        }

        debug!(request_id = %message.id, providers = ?self.provider_names(), "dispatching email");

        self.deliver(message, started).await
    }

    async fn send_template(&self, request: &TemplatedEmail) -> Result<DeliveryResult, DispatchError> {
        let rendered = self.templates.render(&request.template, &request.context)?;

        self.send(&request.clone().into_message(rendered)).await
    }

    async fn provider_health(&self) -> Vec<ProviderHealth> {
        let mut health = Vec::with_capacity(self.registered.len());

        for provider in &self.registered {
            let position = self.providers.iter().position(|p| p.name() == provider.name());

            health.push(ProviderHealth {
                provider: provider.name().to_string(),
                position,
                config: provider.validate_config(),
                connection: provider.test_connection().await,
            });
        }

        health
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use testresult::TestResult;

    use crate::domain::communication::{
        classifier::ErrorCategory,
        dispatcher::DeliveryStatus,
        email_addresses::EmailAddress,
        mailer::{
            tests::{mock_provider, MockMailer},
            ConfigValidation, SentEmail,
        },
        retry::RetryPolicy,
        suppressions::{
            tests::MockSuppressionService, BounceEvent, BounceType, InMemorySuppressionRepository,
            SuppressionCheck, SuppressionConfig, SuppressionError, SuppressionReason,
            SuppressionServiceImpl,
        },
        templates::BusinessIdentity,
    };

    use super::*;

    fn config() -> DispatcherConfig {
        DispatcherConfig {
            primary_provider: "primary".to_string(),
            fallback_providers: vec!["fallback".to_string()],
            retry: RetryPolicy::new(3, Duration::ZERO, Duration::ZERO),
            attempt_timeout: Duration::from_secs(5),
            dry_run: false,
            tracking: None,
        }
    }

    fn message(to: &str) -> Message {
        Message::builder()
            .to(EmailAddress::new_unchecked(to))
            .subject("Your quote")
            .html("<p>Hello</p>")
            .plain("Hello")
            .correlation_id("Q-1")
            .email_type("customer_confirmation")
            .build()
    }

    fn renderer() -> Arc<TemplateRenderer> {
        Arc::new(TemplateRenderer::new(BusinessIdentity::default()).expect("builtin templates"))
    }

    fn suppressions() -> Arc<SuppressionServiceImpl> {
        Arc::new(SuppressionServiceImpl::new(
            SuppressionConfig::default(),
            Arc::new(InMemorySuppressionRepository::new()),
        ))
    }

    fn dispatcher<S: SuppressionService>(
        config: DispatcherConfig,
        providers: Vec<MockMailer>,
        suppressions: Arc<S>,
    ) -> EmailDispatcherImpl<S> {
        EmailDispatcherImpl::new(
            config,
            providers
                .into_iter()
                .map(|p| Arc::new(p) as Arc<dyn Mailer>)
                .collect(),
            suppressions,
            renderer(),
            Arc::new(AnalyticsRecorder::new()),
        )
    }

    fn unavailable(provider: &str) -> ProviderError {
        ProviderError::response(provider, Some(503), None, "service unavailable")
    }

    #[tokio::test]
    async fn test_primary_success_on_first_attempt() -> TestResult {
        let mut primary = mock_provider("primary");
        primary
            .expect_send_email()
            .times(1)
            .returning(|_| Ok(SentEmail::new("msg-1")));

        let mut fallback = mock_provider("fallback");
        fallback.expect_send_email().times(0);

        let dispatcher = dispatcher(config(), vec![primary, fallback], suppressions());

        let result = dispatcher.send(&message("a@example.com")).await?;

        assert_eq!(result.status, DeliveryStatus::Sent);
        assert_eq!(result.provider.as_deref(), Some("primary"));
        assert_eq!(result.message_id.as_deref(), Some("msg-1"));
        assert_eq!(result.attempts, 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_falls_back_after_exhausting_primary_retries() -> TestResult {
        let mut primary = mock_provider("primary");
        primary
            .expect_send_email()
            .times(3)
            .returning(|_| Err(unavailable("primary")));

        let mut fallback = mock_provider("fallback");
        fallback
            .expect_send_email()
            .times(1)
            .returning(|_| Ok(SentEmail::new("fallback-1")));

        let dispatcher = dispatcher(config(), vec![primary, fallback], suppressions());

        let result = dispatcher.send(&message("a@example.com")).await?;

        assert!(result.success);
        assert_eq!(result.provider.as_deref(), Some("fallback"));
        assert_eq!(result.attempts, 4);
        assert_eq!(
            result
                .attempt_log
                .iter()
                .map(|a| (a.provider.as_str(), a.attempt, a.success))
                .collect::<Vec<_>>(),
            vec![
                ("primary", 1, false),
                ("primary", 2, false),
                ("primary", 3, false),
                ("fallback", 1, true),
            ]
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_non_retryable_error_skips_remaining_budget() -> TestResult {
        let mut primary = mock_provider("primary");
        primary.expect_send_email().times(1).returning(|_| {
            Err(ProviderError::response("primary", Some(401), None, "bad key"))
        });

        let mut fallback = mock_provider("fallback");
        fallback
            .expect_send_email()
            .times(1)
            .returning(|_| Ok(SentEmail::new("fallback-1")));

        let dispatcher = dispatcher(config(), vec![primary, fallback], suppressions());

        let result = dispatcher.send(&message("a@example.com")).await?;

        assert_eq!(result.attempts, 2);
        assert_eq!(
            result.attempt_log[0].error.as_ref().map(|e| e.category),
            Some(ErrorCategory::Authentication)
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_terminal_failure_when_every_provider_fails() {
        let mut primary = mock_provider("primary");
        primary
            .expect_send_email()
            .times(3)
            .returning(|_| Err(unavailable("primary")));

        let mut fallback = mock_provider("fallback");
        fallback
            .expect_send_email()
            .times(3)
            .returning(|_| Err(unavailable("fallback")));

        let dispatcher = dispatcher(config(), vec![primary, fallback], suppressions());

        let result = dispatcher.send(&message("a@example.com")).await;

        match result {
            Err(DispatchError::AllProvidersFailed { attempts, last_error }) => {
                assert_eq!(attempts.len(), 6);
                assert_eq!(last_error.provider, "fallback");
            }
            other => panic!("expected terminal failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_timeout_is_retried() -> TestResult {
        let mut config = config();
        config.attempt_timeout = Duration::from_millis(10);
        config.fallback_providers.clear();

        let calls = Arc::new(std::sync::atomic::AtomicU32::new(0));
        let seen = calls.clone();

        struct SlowThenFast(Arc<std::sync::atomic::AtomicU32>);

        #[async_trait]
        impl Mailer for SlowThenFast {
            fn name(&self) -> &'static str {
                "primary"
            }

            async fn send_email(&self, _message: &Message) -> Result<SentEmail, ProviderError> {
                if self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst) == 0 {
                    sleep(Duration::from_secs(5)).await;
                }

                Ok(SentEmail::new("late"))
            }

            fn validate_config(&self) -> ConfigValidation {
                ConfigValidation::valid()
            }

            async fn test_connection(&self) -> crate::domain::communication::mailer::ConnectionTest {
                Ok(()).into()
            }
        }

        let dispatcher = EmailDispatcherImpl::new(
            config,
            vec![Arc::new(SlowThenFast(calls)) as Arc<dyn Mailer>],
            suppressions(),
            renderer(),
            Arc::new(AnalyticsRecorder::new()),
        );

        let result = dispatcher.send(&message("a@example.com")).await?;

        assert_eq!(result.attempts, 2);
        assert_eq!(
            result.attempt_log[0].error.as_ref().map(|e| e.category),
            Some(ErrorCategory::TemporaryFailure)
        );
        assert_eq!(seen.load(std::sync::atomic::Ordering::SeqCst), 2);

        Ok(())
    }

    #[tokio::test]
    async fn test_suppressed_recipient_never_reaches_provider() -> TestResult {
        let suppressions = suppressions();

        for _ in 0..5 {
            suppressions
                .process_bounce(&BounceEvent {
                    email: EmailAddress::new("b@example.com")?,
                    bounce_type: BounceType::Soft,
                    reason: None,
                    timestamp: Utc::now(),
                    payload: json!({}),
                })
                .await?;
        }

        let mut primary = mock_provider("primary");
        primary.expect_send_email().times(0);

        let mut fallback = mock_provider("fallback");
        fallback.expect_send_email().times(0);

        let dispatcher = dispatcher(config(), vec![primary, fallback], suppressions);

        let result = dispatcher.send(&message("B@example.com")).await?;

        assert_eq!(result.status, DeliveryStatus::Suppressed);
        assert!(!result.success);
        assert_eq!(result.attempts, 0);
        assert_eq!(
            result.suppression.and_then(|s| s.reason),
            Some(SuppressionReason::SoftBounceLimit)
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_suppression_lookup_failure_does_not_block() -> TestResult {
        let mut suppressions = MockSuppressionService::new();
        suppressions
            .expect_is_suppressed()
            .times(1)
            .returning(|_| Err(SuppressionError::StoreError("down".to_string())));

        let mut primary = mock_provider("primary");
        primary
            .expect_send_email()
            .times(1)
            .returning(|_| Ok(SentEmail::new("msg")));

        let dispatcher = dispatcher(config(), vec![primary], Arc::new(suppressions));

        let result = dispatcher.send(&message("a@example.com")).await?;

        assert_eq!(result.status, DeliveryStatus::Sent);

        Ok(())
    }

    #[tokio::test]
    async fn test_cc_recipients_are_checked() -> TestResult {
        let mut suppressions = MockSuppressionService::new();
        suppressions.expect_is_suppressed().returning(|email| {
            Ok(if email.as_str() == "cc@example.com" {
                SuppressionCheck {
                    blocked: true,
                    reason: Some(SuppressionReason::SpamComplaint),
                    lists: vec!["complaints".to_string()],
                }
            } else {
                SuppressionCheck::clear()
            })
        });

        let mut primary = mock_provider("primary");
        primary.expect_send_email().times(0);

        let dispatcher = dispatcher(config(), vec![primary], Arc::new(suppressions));

        let message = Message::builder()
            .to(EmailAddress::new("a@example.com")?)
            .cc(EmailAddress::new("cc@example.com")?)
            .subject("Hi")
            .plain("Hi")
            .build();

        let result = dispatcher.send(&message).await?;

        assert_eq!(result.status, DeliveryStatus::Suppressed);

        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_message_is_rejected() {
        let mut primary = mock_provider("primary");
        primary.expect_send_email().times(0);

        let dispatcher = dispatcher(config(), vec![primary], suppressions());

        let message = Message::builder().subject("No recipient").plain("Body").build();

        let result = dispatcher.send(&message).await;

        assert!(matches!(result, Err(DispatchError::Validation(_))));
    }

    #[tokio::test]
    async fn test_dry_run_renders_without_calling_providers() -> TestResult {
        let mut config = config();
        config.dry_run = true;

        let mut primary = mock_provider("primary");
        primary.expect_send_email().times(0);

        let dispatcher = dispatcher(config, vec![primary], suppressions());

        let request = TemplatedEmail::new(
            EmailAddress::new("a@example.com")?,
            TemplateRenderer::CUSTOMER_CONFIRMATION,
            json!({ "quote_id": "Q-9", "customer": { "name": "Ada" } }),
        );

        let result = dispatcher.send_template(&request).await?;

        assert_eq!(result.status, DeliveryStatus::DryRun);
        assert!(result.success);
        assert_eq!(result.provider.as_deref(), Some("dry-run"));
        assert_eq!(result.attempts, 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_unconfigured_providers_are_skipped() -> TestResult {
        let mut primary = MockMailer::new();
        primary.expect_name().return_const("primary");
        primary
            .expect_validate_config()
            .returning(|| ConfigValidation::from_errors(vec!["missing api key".to_string()]));
        primary.expect_send_email().times(0);

        let mut fallback = mock_provider("fallback");
        fallback
            .expect_send_email()
            .times(1)
            .returning(|_| Ok(SentEmail::new("fb")));

        let dispatcher = dispatcher(config(), vec![primary, fallback], suppressions());

        assert_eq!(dispatcher.provider_names(), vec!["fallback"]);

        let result = dispatcher.send(&message("a@example.com")).await?;
        assert_eq!(result.attempts, 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_no_providers_is_an_error() {
        let dispatcher = dispatcher(config(), Vec::new(), suppressions());

        let result = dispatcher.send(&message("a@example.com")).await;

        assert!(matches!(result, Err(DispatchError::NoProviders)));
    }

    #[tokio::test]
    async fn test_success_records_sent_event() -> TestResult {
        let mut primary = mock_provider("primary");
        primary
            .expect_send_email()
            .returning(|_| Ok(SentEmail::new("tracked-1")));

        let analytics = Arc::new(AnalyticsRecorder::new());
        let dispatcher = EmailDispatcherImpl::new(
            config(),
            vec![Arc::new(primary) as Arc<dyn Mailer>],
            suppressions(),
            renderer(),
            analytics.clone(),
        );

        dispatcher.send(&message("a@example.com")).await?;

        let events = analytics.events_for("tracked-1").await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::Sent);
        assert_eq!(events[0].email_type.as_deref(), Some("customer_confirmation"));

        Ok(())
    }

    #[tokio::test]
    async fn test_tracking_is_applied_to_a_copy() -> TestResult {
        let mut config = config();
        config.tracking = Some(crate::domain::communication::analytics::TrackingConfig {
            base_url: "https://t.example.com".to_string(),
            secret: "s".to_string(),
        });

        let mut primary = mock_provider("primary");
        primary
            .expect_send_email()
            .withf(|message| message.html_body.contains("https://t.example.com/t/open/"))
            .times(1)
            .returning(|_| Ok(SentEmail::new("m")));

        let dispatcher = dispatcher(config, vec![primary], suppressions());
        let original = message("a@example.com");

        dispatcher.send(&original).await?;

        assert_eq!(original.html_body, "<p>Hello</p>");

        Ok(())
    }
}
