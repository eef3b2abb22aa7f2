//! Provider delivery callbacks

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::{
    domain::communication::{
        dispatcher::EmailDispatcher, notifications::QuoteNotifier,
        suppressions::SuppressionService, webhooks::DeliveryEvent,
    },
    infrastructure::{
        email::{mailgun, sendgrid},
        http::{errors::ApiError, state::AppState},
    },
};

/// Webhook acknowledgement
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WebhookResponse {
    /// Events found in the payload
    #[schema(example = 2)]
    pub received: usize,

    /// Events handed to analytics and suppressions
    #[schema(example = 2)]
    pub processed: usize,
}

/// Events in our own format: one object or an array of them
fn parse_generic(body: &Value) -> Result<Vec<DeliveryEvent>, serde_json::Error> {
    match body {
        Value::Array(_) => serde_json::from_value(body.clone()),
        _ => Ok(vec![serde_json::from_value(body.clone())?]),
    }
}

/// Receive delivery events from a provider
#[utoipa::path(
    post,
    operation_id = "receive_webhook",
    tag = "Webhooks",
    path = "/api/v1/webhooks/{provider}",
    request_body = Object,
    params(
        ("provider" = String, Path, description = "sendgrid, mailgun or generic", example = "sendgrid"),
    ),
    responses(
        (status = StatusCode::OK, description = "Events processed", body = WebhookResponse),
        (status = StatusCode::UNAUTHORIZED, description = "Missing or invalid webhook token", body = ErrorResponse),
        (status = StatusCode::NOT_FOUND, description = "Unknown provider", body = ErrorResponse),
        (status = StatusCode::UNPROCESSABLE_ENTITY, description = "Malformed payload", body = ErrorResponse),
    )
)]
pub async fn handler<S, D, N>(
    State(state): State<AppState<S, D, N>>,
    Path(provider): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<WebhookResponse>, ApiError>
where
    S: SuppressionService,
    D: EmailDispatcher,
    N: QuoteNotifier,
{
    let Json(body) = body?;

    let events = match provider.as_str() {
        "sendgrid" => sendgrid::parse_events(&body),
        "mailgun" => mailgun::parse_events(&body),
        "generic" => parse_generic(&body),
        _ => return Err(ApiError::new_404(&format!("Unknown provider \"{provider}\""))),
    }
    .map_err(|err| {
        warn!(provider = %provider, error = %err, "malformed webhook payload");

        ApiError::new_422(&format!("Malformed {provider} payload: {err}"))
    })?;

    info!(provider = %provider, events = events.len(), "webhook received");

    let processed = state.events.handle_all(&events).await;

    Ok(Json(WebhookResponse {
        received: events.len(),
        processed,
    }))
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderName, HeaderValue, StatusCode};
    use axum_test::TestServer;
    use serde_json::json;
    use testresult::TestResult;

    use crate::{
        domain::communication::{
            analytics::EventType,
            suppressions::{
                tests::MockSuppressionService, BounceOutcome, SuppressionEntry, SuppressionReason,
            },
        },
        infrastructure::http::{
            errors::ErrorResponse,
            handlers::{v1::webhooks::WebhookResponse, WEBHOOK_TOKEN_HEADER},
            router,
            state::tests::{test_state, TestServices},
        },
    };

    fn token_header() -> (HeaderName, HeaderValue) {
        (
            HeaderName::from_static(WEBHOOK_TOKEN_HEADER),
            HeaderValue::from_static("secret"),
        )
    }

    #[tokio::test]
    async fn test_sendgrid_bounce_suppresses() -> TestResult {
        let mut suppressions = MockSuppressionService::new();

        suppressions
            .expect_process_bounce()
            .withf(|event| event.email.normalized() == "gone@example.com")
            .times(1)
            .returning(|event| {
                Ok(BounceOutcome::Suppressed(SuppressionEntry::new(
                    &event.email,
                    SuppressionReason::HardBounce,
                    json!({}),
                )))
            });

        let state = test_state(TestServices {
            suppressions: Some(suppressions),
            ..Default::default()
        })
        .with_webhook_token(Some("secret".to_string()));
        let analytics = state.analytics.clone();

        let (name, value) = token_header();
        let response = TestServer::new(router(state))?
            .post("/api/v1/webhooks/sendgrid")
            .add_header(name, value)
            .json(&json!([
                {
                    "email": "gone@example.com",
                    "event": "bounce",
                    "type": "bounce",
                    "reason": "550 5.1.1 user unknown",
                    "sg_message_id": "sg-1.filter",
                    "timestamp": 1700000000
                },
                {
                    "email": "ok@example.com",
                    "event": "delivered",
                    "sg_message_id": "sg-2.filter",
                    "timestamp": 1700000000
                }
            ]))
            .await;

        assert_eq!(response.status_code(), StatusCode::OK);

        let json = response.json::<WebhookResponse>();
        assert_eq!(json.received, 2);
        assert_eq!(json.processed, 2);

        let delivered = analytics.events_for("sg-2").await;
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].event_type, EventType::Delivered);

        Ok(())
    }

    #[tokio::test]
    async fn test_generic_single_event() -> TestResult {
        let state = test_state(TestServices::default());
        let analytics = state.analytics.clone();

        let response = TestServer::new(router(state))?
            .post("/api/v1/webhooks/generic")
            .json(&json!({
                "message_id": "m-1",
                "email": "a@example.com",
                "event": "opened"
            }))
            .await;

        assert_eq!(response.status_code(), StatusCode::OK);
        assert_eq!(response.json::<WebhookResponse>().processed, 1);
        assert_eq!(analytics.events_for("m-1").await.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_wrong_token_is_rejected() -> TestResult {
        let state = test_state(TestServices::default()).with_webhook_token(Some("secret".to_string()));

        let response = TestServer::new(router(state))?
            .post("/api/v1/webhooks/generic")
            .add_header(
                HeaderName::from_static(WEBHOOK_TOKEN_HEADER),
                HeaderValue::from_static("guess"),
            )
            .json(&json!([]))
            .await;

        assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.json::<ErrorResponse>().error,
            "Missing or invalid webhook token"
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_provider() -> TestResult {
        let state = test_state(TestServices::default());

        let response = TestServer::new(router(state))?
            .post("/api/v1/webhooks/postmark")
            .json(&json!([]))
            .await;

        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

        Ok(())
    }

    #[tokio::test]
    async fn test_malformed_payload() -> TestResult {
        let state = test_state(TestServices::default());

        let response = TestServer::new(router(state))?
            .post("/api/v1/webhooks/generic")
            .json(&json!({ "event": "opened" }))
            .await;

        assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

        Ok(())
    }
}
