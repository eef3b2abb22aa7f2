//! Suppression status of one address

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    domain::communication::{
        dispatcher::EmailDispatcher, email_addresses::EmailAddress, notifications::QuoteNotifier,
        suppressions::SuppressionService,
    },
    infrastructure::http::{errors::ApiError, state::AppState},
};

/// Suppression status response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SuppressionStatusResponse {
    #[schema(example = "ada@example.com")]
    pub email: String,

    /// Whether sending to the address is barred
    pub suppressed: bool,

    #[schema(example = "hard_bounce")]
    pub reason: Option<String>,

    /// Lists the address appears on
    pub lists: Vec<String>,

    /// Soft bounces counted towards the limit
    pub soft_bounces: u32,
}

/// Check whether an address is suppressed
#[utoipa::path(
    get,
    operation_id = "get_suppression",
    tag = "Suppressions",
    path = "/api/v1/suppressions/{email}",
    params(
        ("email" = String, Path, description = "The email address", example = "ada@example.com"),
    ),
    responses(
        (status = StatusCode::OK, description = "Suppression status", body = SuppressionStatusResponse),
        (status = StatusCode::UNAUTHORIZED, description = "Missing or invalid webhook token", body = ErrorResponse),
        (status = StatusCode::UNPROCESSABLE_ENTITY, description = "Invalid email address", body = ErrorResponse),
    )
)]
pub async fn handler<S, D, N>(
    State(state): State<AppState<S, D, N>>,
    Path(email): Path<String>,
) -> Result<Json<SuppressionStatusResponse>, ApiError>
where
    S: SuppressionService,
    D: EmailDispatcher,
    N: QuoteNotifier,
{
    let email = EmailAddress::new(&email)?;

    let check = state.suppressions.is_suppressed(&email).await?;
    let soft_bounces = state.suppressions.soft_bounce_count(&email).await?;

    Ok(Json(SuppressionStatusResponse {
        email: email.normalized(),
        suppressed: check.blocked,
        reason: check.reason.map(|reason| reason.to_string()),
        lists: check.lists,
        soft_bounces,
    }))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use testresult::TestResult;

    use crate::{
        domain::communication::suppressions::{
            tests::MockSuppressionService, SuppressionCheck, SuppressionReason,
        },
        infrastructure::http::{
            handlers::v1::suppressions::get::SuppressionStatusResponse,
            router,
            state::tests::{test_state, TestServices},
        },
    };

    #[tokio::test]
    async fn test_suppressed_address() -> TestResult {
        let mut suppressions = MockSuppressionService::new();

        suppressions
            .expect_is_suppressed()
            .withf(|email| email.normalized() == "gone@example.com")
            .returning(|_| {
                Ok(SuppressionCheck {
                    blocked: true,
                    reason: Some(SuppressionReason::HardBounce),
                    lists: vec!["bounces".to_string()],
                })
            });
        suppressions.expect_soft_bounce_count().returning(|_| Ok(0));

        let state = test_state(TestServices {
            suppressions: Some(suppressions),
            ..Default::default()
        });

        let response = TestServer::new(router(state))?
            .get("/api/v1/suppressions/Gone@Example.com")
            .await;

        assert_eq!(response.status_code(), StatusCode::OK);

        let json = response.json::<SuppressionStatusResponse>();
        assert!(json.suppressed);
        assert_eq!(json.email, "gone@example.com");
        assert_eq!(json.reason.as_deref(), Some("hard_bounce"));
        assert_eq!(json.lists, vec!["bounces"]);

        Ok(())
    }

    #[tokio::test]
    async fn test_soft_bounces_are_reported() -> TestResult {
        let mut suppressions = MockSuppressionService::new();

        suppressions
            .expect_is_suppressed()
            .returning(|_| Ok(SuppressionCheck::clear()));
        suppressions.expect_soft_bounce_count().returning(|_| Ok(2));

        let state = test_state(TestServices {
            suppressions: Some(suppressions),
            ..Default::default()
        });

        let response = TestServer::new(router(state))?
            .get("/api/v1/suppressions/ada@example.com")
            .await;

        let json = response.json::<SuppressionStatusResponse>();
        assert!(!json.suppressed);
        assert_eq!(json.soft_bounces, 2);

        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_address() -> TestResult {
        let state = test_state(TestServices::default());

        let response = TestServer::new(router(state))?
            .get("/api/v1/suppressions/not-an-email")
            .await;

        assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

        Ok(())
    }
}
