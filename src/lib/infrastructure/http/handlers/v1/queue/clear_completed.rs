//! Drop delivered items

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    domain::communication::{
        dispatcher::EmailDispatcher, notifications::QuoteNotifier, suppressions::SuppressionService,
    },
    infrastructure::http::{errors::ApiError, state::AppState},
};

/// Clear response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ClearCompletedResponse {
    /// Items removed
    #[schema(example = 12)]
    pub cleared: usize,
}

/// Remove every completed queue item
#[utoipa::path(
    delete,
    operation_id = "clear_completed",
    tag = "Queue",
    path = "/api/v1/emails/queue/completed",
    responses(
        (status = StatusCode::OK, description = "Completed items removed", body = ClearCompletedResponse),
        (status = StatusCode::UNAUTHORIZED, description = "Missing or invalid webhook token", body = ErrorResponse),
    )
)]
pub async fn handler<S, D, N>(
    State(state): State<AppState<S, D, N>>,
) -> Result<Json<ClearCompletedResponse>, ApiError>
where
    S: SuppressionService,
    D: EmailDispatcher,
    N: QuoteNotifier,
{
    let cleared = state.queue.clear_completed().await?;

    Ok(Json(ClearCompletedResponse { cleared }))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use testresult::TestResult;

    use crate::{
        domain::communication::queue::tests::MockQueueService,
        infrastructure::http::{
            handlers::v1::queue::clear_completed::ClearCompletedResponse,
            router,
            state::tests::{test_state, TestServices},
        },
    };

    #[tokio::test]
    async fn test_clear_completed() -> TestResult {
        let mut queue = MockQueueService::new();
        queue.expect_clear_completed().times(1).returning(|| Ok(12));

        let state = test_state(TestServices {
            queue: Some(queue),
            ..Default::default()
        });

        let response = TestServer::new(router(state))?
            .delete("/api/v1/emails/queue/completed")
            .await;

        assert_eq!(response.status_code(), StatusCode::OK);
        assert_eq!(response.json::<ClearCompletedResponse>().cleared, 12);

        Ok(())
    }
}
