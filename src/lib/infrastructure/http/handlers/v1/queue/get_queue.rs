//! Queue status and items

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    domain::communication::{
        dispatcher::EmailDispatcher,
        mailer::Priority,
        notifications::QuoteNotifier,
        queue::{QueueFilter, QueueStatus, QueueSummary},
        suppressions::SuppressionService,
    },
    infrastructure::http::{errors::ApiError, state::AppState},
};

use super::QueueItemResponse;

/// Item filter
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct QueueQuery {
    /// queued, processing, retry, completed or failed
    pub status: Option<String>,

    /// critical, high, normal or low
    pub priority: Option<String>,
}

impl TryFrom<QueueQuery> for QueueFilter {
    type Error = ApiError;

    fn try_from(query: QueueQuery) -> Result<Self, Self::Error> {
        let status = query
            .status
            .map(|status| status.parse::<QueueStatus>())
            .transpose()
            .map_err(|err| ApiError::new_422(&err))?;

        let priority = query
            .priority
            .map(|priority| priority.parse::<Priority>())
            .transpose()
            .map_err(|err| ApiError::new_422(&err))?;

        Ok(QueueFilter { status, priority })
    }
}

/// Queue status response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct QueueResponse {
    /// Counts by status
    #[schema(value_type = Object)]
    pub summary: QueueSummary,

    /// Matching items in processing order
    pub items: Vec<QueueItemResponse>,
}

/// Get the delivery queue
#[utoipa::path(
    get,
    operation_id = "get_queue",
    tag = "Queue",
    path = "/api/v1/emails/queue",
    params(QueueQuery),
    responses(
        (status = StatusCode::OK, description = "Queue status", body = QueueResponse),
        (status = StatusCode::UNAUTHORIZED, description = "Missing or invalid webhook token", body = ErrorResponse),
        (status = StatusCode::UNPROCESSABLE_ENTITY, description = "Invalid filter", body = ErrorResponse),
    )
)]
pub async fn handler<S, D, N>(
    State(state): State<AppState<S, D, N>>,
    Query(query): Query<QueueQuery>,
) -> Result<Json<QueueResponse>, ApiError>
where
    S: SuppressionService,
    D: EmailDispatcher,
    N: QuoteNotifier,
{
    let filter: QueueFilter = query.try_into()?;

    let summary = state.queue.status().await?;
    let items = state
        .queue
        .items(&filter)
        .await?
        .into_iter()
        .map(QueueItemResponse::from)
        .collect();

    Ok(Json(QueueResponse { summary, items }))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use testresult::TestResult;

    use crate::{
        domain::communication::{
            email_addresses::EmailAddress,
            mailer::{Message, Priority},
            queue::{tests::MockQueueService, QueueItem, QueueStatus, QueueSummary},
        },
        infrastructure::http::{
            handlers::v1::queue::get_queue::QueueResponse,
            router,
            state::tests::{test_state, TestServices},
        },
    };

    #[tokio::test]
    async fn test_get_queue_filters_by_status() -> TestResult {
        let mut queue = MockQueueService::new();

        queue.expect_status().returning(|| {
            Ok(QueueSummary {
                total: 2,
                retry: 1,
                queued: 1,
                ..Default::default()
            })
        });

        queue
            .expect_items()
            .withf(|filter| filter.status == Some(QueueStatus::Retry) && filter.priority.is_none())
            .returning(|_| {
                let message = Message::builder()
                    .to(EmailAddress::new_unchecked("ada@example.com"))
                    .subject("Your quote")
                    .build();

                let mut item = QueueItem::new(message, Priority::High, 0);
                item.status = QueueStatus::Retry;
                item.attempts = 1;

                Ok(vec![item])
            });

        let state = test_state(TestServices {
            queue: Some(queue),
            ..Default::default()
        });

        let response = TestServer::new(router(state))?
            .get("/api/v1/emails/queue")
            .add_query_param("status", "retry")
            .await;

        assert_eq!(response.status_code(), StatusCode::OK);

        let json = response.json::<QueueResponse>();
        assert_eq!(json.summary.total, 2);
        assert_eq!(json.items.len(), 1);
        assert_eq!(json.items[0].status, "retry");
        assert_eq!(json.items[0].priority, "high");
        assert_eq!(json.items[0].recipients, vec!["ada@example.com"]);

        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_filter() -> TestResult {
        let state = test_state(TestServices::default());

        let response = TestServer::new(router(state))?
            .get("/api/v1/emails/queue")
            .add_query_param("priority", "urgent")
            .await;

        assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

        Ok(())
    }
}
