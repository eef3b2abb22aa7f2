//! OpenAPI module

use utoipa::OpenApi;

use crate::infrastructure::http::{errors::ErrorResponse, handlers::v1::*};

#[derive(Debug, OpenApi)]
#[openapi(
    info(title = "Quote Mailer"),
    paths(
        analytics::handler,
        notifications::handler,
        providers::handler,
        queue::clear_completed::handler,
        queue::get_queue::handler,
        queue::retry_failed::handler,
        suppressions::create::handler,
        suppressions::delete::handler,
        suppressions::get::handler,
        suppressions::list::handler,
        uptime::handler,
        webhooks::handler
    ),
    components(schemas(
        analytics::AnalyticsResponse,
        providers::ProvidersResponse,
        queue::QueueItemResponse,
        queue::clear_completed::ClearCompletedResponse,
        queue::get_queue::QueueResponse,
        queue::retry_failed::RetryFailedResponse,
        suppressions::SuppressionResponse,
        suppressions::create::CreateSuppressionBody,
        suppressions::get::SuppressionStatusResponse,
        suppressions::list::SuppressionListResponse,
        uptime::UptimeResponse,
        webhooks::WebhookResponse,
        ErrorResponse,
    ))
)]
pub struct ApiDocs;
