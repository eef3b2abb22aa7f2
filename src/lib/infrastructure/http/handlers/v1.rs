use axum::{
    middleware,
    routing::{delete, get, post},
    Json, Router,
};
use utoipa::OpenApi;

use crate::{
    domain::communication::{
        dispatcher::EmailDispatcher, notifications::QuoteNotifier, suppressions::SuppressionService,
    },
    infrastructure::http::{handlers::require_token, open_api::ApiDocs, state::AppState},
};

pub mod analytics;
pub mod notifications;
pub mod providers;
pub mod queue;
pub mod suppressions;
pub mod uptime;
pub mod webhooks;

pub fn router<S, D, N>(state: AppState<S, D, N>) -> Router<AppState<S, D, N>>
where
    S: SuppressionService,
    D: EmailDispatcher,
    N: QuoteNotifier,
{
    let protected = Router::new()
        .route("/webhooks/:provider", post(webhooks::handler::<S, D, N>))
        .route("/emails/queue", get(queue::get_queue::handler::<S, D, N>))
        .route(
            "/emails/queue/retry",
            post(queue::retry_failed::handler::<S, D, N>),
        )
        .route(
            "/emails/queue/completed",
            delete(queue::clear_completed::handler::<S, D, N>),
        )
        .route("/emails/analytics", get(analytics::handler::<S, D, N>))
        .route("/emails/providers", get(providers::handler::<S, D, N>))
        .route(
            "/suppressions",
            get(suppressions::list::handler::<S, D, N>)
                .post(suppressions::create::handler::<S, D, N>),
        )
        .route(
            "/suppressions/:email",
            get(suppressions::get::handler::<S, D, N>)
                .delete(suppressions::delete::handler::<S, D, N>),
        )
        .route(
            "/quotes/:quote_id/notifications",
            post(notifications::handler::<S, D, N>),
        )
        .route_layer(middleware::from_fn_with_state(
            state,
            require_token::<S, D, N>,
        ));

    Router::new()
        .route("/openapi.json", get(Json(ApiDocs::openapi())))
        .route("/uptime", get(uptime::handler::<S, D, N>))
        .merge(protected)
}
