//! API handler modules

use std::any::Any;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderMap, Response, StatusCode},
    middleware::Next,
    response::IntoResponse,
    Json,
};
use constant_time_eq::constant_time_eq;
use tracing::warn;

use crate::domain::communication::{
    dispatcher::EmailDispatcher, notifications::QuoteNotifier, suppressions::SuppressionService,
};

use super::{
    errors::{ApiError, ErrorResponse},
    state::AppState,
};

pub mod tracking;
pub mod v1;

/// Header carrying the shared webhook / admin secret
pub const WEBHOOK_TOKEN_HEADER: &str = "x-webhook-token";

/// Catch panics and return a 500 error
pub fn panic_handler(err: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let details = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "Internal server error".to_string()
    };

    let error = ErrorResponse { error: details };

    let response = Json(error).into_response();

    (StatusCode::INTERNAL_SERVER_ERROR, response).into_response()
}

/// Rejects requests without the configured `X-Webhook-Token`.
///
/// Routes are open when no token is configured.
pub async fn require_token<S, D, N>(
    State(state): State<AppState<S, D, N>>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<axum::response::Response, ApiError>
where
    S: SuppressionService,
    D: EmailDispatcher,
    N: QuoteNotifier,
{
    if let Some(expected) = &state.webhook_token {
        let provided = headers
            .get(WEBHOOK_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();

        if !constant_time_eq(provided.as_bytes(), expected.as_bytes()) {
            warn!(uri = %request.uri(), "rejected request with a missing or wrong webhook token");

            return Err(ApiError::new_401("Missing or invalid webhook token"));
        }
    }

    Ok(next.run(request).await)
}
