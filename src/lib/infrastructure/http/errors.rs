//! API error-handling module

use std::fmt;

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::ToSchema;

use crate::domain::communication::{
    dispatcher::DispatchError, email_addresses::EmailAddressError, notifications::NotificationError,
    queue::QueueError, suppressions::SuppressionError,
};

/// An error response
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// The error message
    #[schema(example = "Internal server error")]
    pub error: String,
}

/// An error raised in the API
#[derive(Debug, Deserialize, ToSchema)]
pub struct ApiError {
    /// The status code
    #[schema(example = 500, value_type = u16)]
    #[serde(with = "http_serde::status_code")]
    pub status: StatusCode,

    /// The error message
    #[schema(example = "Internal server error")]
    pub message: String,
}

impl ApiError {
    /// Create a new API error
    pub fn new(status: StatusCode, message: &str) -> Self {
        Self {
            status,
            message: message.to_string(),
        }
    }

    /// Create a new unauthorized error
    pub fn new_401(message: &str) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: message.to_string(),
        }
    }

    /// Create a new not found error
    pub fn new_404(message: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.to_string(),
        }
    }

    /// Create a new unprocessable entity error
    pub fn new_422(message: &str) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: message.to_string(),
        }
    }

    /// Create new internal server error
    pub fn new_500(message: &str) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.to_string(),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    }
}

impl From<EmailAddressError> for ApiError {
    fn from(err: EmailAddressError) -> Self {
        match err {
            EmailAddressError::EmptyEmailAddress => {
                ApiError::new_422("Please provide an email address")
            }
            EmailAddressError::InvalidEmailAddress(_) => {
                ApiError::new_422("Please provide a valid email address")
            }
        }
    }
}

impl From<SuppressionError> for ApiError {
    fn from(err: SuppressionError) -> Self {
        unknown_error(Some(err.to_string()))
    }
}

impl From<QueueError> for ApiError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::Full { capacity } => ApiError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                &format!("Email queue is full ({capacity} items)"),
            ),
            QueueError::NotFound(id) => {
                ApiError::new_404(&format!("Queue item with id \"{id}\" not found"))
            }
            QueueError::StoreError(message) => unknown_error(Some(message)),
            QueueError::UnknownError(err) => unknown_error(Some(err.to_string())),
        }
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Validation(_) | DispatchError::Template(_) => {
                ApiError::new_422(&err.to_string())
            }
            DispatchError::NoProviders | DispatchError::AllProvidersFailed { .. } => {
                ApiError::new(StatusCode::BAD_GATEWAY, &err.to_string())
            }
        }
    }
}

impl From<NotificationError> for ApiError {
    fn from(err: NotificationError) -> Self {
        match err {
            NotificationError::Dispatch(err) => err.into(),
            NotificationError::InvalidRecipient(_) | NotificationError::Template(_) => {
                unknown_error(Some(err.to_string()))
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::new(rejection.status(), &rejection.body_text())
    }
}

fn unknown_error(message: Option<String>) -> ApiError {
    if let Some(message) = message {
        error!(%message, "request failed");
    }

    ApiError::new_500("An unknown error occurred, please try again")
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;
    use axum::{body::to_bytes, http::StatusCode, response::IntoResponse};
    use testresult::TestResult;

    use crate::domain::communication::{
        dispatcher::DispatchError, email_addresses::EmailAddressError, queue::QueueError,
        suppressions::SuppressionError,
    };

    use super::ApiError;

    #[tokio::test]
    async fn test_error_response() -> TestResult {
        let error = ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "Internal server error".to_string(),
        };

        let response = error.into_response();
        let body = to_bytes(response.into_body(), usize::MAX).await?;

        assert_eq!(body, r#"{"error":"Internal server error"}"#);

        Ok(())
    }

    #[test]
    fn test_api_error_from_error() {
        let error = anyhow!("Internal server error");
        let api_error = ApiError::from(error);

        assert_eq!(api_error.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api_error.message, "Internal server error");
    }

    #[test]
    fn test_api_error_from_domain_errors() {
        let full = ApiError::from(QueueError::Full { capacity: 10 });
        assert_eq!(full.status, StatusCode::SERVICE_UNAVAILABLE);

        let invalid = ApiError::from(EmailAddressError::InvalidEmailAddress("x".to_string()));
        assert_eq!(invalid.status, StatusCode::UNPROCESSABLE_ENTITY);

        let validation = ApiError::from(DispatchError::Validation(vec!["no recipients".to_string()]));
        assert_eq!(validation.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(validation.message, "invalid email: no recipients");

        let no_providers = ApiError::from(DispatchError::NoProviders);
        assert_eq!(no_providers.status, StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_store_errors_are_not_leaked() {
        let error = ApiError::from(SuppressionError::StoreError("connection refused".to_string()));

        assert_eq!(error.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.message, "An unknown error occurred, please try again");
    }
}
