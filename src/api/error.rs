use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::db::StoreError;
use crate::mediator::{DispatchError, ValidationFailed};

/// How a failed request is reported over HTTP.
#[derive(Debug, Error)]
pub enum ApiError {
    /// 400 with the field-grouped failures.
    #[error(transparent)]
    Validation(ValidationFailed),

    /// 404 with an empty body.
    #[error("not found")]
    NotFound,

    /// 503 with an empty body. Only happens while the server shuts down.
    #[error("request cancelled")]
    Cancelled,

    /// 500. Details are logged, never returned.
    #[error(transparent)]
    Internal(anyhow::Error),
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Validation(failed) => Self::Validation(failed),
            DispatchError::Cancelled => Self::Cancelled,
            DispatchError::Handler(e)
                if matches!(e.downcast_ref::<StoreError>(), Some(StoreError::Cancelled)) =>
            {
                Self::Cancelled
            }
            DispatchError::Handler(e) => Self::Internal(e),
            other => Self::Internal(other.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(failed) => {
                let body = Json(json!({
                    "title": "Validation failed",
                    "status": StatusCode::BAD_REQUEST.as_u16(),
                    "errors": failed.errors(),
                }));
                (StatusCode::BAD_REQUEST, body).into_response()
            }
            ApiError::NotFound => StatusCode::NOT_FOUND.into_response(),
            ApiError::Cancelled => {
                tracing::info!("Request cancelled during shutdown");
                StatusCode::SERVICE_UNAVAILABLE.into_response()
            }
            ApiError::Internal(e) => {
                tracing::error!("Internal error: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mediator::ValidationFailure;

    #[test]
    fn store_cancellation_inside_a_handler_is_cancellation() {
        let err = DispatchError::Handler(StoreError::Cancelled.into());
        assert!(matches!(ApiError::from(err), ApiError::Cancelled));
    }

    #[test]
    fn other_handler_errors_are_internal() {
        let err = DispatchError::Handler(anyhow::anyhow!("disk on fire"));
        assert!(matches!(ApiError::from(err), ApiError::Internal(_)));
    }

    #[test]
    fn status_codes() {
        let failed = ValidationFailed::new([ValidationFailure::new("Text", "Text is required")]);
        assert_eq!(
            ApiError::Validation(failed).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::NotFound.into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Cancelled.into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::Internal(anyhow::anyhow!("boom"))
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
