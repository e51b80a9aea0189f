//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::OrderError;
use event_store::EventStoreError;
use orders::ServiceError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// Order service error.
    Service(ServiceError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Service(err) => service_error_to_response(err),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn service_error_to_response(err: ServiceError) -> (StatusCode, String) {
    let status = match &err {
        ServiceError::Validation(order_err) => match order_err {
            OrderError::InvalidStateTransition { .. }
            | OrderError::CannotCancelDelivered
            | OrderError::AlreadyCancelled => StatusCode::CONFLICT,
            OrderError::CustomerIdRequired | OrderError::NoItems | OrderError::EmptyNote => {
                StatusCode::BAD_REQUEST
            }
        },
        ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        ServiceError::Persistence(EventStoreError::ConcurrencyConflict { .. }) => {
            StatusCode::CONFLICT
        }
        ServiceError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        ServiceError::Persistence(_)
        | ServiceError::Projection(_)
        | ServiceError::CorruptHistory { .. }
        | ServiceError::Serialization(_) => {
            tracing::error!(error = %err, "internal server error");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    (status, err.to_string())
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        ApiError::Service(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::OrderStatus;
    use std::time::Duration;

    fn status_of(err: ServiceError) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    #[test]
    fn test_validation_errors_are_bad_requests() {
        assert_eq!(
            status_of(ServiceError::Validation(OrderError::NoItems)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(ServiceError::Validation(OrderError::EmptyNote)),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_state_conflicts_are_409() {
        assert_eq!(
            status_of(ServiceError::Validation(
                OrderError::InvalidStateTransition {
                    current_status: OrderStatus::Delivered,
                    action: "update status",
                }
            )),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(ServiceError::Validation(OrderError::CannotCancelDelivered)),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_not_found_and_timeout() {
        assert_eq!(
            status_of(ServiceError::NotFound("x".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(ServiceError::Timeout(Duration::from_secs(5))),
            StatusCode::GATEWAY_TIMEOUT
        );
    }
}
