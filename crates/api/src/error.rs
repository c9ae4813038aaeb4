//! API error type and its HTTP rendering

use crate::types::ErrorResponse;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use dealflow_network::ServiceError;
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error(transparent)]
    InvalidBody(#[from] JsonRejection),

    #[error("workflow {0} not found")]
    NotFound(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::InvalidBody(rejection) => rejection.status(),
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::InvalidBody(_) => "INVALID_BODY",
            Self::NotFound(_) => "WORKFLOW_NOT_FOUND",
            Self::Unavailable(_) => "SERVICE_UNAVAILABLE",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::InvalidRequest(message) => Self::InvalidRequest(message),
            ServiceError::QueueFull { .. } | ServiceError::ShuttingDown => {
                Self::Unavailable(err.to_string())
            }
            ServiceError::Store(_) | ServiceError::Provider(_) => Self::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let (message, error_id) = match &self {
            Self::Internal(details) => {
                let error_id = Uuid::new_v4().to_string();
                error!(error_id = %error_id, error = %details, "Request failed with internal error");
                (
                    "internal server error".to_string(),
                    Some(error_id),
                )
            }
            other => {
                warn!(status = %status, code = code, error = %other, "Request rejected");
                (other.to_string(), None)
            }
        };

        let body = ErrorResponse {
            error: message,
            code: Some(code.to_string()),
            error_id,
            timestamp: Utc::now(),
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_errors_map_to_statuses() {
        let cases = [
            (ServiceError::invalid_request("query must not be empty"), StatusCode::UNPROCESSABLE_ENTITY),
            (ServiceError::QueueFull { capacity: 4 }, StatusCode::SERVICE_UNAVAILABLE),
            (ServiceError::ShuttingDown, StatusCode::SERVICE_UNAVAILABLE),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn internal_errors_hide_details() {
        let response = ApiError::Internal("disk I/O error at /var/db".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
