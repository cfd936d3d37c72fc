use application::{ApplicationError, PhotoStoreError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use domain::ErrorKind;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                code,
                message: message.into(),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<ApplicationError> for ApiError {
    fn from(error: ApplicationError) -> Self {
        let message = error.to_string();
        match error.kind() {
            ErrorKind::Validation => {
                ApiError::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
            }
            ErrorKind::Authorization => {
                ApiError::new(StatusCode::FORBIDDEN, "AUTHORIZATION_FAILED", message)
            }
            ErrorKind::NotFound => ApiError::new(StatusCode::NOT_FOUND, "NOT_FOUND", message),
            ErrorKind::Storage => {
                // 存储细节只写日志，不返回给客户端
                tracing::error!(error = %message, "请求因存储故障失败");
                ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORAGE_ERROR",
                    "storage failure",
                )
            }
            ErrorKind::Cancelled => {
                ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "CANCELLED", message)
            }
        }
    }
}

impl From<PhotoStoreError> for ApiError {
    fn from(error: PhotoStoreError) -> Self {
        ApplicationError::from(error).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
