use axum::{http::StatusCode, response::IntoResponse, Json};

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("device not found: {0}")]
    DeviceNotFound(i64),

    #[error("probe not found: {0}")]
    ProbeNotFound(i64),

    #[error("unknown device type: {0}")]
    InvalidDeviceType(i32),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    /// Stable business error code returned to API callers.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::DeviceNotFound(_) => "DEVICE_NOT_FOUND",
            ServiceError::ProbeNotFound(_) => "PROBE_NOT_FOUND",
            ServiceError::InvalidDeviceType(_) => "DEVICE_TYPE_NOT_FOUND",
            ServiceError::Database(_) | ServiceError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::DeviceNotFound(_) | ServiceError::ProbeNotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::InvalidDeviceType(_) => StatusCode::BAD_REQUEST,
            ServiceError::Database(_) | ServiceError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {:#}", self);
        }
        (
            status,
            Json(serde_json::json!({ "error": self.to_string(), "code": self.code() })),
        )
            .into_response()
    }
}
