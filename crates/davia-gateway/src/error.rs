//! HTTP mapping for domain errors

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use davia_core::Error;
use davia_graph::EngineError;
use tracing::{error, warn};

/// A failed request, rendered as `{"error": message}`.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            Error::PathFormatInvalid(_) | Error::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Error::ModuleNotFound { .. } | Error::AttributeMissing { .. } | Error::NotFound(_) => {
                StatusCode::NOT_FOUND
            }
            Error::TypeMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Engine(_) => StatusCode::BAD_GATEWAY,
            Error::ConfigMissing(_)
            | Error::ConfigInvalid(_)
            | Error::StorageError(_)
            | Error::IoError(_)
            | Error::JsonError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        Self(e.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("{}", self.0);
        } else {
            warn!("{}", self.0);
        }
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}
