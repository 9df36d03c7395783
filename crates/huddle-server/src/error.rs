use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use huddle_shared::AssetId;
use huddle_store::StoreError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Asset not found: {0}")]
    AssetNotFound(AssetId),

    #[error("Asset too large: {size} bytes (max {max})")]
    AssetTooLarge { size: usize, max: usize },

    #[error("Asset storage error: {0}")]
    AssetStorage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for ServerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Forbidden => ServerError::Forbidden(err.to_string()),
            StoreError::NotFound(what) => ServerError::NotFound(what.to_string()),
            StoreError::Invalid(reason) => ServerError::BadRequest(reason),
            StoreError::RoomClosed(_) | StoreError::EmailTaken => {
                ServerError::Conflict(err.to_string())
            }
            other => {
                tracing::error!(error = %other, "store failure");
                ServerError::Internal(other.to_string())
            }
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::Unauthenticated => (StatusCode::UNAUTHORIZED, self.to_string()),
            ServerError::Forbidden(_) => (StatusCode::FORBIDDEN, self.to_string()),
            ServerError::NotFound(_) | ServerError::AssetNotFound(_) => {
                (StatusCode::NOT_FOUND, self.to_string())
            }
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ServerError::Conflict(_) => (StatusCode::CONFLICT, self.to_string()),
            ServerError::AssetTooLarge { .. } => {
                (StatusCode::PAYLOAD_TOO_LARGE, self.to_string())
            }
            ServerError::AssetStorage(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Asset storage error".to_string())
            }
            ServerError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}
