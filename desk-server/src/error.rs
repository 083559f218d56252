//! HTTP error mapping

use crate::directory::DirectoryError;
use assetdesk_authz::{AuthzError, StoreError};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Errors returned by HTTP handlers
#[derive(Debug, Error)]
pub enum ApiError {
    /// Authorization failure, rendered by [`AuthzError`] itself
    #[error(transparent)]
    Authz(#[from] AuthzError),

    /// Permission store failure
    #[error("Permission storage error: {0}")]
    Store(#[from] StoreError),

    /// User directory failure or missing user
    #[error(transparent)]
    Directory(#[from] DirectoryError),

    /// Malformed request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Role edits requested while no permission store is configured
    #[error("Role permissions are not editable: no permission store is configured")]
    StorageDisabled,
}

impl ApiError {
    /// Create a bad request error
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            ApiError::Store(_) => "Permission storage is unavailable".to_string(),
            other => other.to_string(),
        };

        let (status, code) = match self {
            ApiError::Authz(e) => return e.into_response(),
            ApiError::Store(e) => {
                error!("Permission storage error: {}", e);
                (StatusCode::SERVICE_UNAVAILABLE, "storage_unavailable")
            }
            ApiError::Directory(DirectoryError::NotFound(_)) => (StatusCode::NOT_FOUND, "not_found"),
            ApiError::Directory(DirectoryError::Invalid(_)) => {
                (StatusCode::BAD_REQUEST, "bad_request")
            }
            ApiError::Directory(e) => {
                error!("User directory error: {}", e);
                (StatusCode::SERVICE_UNAVAILABLE, "directory_unavailable")
            }
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ApiError::StorageDisabled => (StatusCode::CONFLICT, "storage_disabled"),
        };

        (status, Json(json!({ "error": code, "message": message }))).into_response()
    }
}
