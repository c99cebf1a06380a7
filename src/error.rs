//! Error type shared by the stores and the HTTP handlers.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::error;

use crate::models::ErrorResponse;

#[derive(Error, Debug)]
pub enum PortalError {
    /// Registration attempted with a username that is already taken
    #[error("Username already exists! Try a different one.")]
    UsernameTaken,

    /// Unknown user or wrong password
    #[error("Invalid credentials!")]
    InvalidCredentials,

    /// No valid session on the request
    #[error("You must be logged in to {0}.")]
    Unauthorized(&'static str),

    #[error("{0}")]
    InvalidInput(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    /// The registry lists a file whose blob is gone from the upload directory
    #[error("Stored data for '{0}' is missing from the upload directory")]
    BlobMissing(String),

    #[error("Storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}

pub type PortalResult<T> = Result<T, PortalError>;

impl PortalError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::UsernameTaken => StatusCode::CONFLICT,
            Self::InvalidCredentials | Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::FileNotFound(_) => StatusCode::NOT_FOUND,
            Self::BlobMissing(_) | Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for PortalError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("{}", self);
        }

        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
