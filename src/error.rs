use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("duplicate column `{identifier}`: headers {first:?} and {second:?} normalize to the same name")]
    DuplicateColumn {
        identifier: String,
        first: String,
        second: String,
    },
    #[error("column {column:?} has {found} rows, expected {expected}")]
    RowCountMismatch {
        column: String,
        expected: usize,
        found: usize,
    },
}

/// Failures that abort a whole profiling call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProfileError {
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),
    #[error("dataset has no columns")]
    EmptyDataset,
    /// A column committed to a kind holds a value that kind cannot summarize.
    /// Classification rules out this case, so reaching it is a bug.
    #[error("internal consistency violation in column `{column}`: {detail}")]
    Inconsistent { column: String, detail: String },
}

#[derive(Debug, Error)]
pub enum FileError {
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),
    #[error("file contains no data")]
    Empty,
    #[error("failed to read CSV: {0}")]
    Csv(#[from] polars::prelude::PolarsError),
    #[error("failed to read workbook: {0}")]
    Workbook(#[from] calamine::XlsxError),
    #[error("failed to download file: {0}")]
    Download(String),
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("missing or malformed bearer token")]
    MissingToken,
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("email not verified, check your inbox for the verification link")]
    EmailNotVerified,
    #[error("an account with this email already exists")]
    EmailExists,
    #[error("password is too weak")]
    WeakPassword,
    #[error("session token rejected")]
    InvalidToken,
    #[error("identity provider error: {0}")]
    Provider(String),
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("invalid destination: {0}")]
    InvalidDestination(String),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("warehouse error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("warehouse connection poisoned")]
    Poisoned,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error(transparent)]
    File(#[from] FileError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Load(#[from] LoadError),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::Profile(ProfileError::Inconsistent { .. }) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Profile(_) => StatusCode::BAD_REQUEST,
            AppError::File(FileError::Download(_)) => StatusCode::BAD_GATEWAY,
            AppError::File(_) => StatusCode::BAD_REQUEST,
            AppError::Auth(AuthError::Provider(_)) => StatusCode::BAD_GATEWAY,
            AppError::Auth(AuthError::EmailExists | AuthError::WeakPassword) => StatusCode::BAD_REQUEST,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Load(LoadError::InvalidDestination(_) | LoadError::Schema(_)) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Load(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        } else {
            tracing::warn!("request rejected: {}", self);
        }

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}
