use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use miette::Diagnostic;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum DashError {
    #[error("I/O error: {0}")]
    #[diagnostic(code(jobdash::io))]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    #[diagnostic(code(jobdash::config))]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(jobdash::serde))]
    Serde(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    #[diagnostic(code(jobdash::db))]
    Db(#[from] sea_orm::DbErr),

    #[error("Crypto error: {0}")]
    #[diagnostic(
        code(jobdash::crypto),
        help("The key file must hold 64 hex characters (32 bytes). Deleting it generates a new key, but secrets encrypted with the old key are lost.")
    )]
    Crypto(String),

    #[error("Username already exists!")]
    #[diagnostic(code(jobdash::username_taken))]
    UsernameTaken,

    #[error("Bad request: {0}")]
    #[diagnostic(code(jobdash::bad_request))]
    BadRequest(String),

    #[error("{0}")]
    #[diagnostic(code(jobdash::other))]
    Other(String),
}

impl From<hex::FromHexError> for DashError {
    fn from(value: hex::FromHexError) -> Self {
        DashError::Crypto(value.to_string())
    }
}

impl IntoResponse for DashError {
    fn into_response(self) -> Response {
        match &self {
            DashError::UsernameTaken => (StatusCode::CONFLICT, self.to_string()).into_response(),
            DashError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()).into_response(),
            _ => {
                tracing::error!(error = %self, "Request failed");
                let body = json!({ "error": self.to_string() });
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
        }
    }
}
