use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while talking to the survey platform.
#[derive(Debug, Error)]
pub enum Error {
    /// The platform answered with a non-2xx status.
    #[error("{method} {url} failed with status {status}: {body}")]
    Request {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    /// The response did not have the expected JSON or pagination shape.
    #[error("unexpected response from {url}: {message}")]
    Protocol { url: String, message: String },

    #[error("not found: {0}")]
    NotFound(String),

    /// A single attachment could not be downloaded.
    #[error("failed to fetch attachment {filename}: {message}")]
    Fetch { filename: String, message: String },

    #[error("{method} {url}: {source}")]
    Transport {
        method: String,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unsupported operation: {resource}/{operation}")]
    UnsupportedOperation { resource: String, operation: String },

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn protocol(url: &str, message: impl Into<String>) -> Self {
        Error::Protocol {
            url: url.to_string(),
            message: message.into(),
        }
    }

    /// Filename of the attachment this error belongs to, if any.
    pub fn attachment(&self) -> Option<&str> {
        match self {
            Error::Fetch { filename, .. } => Some(filename),
            _ => None,
        }
    }
}

/// Errors returned by the webhook receiver.
#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
    Upstream(Error),
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::NotFound(msg) => write!(f, "Not Found: {msg}"),
            AppError::BadRequest(msg) => write!(f, "Bad Request: {msg}"),
            AppError::Upstream(err) => write!(f, "Upstream Error: {err}"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Upstream(err) => {
                tracing::error!("Upstream error: {err}");
                (
                    StatusCode::BAD_GATEWAY,
                    "Survey platform request failed".to_string(),
                )
            }
        };

        let body = json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidInput(msg) => AppError::BadRequest(msg),
            Error::NotFound(msg) => AppError::NotFound(msg),
            other => AppError::Upstream(other),
        }
    }
}
