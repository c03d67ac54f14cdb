//! Unified client error model and mapping helpers.
//! Every REST failure is translated into one `AppError` at the `ApiClient` boundary;
//! the auth gateway then turns it into session state or a user-facing message.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

const CODE_UNAUTHORIZED: &str = "unauthorized";
const CODE_FORBIDDEN: &str = "forbidden";
const CODE_NOT_FOUND: &str = "not_found";
const CODE_UNPROCESSABLE: &str = "unprocessable";
const CODE_SERVER_ERROR: &str = "server_error";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    UserInput { code: String, message: String },
    NotFound { code: String, message: String },
    Auth { code: String, message: String },
    Forbidden { code: String, message: String },
    Malformed { code: String, message: String },
    Io { code: String, message: String },
    Remote { status: u16, code: String, message: String },
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::UserInput { code, .. }
            | AppError::NotFound { code, .. }
            | AppError::Auth { code, .. }
            | AppError::Forbidden { code, .. }
            | AppError::Malformed { code, .. }
            | AppError::Io { code, .. }
            | AppError::Remote { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::UserInput { message, .. }
            | AppError::NotFound { message, .. }
            | AppError::Auth { message, .. }
            | AppError::Forbidden { message, .. }
            | AppError::Malformed { message, .. }
            | AppError::Io { message, .. }
            | AppError::Remote { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn user(code: impl Into<String>, msg: impl Into<String>) -> Self { AppError::UserInput { code: code.into(), message: msg.into() } }
    pub fn not_found(code: impl Into<String>, msg: impl Into<String>) -> Self { AppError::NotFound { code: code.into(), message: msg.into() } }
    pub fn auth(code: impl Into<String>, msg: impl Into<String>) -> Self { AppError::Auth { code: code.into(), message: msg.into() } }
    pub fn forbidden(code: impl Into<String>, msg: impl Into<String>) -> Self { AppError::Forbidden { code: code.into(), message: msg.into() } }
    pub fn malformed(code: impl Into<String>, msg: impl Into<String>) -> Self { AppError::Malformed { code: code.into(), message: msg.into() } }
    pub fn io(code: impl Into<String>, msg: impl Into<String>) -> Self { AppError::Io { code: code.into(), message: msg.into() } }
    pub fn internal(code: impl Into<String>, msg: impl Into<String>) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    /// Classify a non-success HTTP reply from the backend.
    pub fn from_status(status: u16, msg: impl Into<String>) -> Self {
        let message = msg.into();
        match status {
            401 => AppError::Auth { code: CODE_UNAUTHORIZED.into(), message },
            403 => AppError::Forbidden { code: CODE_FORBIDDEN.into(), message },
            404 => AppError::NotFound { code: CODE_NOT_FOUND.into(), message },
            422 => AppError::UserInput { code: CODE_UNPROCESSABLE.into(), message },
            500 => AppError::Internal { code: CODE_SERVER_ERROR.into(), message },
            other => AppError::Remote { status: other, code: "remote_error".into(), message },
        }
    }

    /// True when the error stands for an HTTP reply from the backend (built by `from_status`),
    /// as opposed to a local, transport or payload failure.
    pub fn is_remote(&self) -> bool {
        match self {
            AppError::Remote { .. } => true,
            AppError::Auth { code, .. } => code == CODE_UNAUTHORIZED,
            AppError::Forbidden { code, .. } => code == CODE_FORBIDDEN,
            AppError::NotFound { code, .. } => code == CODE_NOT_FOUND,
            AppError::UserInput { code, .. } => code == CODE_UNPROCESSABLE,
            AppError::Internal { code, .. } => code == CODE_SERVER_ERROR,
            AppError::Malformed { .. } | AppError::Io { .. } => false,
        }
    }

    /// Map back to the HTTP status code this error stands for.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::UserInput { .. } => 422,
            AppError::NotFound { .. } => 404,
            AppError::Auth { .. } => 401,
            AppError::Forbidden { .. } => 403,
            AppError::Malformed { .. } => 502,
            AppError::Io { .. } => 503,
            AppError::Remote { status, .. } => *status,
            AppError::Internal { .. } => 500,
        }
    }

    /// True for an expired or invalid bearer token reported by the backend.
    pub fn is_unauthorized(&self) -> bool { matches!(self, AppError::Auth { .. }) }

    /// True when the backend could not be reached at all.
    pub fn is_transport(&self) -> bool { matches!(self, AppError::Io { .. }) }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return AppError::Malformed { code: "bad_payload".into(), message: err.to_string() };
        }
        match err.status() {
            Some(status) => AppError::from_status(status.as_u16(), err.to_string()),
            None => AppError::Io { code: "transport".into(), message: err.to_string() },
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Malformed { code: "bad_payload".into(), message: err.to_string() }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io { code: "storage".into(), message: err.to_string() }
    }
}
