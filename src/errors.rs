use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{debug, error, info};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("email already registered")]
    DuplicateEmail,
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("invalid credentials")]
    WrongCredential,
    #[error("invalid or expired token")]
    InvalidOrExpiredToken,
    #[error("kwh must be a finite, non-negative number")]
    InvalidNumericInput,
    #[error("authentication required")]
    Unauthenticated,
    #[error("password change required before continuing")]
    PasswordChangeRequired,
    #[error("admin role required")]
    Forbidden,
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn internal(err: impl std::fmt::Display) -> Self {
        Self::Internal(err.to_string())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::DuplicateEmail => StatusCode::CONFLICT,
            AppError::MissingField(_) => StatusCode::BAD_REQUEST,
            AppError::WrongCredential => StatusCode::UNAUTHORIZED,
            AppError::InvalidOrExpiredToken => StatusCode::BAD_REQUEST,
            AppError::InvalidNumericInput => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::PasswordChangeRequired => StatusCode::FORBIDDEN,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> String {
        match self {
            AppError::Internal(_) => "internal error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::internal(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Internal(_) => error!("internal error: {self}"),
            AppError::Unauthenticated
            | AppError::WrongCredential
            | AppError::PasswordChangeRequired
            | AppError::Forbidden => info!("request refused: {self}"),
            _ => debug!("client error: {self}"),
        }

        (self.status_code(), self.body()).into_response()
    }
}
