//! Defines the app level error type and its conversion to JSON error responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::db::DbError;

/// The errors that may occur while handling a request.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum AppError {
    /// The request body failed entity validation. Holds one human-readable message per violated
    /// rule.
    #[error("validation failed: {0:?}")]
    Validation(Vec<String>),

    /// The request could not be tied to a registered user. The message describes why the bearer
    /// token was rejected.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// The email/password combination did not match a registered user. Deliberately carries no
    /// detail so that login cannot be used to probe which emails are registered.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// The requested bank account does not exist within the authenticated user's accounts.
    #[error("bank account not found")]
    BankAccountNotFound,

    /// The requested transaction does not exist within the authenticated user's accounts.
    #[error("transaction not found")]
    TransactionNotFound,

    /// An unexpected error from the password hashing library. The error string should only be
    /// logged on the server, never shown to the client.
    #[error("hashing failed: {0}")]
    Hashing(String),

    /// A bearer token could not be signed.
    #[error("token creation failed: {0}")]
    TokenCreation(String),

    /// An unexpected database error. The client only sees a generic message.
    #[error("database error: {0}")]
    Database(DbError),
}

impl From<DbError> for AppError {
    fn from(error: DbError) -> Self {
        AppError::Database(error)
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(error: rusqlite::Error) -> Self {
        AppError::Database(error.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, errors) = match self {
            AppError::Validation(messages) => (StatusCode::UNPROCESSABLE_ENTITY, messages),
            AppError::Unauthenticated(message) => (StatusCode::UNAUTHORIZED, vec![message]),
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                vec!["Invalid email or password".to_owned()],
            ),
            AppError::BankAccountNotFound => (
                StatusCode::NOT_FOUND,
                vec!["Bank account not found".to_owned()],
            ),
            AppError::TransactionNotFound => (
                StatusCode::NOT_FOUND,
                vec!["Transaction not found".to_owned()],
            ),
            AppError::Hashing(error) => {
                tracing::error!("An error occurred while hashing a password: {error}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    vec!["Internal server error".to_owned()],
                )
            }
            AppError::TokenCreation(error) => {
                tracing::error!("An error occurred while signing a token: {error}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    vec!["Internal server error".to_owned()],
                )
            }
            AppError::Database(error) => {
                tracing::error!("An unexpected database error occurred: {error}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    vec!["Internal server error".to_owned()],
                )
            }
        };

        let body = Json(json!({ "errors": errors }));

        (status, body).into_response()
    }
}
