//! Domain models, DTOs, and the error type shared by the store, the user
//! repository and the HTTP layer.

use axum::{http::StatusCode, response::{IntoResponse, Response}};
use serde::Serialize;
use thiserror::Error;

/// A student record held by the in-memory store.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Student {
    pub id: i32,
    pub name: String,
    pub score: i32,
}

impl Student {
    pub fn new(id: i32, name: impl Into<String>, score: i32) -> Self {
        Self { id, name: name.into(), score }
    }
}

/// A user record as the persistence layer stores it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Assigned by the persistence layer on insert.
    pub id: i32,
    /// Intended to be unique; nothing enforces it.
    pub username: String,
    /// Credential exactly as stored. Never serialized to clients.
    pub password: String,
}

/// Insert shape for a user; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password: String,
}

impl NewUser {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self { username: username.into(), password: password.into() }
    }

    pub(crate) fn with_id(self, id: i32) -> User {
        User { id, username: self.username, password: self.password }
    }
}

/// Wire shape of a user.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UserResponse {
    pub id: i32,
    pub username: String,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self { id: u.id, username: u.username }
    }
}

/// Application-wide error type with variants mapped to HTTP status codes.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    /// The persistence layer could not be reached or did not answer in time.
    #[error("persistence unavailable: {0}")]
    Unavailable(String),
    #[error("repository error: {0}")]
    Repo(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Repo(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = serde_json::json!({
            "error": self.to_string(),
        });
        (status, axum::Json(body)).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => AppError::Unavailable(e.to_string()),
            _ => AppError::Repo(e.to_string()),
        }
    }
}
