use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::{
    dao::save_state::PersistenceError,
    engine::EngineError,
    state::game::{InvalidParticipant, UnknownAction, UnknownPolicy},
};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The submitted button is not part of the pad.
    #[error("{0}: use one of a, b, select, start, up, down, left, right")]
    InvalidAction(#[from] UnknownAction),
    /// The participant already voted in the current democracy round.
    #[error("you have already moved this round; time until next move: {remaining_secs}s")]
    DuplicateVote {
        /// Seconds left before the next round opens.
        remaining_secs: u64,
    },
    /// A ROM is loading or running already.
    #[error("a game is already loaded; stop it first")]
    SessionBusy,
    /// No ROM is running.
    #[error("no game is running")]
    SessionNotActive,
    /// The engine could not be built for the requested ROM.
    #[error("failed to start the emulator: {0}")]
    EngineConstruction(#[source] EngineError),
    /// Unauthorized access attempt.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// The running engine refused an operation.
    #[error("emulator error: {0}")]
    Engine(#[source] EngineError),
    /// The save file could not be written.
    #[error("failed to persist game state: {0}")]
    Persistence(#[source] PersistenceError),
}

impl From<UnknownPolicy> for ServiceError {
    fn from(err: UnknownPolicy) -> Self {
        ServiceError::InvalidInput(err.to_string())
    }
}

impl From<InvalidParticipant> for ServiceError {
    fn from(err: InvalidParticipant) -> Self {
        ServiceError::InvalidInput(err.to_string())
    }
}

impl From<ValidationErrors> for ServiceError {
    fn from(err: ValidationErrors) -> Self {
        ServiceError::InvalidInput(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Unauthorized access attempt.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Request understood but the referenced content is unusable.
    #[error("unprocessable: {0}")]
    Unprocessable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        let message = err.to_string();
        match err {
            ServiceError::InvalidAction(_) | ServiceError::InvalidInput(_) => {
                AppError::BadRequest(message)
            }
            ServiceError::Unauthorized(reason) => AppError::Unauthorized(reason),
            ServiceError::NotFound(what) => AppError::NotFound(what),
            ServiceError::DuplicateVote { .. }
            | ServiceError::SessionBusy
            | ServiceError::SessionNotActive => AppError::Conflict(message),
            ServiceError::EngineConstruction(_) => AppError::Unprocessable(message),
            ServiceError::Engine(_) | ServiceError::Persistence(_) => AppError::Internal(message),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}
