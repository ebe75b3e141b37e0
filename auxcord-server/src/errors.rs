use auxcord_queue::{ServiceError, StoreError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{resource}:{identifier} not found")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
    #[error("no songs in queue")]
    EmptyQueue,
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        resource: &'static str,
        field: &'static str,
        value: String,
    },
    #[error("{0}")]
    Invalid(String),
    #[error("Room is not active")]
    RoomNotActive,
    #[error("Only the room host can do that")]
    NotRoomHost,
    /// The write may have been applied even though the request failed.
    /// Clients should re-fetch instead of assuming a no-op
    #[error("The change may have been applied, but announcing it failed")]
    PossiblyApplied,
    #[error("Unknown internal error: {0}")]
    Unknown(String),
}

impl ServerError {
    fn as_status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::EmptyQueue => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Invalid(_) => StatusCode::BAD_REQUEST,
            Self::RoomNotActive => StatusCode::FORBIDDEN,
            Self::NotRoomHost => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        (self.as_status_code(), self.to_string()).into_response()
    }
}

impl From<ServiceError> for ServerError {
    fn from(value: ServiceError) -> Self {
        match value {
            ServiceError::InvalidVoteValue(_) => Self::Invalid(value.to_string()),
            ServiceError::ItemNotInRoom => Self::NotFound {
                resource: "queue item",
                identifier: "id",
            },
            ServiceError::RoomNotActive => Self::RoomNotActive,
            ServiceError::NotRoomHost => Self::NotRoomHost,
            ServiceError::Store(e) => e.into(),
            ServiceError::Publish(_) => Self::PossiblyApplied,
        }
    }
}

impl From<StoreError> for ServerError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound {
                resource,
                identifier,
            } => Self::NotFound {
                resource,
                identifier,
            },
            StoreError::Conflict {
                resource,
                field,
                value,
            } => Self::Conflict {
                resource,
                field,
                value,
            },
            e => Self::Unknown(e.to_string()),
        }
    }
}
