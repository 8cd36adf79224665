use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{debug, error};

use tubeway_db::{Collection, StoreError};
use tubeway_types::api::ErrorBody;

use crate::media::MediaError;

/// Every failure a handler can report. Each variant maps to one status code.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Auth(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    /// Store or media failure.
    #[error("{0}")]
    Dependency(String),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// "<What> does not exist".
    pub fn missing(what: &str) -> Self {
        Self::NotFound(format!("{} does not exist", what))
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Dependency(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("{}: {}", status, self);
        } else {
            debug!("{}: {}", status, self);
        }

        let body = ErrorBody {
            status_code: status.as_u16(),
            data: None,
            message: self.to_string(),
            success: false,
            errors: Vec::new(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { collection, .. } => Self::missing(entity_name(collection)),
            StoreError::Conflict(msg) => Self::Conflict(msg),
            StoreError::InvalidField(field) => Self::Validation(format!("Invalid field '{}'", field)),
            other => Self::Dependency(other.to_string()),
        }
    }
}

impl From<MediaError> for ApiError {
    fn from(err: MediaError) -> Self {
        Self::Dependency(err.to_string())
    }
}

fn entity_name(collection: Collection) -> &'static str {
    match collection {
        Collection::Users => "User",
        Collection::Videos => "Video",
        Collection::Comments => "Comment",
        Collection::Likes => "Like",
        Collection::Subscriptions => "Subscription",
        Collection::Tweets => "Tweet",
        Collection::Playlists => "Playlist",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_status_codes() {
        let missing: ApiError = StoreError::not_found(Collection::Videos, "v1").into();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert_eq!(missing.to_string(), "Video does not exist");

        let conflict: ApiError = StoreError::Conflict("dup".into()).into();
        assert_eq!(conflict.status(), StatusCode::CONFLICT);

        let bad_field: ApiError = StoreError::InvalidField("x;y".into()).into();
        assert_eq!(bad_field.status(), StatusCode::BAD_REQUEST);

        let poisoned: ApiError = StoreError::LockPoisoned.into();
        assert_eq!(poisoned.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
