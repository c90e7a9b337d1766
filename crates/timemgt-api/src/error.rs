use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{error, warn};

use timemgt_db::DbError;
use timemgt_parsup::ParamError;
use timemgt_types::api::Envelope;

/// Challenge sent with every 401.
pub const AUTH_CHALLENGE: &str = "Bearer realm=Restricted";

/// Per-request failure. Every variant renders as the failure envelope.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Body missing, not JSON, or not an object.
    #[error("{0}")]
    MalformedInput(String),

    #[error("{0}")]
    InjectionRejected(String),

    /// Missing required field(s) or a field of the wrong shape.
    #[error("{0}")]
    ValidationFailed(String),

    #[error("{0}")]
    NotFound(String),

    /// Persistence failure, including timeouts.
    #[error("{0}")]
    Storage(String),

    #[error("{0}")]
    DuplicateName(String),

    #[error("{0}")]
    TagInUse(String),

    #[error("{0}")]
    Unauthorized(String),
}

impl ApiError {
    /// Failures travel as HTTP 200 with `ok: false`; clients read the
    /// envelope. Only a failed identity check changes the status.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            _ => StatusCode::OK,
        }
    }
}

impl From<ParamError> for ApiError {
    fn from(err: ParamError) -> Self {
        match err {
            ParamError::Malformed(msg) => Self::MalformedInput(msg),
            ParamError::Injection(msg) => Self::InjectionRejected(msg),
            ParamError::MissingFields(msg) => Self::ValidationFailed(msg),
            e @ ParamError::InvalidField { .. } => Self::ValidationFailed(e.to_string()),
        }
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::DuplicateName(msg) => Self::DuplicateName(msg.to_string()),
            e @ DbError::TagInUse(_) => Self::TagInUse(e.to_string()),
            e @ DbError::NotFound(_) => Self::NotFound(e.to_string()),
            e @ (DbError::LockPoisoned | DbError::Sqlite(_)) => {
                error!("Storage error: {}", e);
                Self::Storage("storage operation failed".to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        warn!("Request failed ({}): {}", status.as_u16(), self);

        let mut response = (status, Json(Envelope::<()>::fail(self.to_string()))).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static(AUTH_CHALLENGE),
            );
        }
        response
    }
}
