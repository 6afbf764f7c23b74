use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chirp_core::IntegrationError;
use chirp_social::{
    AuthError, CallError, DatabaseError, MentionError, SocialError, TranscriptionError,
};
use serde_json::json;
use thiserror::Error;

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{resource}:{identifier} not found")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        resource: &'static str,
        field: &'static str,
        value: String,
    },
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("{0}")]
    Unauthorized(&'static str),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Forbidden(String),
    /// A state change that isn't allowed from the current state
    #[error("{0}")]
    InvalidState(String),
    #[error("{0}")]
    RateLimited(String),
    #[error("{0} is not configured on this server")]
    NotConfigured(&'static str),
    /// A third-party service failed, its status is mirrored when there is one
    #[error("{message}")]
    Vendor {
        status: Option<u16>,
        message: String,
    },
    #[error("Unknown internal error: {0}")]
    Unknown(String),
}

impl ServerError {
    fn as_status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict { .. } | Self::InvalidState(_) => StatusCode::CONFLICT,
            Self::InvalidCredentials | Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Vendor { status, .. } => status
                .and_then(|s| StatusCode::from_u16(s).ok())
                .filter(|s| s.is_client_error() || s.is_server_error())
                .unwrap_or(StatusCode::BAD_GATEWAY),
            Self::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.as_status_code();

        if status.is_server_error() {
            log::error!("Request failed with {}: {}", status, self);
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<DatabaseError> for ServerError {
    fn from(value: DatabaseError) -> Self {
        match value {
            DatabaseError::NotFound {
                resource,
                identifier,
            } => Self::NotFound {
                resource,
                identifier,
            },
            DatabaseError::Conflict {
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

impl From<AuthError> for ServerError {
    fn from(value: AuthError) -> Self {
        match value {
            AuthError::InvalidCredentials => Self::InvalidCredentials,
            AuthError::Db(e) => e.into(),
            e => Self::Unknown(e.to_string()),
        }
    }
}

impl From<IntegrationError> for ServerError {
    fn from(value: IntegrationError) -> Self {
        match value {
            IntegrationError::NotConfigured(name) => Self::NotConfigured(name),
            e => Self::Vendor {
                status: e.status(),
                message: e.to_string(),
            },
        }
    }
}

impl From<SocialError> for ServerError {
    fn from(value: SocialError) -> Self {
        match value {
            SocialError::Invalid(message) => Self::BadRequest(message),
            SocialError::Forbidden(message) => Self::Forbidden(message),
            SocialError::Database(e) => e.into(),
            SocialError::Integration(e) => e.into(),
        }
    }
}

impl From<CallError> for ServerError {
    fn from(value: CallError) -> Self {
        match value {
            CallError::NoCallees => Self::BadRequest(value.to_string()),
            CallError::NotParticipant => Self::Forbidden(value.to_string()),
            CallError::InvalidTransition { .. } => Self::InvalidState(value.to_string()),
            CallError::Database(e) => e.into(),
            CallError::Integration(e) => e.into(),
        }
    }
}

impl From<MentionError> for ServerError {
    fn from(value: MentionError) -> Self {
        match value {
            MentionError::Disabled => Self::NotConfigured("Korn"),
            MentionError::NotMentioned | MentionError::OwnTweet | MentionError::EmptyMessage => {
                Self::BadRequest(value.to_string())
            }
            MentionError::InFlight | MentionError::AlreadyReplied => {
                Self::InvalidState(value.to_string())
            }
            MentionError::RateLimited => Self::RateLimited(value.to_string()),
            MentionError::Database(e) => e.into(),
        }
    }
}

impl From<TranscriptionError> for ServerError {
    fn from(value: TranscriptionError) -> Self {
        match value {
            TranscriptionError::NotConfigured => Self::NotConfigured("Speech-to-text"),
            TranscriptionError::InvalidAudio(_) | TranscriptionError::EmptyAudio => {
                Self::BadRequest(value.to_string())
            }
            TranscriptionError::Failed { status, message } => Self::Vendor { status, message },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vendor_status_is_mirrored() {
        let error: ServerError = IntegrationError::Status {
            status: 429,
            body: "slow down".to_string(),
        }
        .into();

        assert_eq!(error.as_status_code(), StatusCode::TOO_MANY_REQUESTS);

        let unknown = ServerError::Vendor {
            status: None,
            message: "connection reset".to_string(),
        };
        assert_eq!(unknown.as_status_code(), StatusCode::BAD_GATEWAY);

        let odd = ServerError::Vendor {
            status: Some(204),
            message: "no content".to_string(),
        };
        assert_eq!(odd.as_status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_domain_errors() {
        let missing: ServerError = IntegrationError::NotConfigured("LiveKit").into();
        assert_eq!(missing.as_status_code(), StatusCode::SERVICE_UNAVAILABLE);

        let transition: ServerError = CallError::InvalidTransition {
            from: "ended".to_string(),
            to: "active".to_string(),
        }
        .into();
        assert_eq!(transition.as_status_code(), StatusCode::CONFLICT);

        let forbidden: ServerError = SocialError::forbidden("nope").into();
        assert_eq!(forbidden.as_status_code(), StatusCode::FORBIDDEN);
    }
}
