use service_core::error::AppError;
use thiserror::Error;

use crate::models::AuthMethod;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error(transparent)]
    Store(#[from] AppError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("Email not found or not configured for {} authentication", .0.label())]
    GuestNotFound(AuthMethod),

    #[error("Missing token")]
    MissingToken,

    #[error("Invalid token format")]
    InvalidTokenFormat,

    #[error("Invalid or expired magic link")]
    TokenNotFound,

    #[error("This magic link has already been used")]
    TokenUsed,

    #[error("This magic link has expired")]
    TokenExpired,

    #[error("Guest not found")]
    GuestMissing,

    #[error("Authentication required")]
    MissingSession,

    #[error("Session is invalid or has expired")]
    InvalidSession,
}

impl AuthError {
    /// Code understood by the magic-link verification page.
    pub fn verify_page_code(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "MISSING_TOKEN",
            AuthError::InvalidTokenFormat => "INVALID_TOKEN",
            AuthError::TokenNotFound | AuthError::GuestMissing => "NOT_FOUND",
            AuthError::TokenUsed => "TOKEN_USED",
            AuthError::TokenExpired => "TOKEN_EXPIRED",
            _ => "UNKNOWN",
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        let message = err.to_string();
        match err {
            AuthError::Store(e) => e,
            AuthError::Internal(e) => AppError::InternalError(e),
            AuthError::GuestNotFound(_) | AuthError::TokenNotFound | AuthError::GuestMissing => {
                AppError::NotFound(anyhow::anyhow!(message))
            }
            AuthError::MissingToken | AuthError::InvalidTokenFormat => {
                AppError::BadRequest(anyhow::anyhow!(message))
            }
            AuthError::TokenUsed => AppError::TokenUsed(anyhow::anyhow!(message)),
            AuthError::TokenExpired => AppError::TokenExpired(anyhow::anyhow!(message)),
            AuthError::MissingSession | AuthError::InvalidSession => {
                AppError::Unauthorized(anyhow::anyhow!(message))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use service_core::error::ErrorCode;

    #[test]
    fn maps_to_envelope_codes() {
        let cases = [
            (
                AuthError::GuestNotFound(AuthMethod::EmailMatching),
                StatusCode::NOT_FOUND,
                ErrorCode::NotFound,
            ),
            (AuthError::InvalidTokenFormat, StatusCode::BAD_REQUEST, ErrorCode::ValidationError),
            (AuthError::TokenUsed, StatusCode::CONFLICT, ErrorCode::TokenUsed),
            (AuthError::TokenExpired, StatusCode::GONE, ErrorCode::TokenExpired),
            (AuthError::InvalidSession, StatusCode::UNAUTHORIZED, ErrorCode::Unauthorized),
        ];

        for (err, status, code) in cases {
            assert_eq!(AppError::from(err).status_and_code(), (status, code));
        }
    }

    #[test]
    fn not_found_message_names_the_method() {
        assert_eq!(
            AuthError::GuestNotFound(AuthMethod::EmailMatching).to_string(),
            "Email not found or not configured for email matching authentication"
        );
        assert_eq!(
            AuthError::GuestNotFound(AuthMethod::MagicLink).to_string(),
            "Email not found or not configured for magic link authentication"
        );
    }
}
