//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. Page handlers return `Result<T, AppError>`; form
//! handlers turn their errors into redirects instead.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::services::{AuthError, ListingError, TransportError};

/// Application-level error type for the marketplace.
#[derive(Debug, Error)]
pub enum AppError {
    /// Authentication or registration failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Listing operation failed.
    #[error("Listing error: {0}")]
    Listing(#[from] ListingError),

    /// The hosted backend failed.
    #[error("Backend error: {0}")]
    Transport(#[from] TransportError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),
}

impl AppError {
    /// Whether the error is the server's fault and should be reported.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Auth(err) => err.is_server_error(),
            Self::Listing(err) => matches!(err, ListingError::Transport(_)),
            Self::NotFound(_) => false,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = match &self {
            Self::Transport(TransportError::Timeout) => StatusCode::GATEWAY_TIMEOUT,
            Self::Transport(_) => StatusCode::BAD_GATEWAY,
            Self::Auth(err) => match err {
                AuthError::NotAuthenticated | AuthError::InvalidCredentials => {
                    StatusCode::UNAUTHORIZED
                }
                AuthError::Validation(_) | AuthError::SignUp(_) => StatusCode::BAD_REQUEST,
                AuthError::Provisioning(_) => StatusCode::INTERNAL_SERVER_ERROR,
                AuthError::Transport(_) => StatusCode::BAD_GATEWAY,
            },
            Self::Listing(err) => match err {
                ListingError::Validation(_)
                | ListingError::InvalidPrice(_)
                | ListingError::UnsupportedImage(_) => StatusCode::BAD_REQUEST,
                ListingError::Rejected(_) => StatusCode::FORBIDDEN,
                ListingError::Transport(_) => StatusCode::BAD_GATEWAY,
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
        };

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Transport(_) => "External service error".to_string(),
            Self::Auth(err) => match err {
                AuthError::NotAuthenticated => "Please sign in".to_string(),
                AuthError::InvalidCredentials => "Invalid credentials".to_string(),
                AuthError::Validation(e) => e.to_string(),
                AuthError::SignUp(_) => "Registration was rejected".to_string(),
                AuthError::Provisioning(_) => "Could not create profile".to_string(),
                AuthError::Transport(_) => "External service error".to_string(),
            },
            Self::Listing(err) => match err {
                ListingError::Transport(_) => "External service error".to_string(),
                ListingError::Rejected(_) => "Not allowed".to_string(),
                other => other.to_string(),
            },
            Self::NotFound(_) => "Not found".to_string(),
        };

        (status, message).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
