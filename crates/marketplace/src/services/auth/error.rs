//! Authentication error types.

use thiserror::Error;

use crate::services::backend::{InsertError, SignUpError, TransportError};
use crate::services::provisioner::ValidationError;
use crate::services::resolver::Destination;

/// Errors that can occur during sign-in, registration and resolution.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No usable session.
    #[error("not authenticated")]
    NotAuthenticated,

    /// Invalid credentials (wrong password or unknown email).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// A submitted field is missing or malformed.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The auth provider refused the sign-up.
    #[error("sign-up failed: {0}")]
    SignUp(#[from] SignUpError),

    /// The identity was created but its profile row was not.
    #[error("profile provisioning failed: {0}")]
    Provisioning(#[source] InsertError),

    /// The backend could not be reached or answered nonsense.
    #[error("backend unavailable: {0}")]
    Transport(#[from] TransportError),
}

impl AuthError {
    /// The page this error sends the visitor to, when it decides one.
    #[must_use]
    pub const fn destination(&self) -> Option<Destination> {
        match self {
            Self::NotAuthenticated => Some(Destination::SignIn),
            _ => None,
        }
    }

    /// Short code carried in the `?error=` query of the form pages.
    #[must_use]
    pub fn code(&self) -> String {
        match self {
            Self::NotAuthenticated => "unconfirmed".to_owned(),
            Self::InvalidCredentials => "credentials".to_owned(),
            Self::Validation(err) => err.code(),
            Self::SignUp(SignUpError::DuplicateEmail) => "email_taken".to_owned(),
            Self::SignUp(SignUpError::WeakPassword(_)) => "weak_password".to_owned(),
            Self::SignUp(SignUpError::Rejected(_)) => "signup_rejected".to_owned(),
            Self::Provisioning(_) => "profile_failed".to_owned(),
            Self::SignUp(SignUpError::Transport(_)) | Self::Transport(_) => {
                "unavailable".to_owned()
            }
        }
    }

    /// Whether this is a server-side failure worth reporting.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::SignUp(SignUpError::Transport(_)) | Self::Provisioning(_)
        )
    }
}
