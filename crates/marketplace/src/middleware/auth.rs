//! Authentication extractors.
//!
//! The signed-in user's [`AuthSession`] lives in the cookie session. Every
//! extraction runs it past the auth provider, which refreshes an expired
//! access token; a refreshed session is written back.

use axum::{
    extract::{FromRequestParts, Query},
    http::{StatusCode, Uri, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use secrecy::ExposeSecret;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{debug, warn};

use crate::models::{AuthSession, session_keys};
use crate::services::AuthProvider;
use crate::services::resolver::Destination;
use crate::state::AppState;

/// Extractor that requires a signed-in user.
///
/// If there is no usable session, redirects to the sign-in page.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAuth(session): RequireAuth,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", session.email())
/// }
/// ```
pub struct RequireAuth(pub AuthSession);

/// Error returned when authentication is required but the user is not signed in.
pub enum AuthRejection {
    /// Redirect to the sign-in page, keeping the `?error=` code of the
    /// bounced request.
    RedirectToLogin { notice: Option<String> },
    /// The session layer is missing from the router.
    SessionUnavailable,
}

#[derive(Deserialize)]
struct BouncedQuery {
    error: Option<String>,
}

impl AuthRejection {
    fn redirect_from(uri: &Uri) -> Self {
        let notice = Query::<BouncedQuery>::try_from_uri(uri)
            .ok()
            .and_then(|Query(query)| query.error)
            .filter(|code| is_notice_code(code));
        Self::RedirectToLogin { notice }
    }
}

/// Codes are short snake case words.
fn is_notice_code(code: &str) -> bool {
    !code.is_empty()
        && code.len() <= 32
        && code.chars().all(|c| c.is_ascii_lowercase() || c == '_')
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin { notice: None } => {
                Redirect::to(Destination::SignIn.path()).into_response()
            }
            Self::RedirectToLogin { notice: Some(code) } => {
                Redirect::to(&format!("{}?error={code}", Destination::SignIn.path()))
                    .into_response()
            }
            Self::SessionUnavailable => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        }
    }
}

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or(AuthRejection::SessionUnavailable)?;

        current_auth_session(&session, state)
            .await
            .map(Self)
            .ok_or_else(|| AuthRejection::redirect_from(&parts.uri))
    }
}

/// Extractor that optionally gets the signed-in user.
///
/// Unlike `RequireAuth`, this does not reject the request if nobody is
/// signed in.
pub struct OptionalAuth(pub Option<AuthSession>);

impl FromRequestParts<AppState> for OptionalAuth {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let current = match parts.extensions.get::<Session>().cloned() {
            Some(session) => current_auth_session(&session, state).await,
            None => None,
        };

        Ok(Self(current))
    }
}

/// Load the stored session and validate it with the auth provider.
///
/// A session the provider no longer accepts is removed. A failed check
/// counts as signed out for this request but leaves the stored session
/// alone, so a provider outage does not sign everybody out.
async fn current_auth_session(session: &Session, state: &AppState) -> Option<AuthSession> {
    let stored: AuthSession = session
        .get(session_keys::AUTH_SESSION)
        .await
        .ok()
        .flatten()?;

    match state.supabase().get_session(Some(&stored)).await {
        Ok(Some(current)) => {
            let refreshed = current.access_token().expose_secret()
                != stored.access_token().expose_secret();
            if refreshed && let Err(e) = set_auth_session(session, &current).await {
                warn!(error = %e, "Failed to store refreshed session");
            }
            Some(current)
        }
        Ok(None) => {
            debug!("Stored session no longer valid");
            if let Err(e) = clear_auth_session(session).await {
                warn!(error = %e, "Failed to clear stale session");
            }
            None
        }
        Err(e) => {
            warn!(error = %e, "Session check failed");
            None
        }
    }
}

/// Helper to store the signed-in user's session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_auth_session(
    session: &Session,
    auth: &AuthSession,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(session_keys::AUTH_SESSION, auth).await
}

/// Helper to clear the signed-in user's session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_auth_session(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session
        .remove::<AuthSession>(session_keys::AUTH_SESSION)
        .await?;
    Ok(())
}
