//! Authentication route handlers.
//!
//! Sign-in, registration and sign-out against the hosted auth provider.
//! Form posts always answer with a redirect; failures carry an `?error=`
//! code that the page turns into a message.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use secrecy::SecretString;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{error, info, warn};

use zesty_core::AccountKind;

use super::messages::{error_message, success_message};
use crate::error::{add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::middleware::{OptionalAuth, set_auth_session};
use crate::models::{AuthSession, session_keys};
use crate::services::{
    AuthError, AuthService, Destination, ProfileFields, Registration, SignInOutcome,
};
use crate::state::AppState;

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Registration form data. The business fields are only on the business form.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub phone: String,
    pub business_name: Option<String>,
    pub business_address: Option<String>,
}

impl RegisterForm {
    fn into_registration(self, kind: AccountKind) -> Registration {
        Registration {
            kind,
            password: SecretString::from(self.password),
            fields: ProfileFields {
                id: None,
                email: self.email,
                full_name: self.full_name,
                phone: self.phone,
                business_name: self.business_name,
                business_address: self.business_address,
            },
        }
    }
}

// =============================================================================
// Query Types
// =============================================================================

/// Query parameters for error/success display.
#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    pub error: Option<String>,
    pub success: Option<String>,
}

/// Query parameters of the registration page.
#[derive(Debug, Deserialize)]
pub struct RegisterQuery {
    /// `normal` or `business`
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub error: Option<String>,
}

impl RegisterQuery {
    fn account_kind(&self) -> Option<AccountKind> {
        self.kind.as_deref()?.parse().ok()
    }
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub signed_in: bool,
    pub error: Option<String>,
    pub success: Option<&'static str>,
    pub individual_allowance: u32,
    pub business_allowance: u32,
}

/// Register page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub signed_in: bool,
    pub kind: AccountKind,
    pub error: Option<String>,
}

impl RegisterTemplate {
    fn is_business(&self) -> bool {
        self.kind == AccountKind::Business
    }
}

// =============================================================================
// Login Routes
// =============================================================================

/// Display the login page.
pub async fn login_page(
    OptionalAuth(current): OptionalAuth,
    Query(query): Query<MessageQuery>,
) -> impl IntoResponse {
    LoginTemplate {
        signed_in: current.is_some(),
        error: query.error.as_deref().map(error_message),
        success: query.success.as_deref().and_then(success_message),
        individual_allowance: AccountKind::Individual.monthly_ad_allowance(),
        business_allowance: AccountKind::Business.monthly_ad_allowance(),
    }
}

/// Handle login form submission.
///
/// Redirects to the page of the resolved account kind.
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Response {
    let supabase = state.supabase();
    let password = SecretString::from(form.password);

    match AuthService::new(supabase, supabase)
        .sign_in(&form.email, &password)
        .await
    {
        Ok(SignInOutcome::Authenticated {
            session: auth,
            resolution,
        }) => {
            if let Err(e) = session.cycle_id().await {
                warn!(error = %e, "Failed to rotate session id");
            }
            if let Err(e) = set_auth_session(&session, &auth).await {
                error!(error = %e, "Failed to store session");
                return login_error("session");
            }

            set_sentry_user(auth.identity_id(), Some(auth.email().as_str()));
            add_breadcrumb(
                "auth",
                "User signed in",
                Some(&[("kind", resolution.kind().as_str())]),
            );

            Redirect::to(resolution.destination().path()).into_response()
        }
        Ok(outcome @ SignInOutcome::Unconfirmed { .. }) => {
            // No session is stored, so the page sends the visitor on to
            // sign-in with this notice.
            Redirect::to(&format!("{}?error=unconfirmed", outcome.destination().path()))
                .into_response()
        }
        Err(e) => {
            report(&e, "Sign-in failed");
            login_error(&e.code())
        }
    }
}

fn login_error(code: &str) -> Response {
    Redirect::to(&format!("{}?error={code}", Destination::SignIn.path())).into_response()
}

// =============================================================================
// Registration Routes
// =============================================================================

/// Display the registration page for the account kind in `?type=`.
///
/// Without a valid kind there is nothing to register; back to sign-in,
/// which links both kinds.
pub async fn register_page(
    OptionalAuth(current): OptionalAuth,
    Query(query): Query<RegisterQuery>,
) -> Response {
    let Some(kind) = query.account_kind() else {
        return Redirect::to(Destination::SignIn.path()).into_response();
    };

    RegisterTemplate {
        signed_in: current.is_some(),
        kind,
        error: query.error.as_deref().map(error_message),
    }
    .into_response()
}

/// Handle registration form submission.
///
/// The new account is signed out again; the visitor signs in explicitly.
pub async fn register(
    State(state): State<AppState>,
    Query(query): Query<RegisterQuery>,
    Form(form): Form<RegisterForm>,
) -> Response {
    let Some(kind) = query.account_kind() else {
        return Redirect::to(Destination::SignIn.path()).into_response();
    };

    let supabase = state.supabase();
    match AuthService::new(supabase, supabase)
        .register(form.into_registration(kind))
        .await
    {
        Ok(profile) => {
            add_breadcrumb("auth", "Account registered", Some(&[("kind", kind.as_str())]));
            info!(user_id = %profile.id(), "Registration complete");
            Redirect::to(&format!("{}?success=registered", Destination::SignIn.path()))
                .into_response()
        }
        Err(e) => {
            report(&e, "Registration failed");
            Redirect::to(&format!("/register?type={kind}&error={}", e.code())).into_response()
        }
    }
}

// =============================================================================
// Logout Route
// =============================================================================

/// Handle logout.
///
/// Revokes the session at the provider (best effort) and destroys the
/// cookie session.
pub async fn logout(State(state): State<AppState>, session: Session) -> Response {
    if let Ok(Some(auth)) = session
        .get::<AuthSession>(session_keys::AUTH_SESSION)
        .await
    {
        let supabase = state.supabase();
        AuthService::new(supabase, supabase).sign_out(&auth).await;
    }

    if let Err(e) = session.flush().await {
        error!(error = %e, "Failed to flush session");
    }
    clear_sentry_user();

    Redirect::to(&format!("{}?success=signed_out", Destination::SignIn.path())).into_response()
}

/// Log an auth failure at a level matching whose fault it is.
fn report(err: &AuthError, message: &str) {
    if err.is_server_error() {
        error!(error = %err, "{message}");
    } else {
        info!(error = %err, "{message}");
    }
}
